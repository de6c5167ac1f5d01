use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use resvg::usvg::{self, fontdb};
use std::fmt::Write as _;
use std::sync::Arc;
use tiny_skia::{Pixmap, Transform};

const WIDTH: f64 = 900.0;
const HEIGHT: f64 = 600.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_BOTTOM: f64 = 170.0;
const BAR_WIDTH: f64 = 0.9;
const MAX_Y_TICKS: u64 = 10;
const BAR_COLOR: &str = "#1f77b4";
const FONT_FAMILY: &str = "DejaVu Sans, Liberation Sans, Arial, sans-serif";

static FONT_DB: Lazy<Arc<fontdb::Database>> = Lazy::new(|| {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    Arc::new(db)
});

/// Axis and title captions for one chart.
#[derive(Debug, Clone, Copy)]
pub struct ChartLabels {
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub title: &'static str,
}

pub const SECTION_CHART: ChartLabels = ChartLabels {
    x_label: "Разделы",
    y_label: "Кол-во слов",
    title: "Количество слов в разделах",
};

pub const PARAGRAPH_CHART: ChartLabels = ChartLabels {
    x_label: "Абзацы",
    y_label: "Кол-во слов",
    title: "Количество слов в абзацах",
};

#[derive(Debug, Clone, PartialEq)]
pub struct ChartResult {
    /// `data:image/png;base64,...`
    pub image_uri: String,
    /// Input values rounded to the nearest integer (ties to even), when requested.
    pub rounded: Option<IndexMap<String, i64>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("svg parse failed: {0}")]
    Svg(#[from] usvg::Error),
    #[error("pixmap allocation failed")]
    Pixmap,
    #[error("png encoding failed: {0}")]
    Encode(String),
}

/// Renders one vertical bar per entry, in map order.
///
/// Every drawing resource is owned by this call; only the font database is
/// shared, read-only, across calls.
pub fn render_bar_chart(
    data: &IndexMap<String, f64>,
    labels: &ChartLabels,
    round_values: bool,
) -> Result<ChartResult, ChartError> {
    let svg = bar_chart_svg(data, labels);
    let png = rasterize(&svg)?;
    let image_uri = format!("data:image/png;base64,{}", STANDARD.encode(png));
    let rounded = round_values.then(|| {
        data.iter()
            .map(|(label, value)| (label.clone(), value.round_ties_even() as i64))
            .collect()
    });
    Ok(ChartResult { image_uri, rounded })
}

fn rasterize(svg: &str) -> Result<Vec<u8>, ChartError> {
    let mut options = usvg::Options::default();
    options.fontdb = Arc::clone(&FONT_DB);
    let tree = usvg::Tree::from_str(svg, &options)?;
    let size = tree.size().to_int_size();
    let mut pixmap = Pixmap::new(size.width(), size.height()).ok_or(ChartError::Pixmap)?;
    resvg::render(&tree, Transform::default(), &mut pixmap.as_mut());
    pixmap
        .encode_png()
        .map_err(|err| ChartError::Encode(err.to_string()))
}

fn bar_chart_svg(data: &IndexMap<String, f64>, labels: &ChartLabels) -> String {
    let plot_width = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let baseline = MARGIN_TOP + plot_height;

    let max_value = data.values().copied().fold(0.0_f64, f64::max);
    let ticks = integer_ticks(max_value);
    let axis_top = ticks.last().copied().unwrap_or(1).max(1) as f64;

    let mut svg = String::with_capacity(4096 + data.len() * 256);
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="{FONT_FAMILY}">"#
    );
    let _ = write!(svg, r##"<rect width="{WIDTH}" height="{HEIGHT}" fill="#ffffff"/>"##);

    for tick in &ticks {
        let y = baseline - (*tick as f64 / axis_top) * plot_height;
        let _ = write!(
            svg,
            r##"<line x1="{x1:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}" stroke="#e5e5e5"/><line x1="{t:.2}" y1="{y:.2}" x2="{MARGIN_LEFT}" y2="{y:.2}" stroke="#000000"/><text x="{lx:.2}" y="{ty:.2}" font-size="11" text-anchor="end">{tick}</text>"##,
            x1 = MARGIN_LEFT,
            x2 = MARGIN_LEFT + plot_width,
            t = MARGIN_LEFT - 4.0,
            lx = MARGIN_LEFT - 7.0,
            ty = y + 4.0,
        );
    }

    if !data.is_empty() {
        let slot = plot_width / data.len() as f64;
        let bar_width = slot * BAR_WIDTH;
        for (idx, (label, value)) in data.iter().enumerate() {
            let height = (value.max(0.0) / axis_top) * plot_height;
            let x = MARGIN_LEFT + idx as f64 * slot + (slot - bar_width) / 2.0;
            let center = MARGIN_LEFT + idx as f64 * slot + slot / 2.0;
            let label_y = baseline + 14.0;
            let _ = write!(
                svg,
                r#"<rect class="bar" x="{x:.2}" y="{y:.2}" width="{bar_width:.2}" height="{height:.2}" fill="{BAR_COLOR}"/>"#,
                y = baseline - height,
            );
            let _ = write!(
                svg,
                r#"<text x="{center:.2}" y="{label_y:.2}" font-size="10" text-anchor="end" transform="rotate(-45 {center:.2} {label_y:.2})">{label}</text>"#,
                label = xml_escape(label),
            );
        }
    }

    let _ = write!(
        svg,
        r##"<line x1="{MARGIN_LEFT}" y1="{MARGIN_TOP}" x2="{MARGIN_LEFT}" y2="{baseline:.2}" stroke="#000000"/><line x1="{MARGIN_LEFT}" y1="{baseline:.2}" x2="{right:.2}" y2="{baseline:.2}" stroke="#000000"/>"##,
        right = MARGIN_LEFT + plot_width,
    );
    let _ = write!(
        svg,
        r#"<text x="{cx:.2}" y="32" font-size="16" text-anchor="middle">{title}</text><text x="{cx:.2}" y="{xy:.2}" font-size="13" text-anchor="middle">{x_label}</text><text x="22" y="{cy:.2}" font-size="13" text-anchor="middle" transform="rotate(-90 22 {cy:.2})">{y_label}</text>"#,
        cx = MARGIN_LEFT + plot_width / 2.0,
        xy = HEIGHT - 12.0,
        cy = MARGIN_TOP + plot_height / 2.0,
        title = xml_escape(labels.title),
        x_label = xml_escape(labels.x_label),
        y_label = xml_escape(labels.y_label),
    );
    svg.push_str("</svg>");
    svg
}

/// Integer y ticks from zero up to at least `max_value`, stepping by
/// 1, 2 or 5 times a power of ten.
fn integer_ticks(max_value: f64) -> Vec<u64> {
    let top = if max_value.is_finite() {
        max_value.ceil().max(1.0) as u64
    } else {
        1
    };
    let step = nice_step(top);
    let last = top.div_ceil(step) * step;
    (0..=last).step_by(step as usize).collect()
}

fn nice_step(top: u64) -> u64 {
    let mut magnitude = 1u64;
    loop {
        for multiplier in [1, 2, 5] {
            let step = multiplier * magnitude;
            if top.div_ceil(step) <= MAX_Y_TICKS {
                return step;
            }
        }
        magnitude = magnitude.saturating_mul(10);
    }
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
