use crate::fetch::DEFAULT_WIKI_URL;
use crate::{
    ChartError, PARAGRAPH_CHART, SECTION_CHART, WikiClient, WordStatistics, render_bar_chart,
};
use askama::Template;
use axum::{
    Form, Json, Router,
    extract::{Query, State, rejection::FormRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::{self, JoinError};
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info, warn};

type SharedState = Arc<AppState>;
const FETCH_ERROR_MESSAGE: &str = "Error fetching data from Wikipedia";
const MISSING_PAGE_NAME: &str = "Error: Page name not provided";

pub struct AppState {
    pub wiki: WikiClient,
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub wiki_url: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            wiki_url: DEFAULT_WIKI_URL.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

pub async fn serve(config: WebConfig) -> Result<(), WebError> {
    let state = Arc::new(AppState {
        wiki: WikiClient::new(&config.wiki_url),
    });
    let router = build_router(state);
    info!(%config.addr, wiki = %config.wiki_url, "Binding HTTP listener");
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

/// Failure while turning fetched HTML into a rendered report.
#[derive(Debug, thiserror::Error)]
enum ReportError {
    #[error(transparent)]
    Chart(#[from] ChartError),
    #[error("report task failed: {0}")]
    Task(#[from] JoinError),
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/results", post(results))
        .route("/about", get(about))
        .route("/api/statistics", get(api_statistics))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn home() -> impl IntoResponse {
    Html(render_home())
}

fn render_home() -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Wikipedia Word Statistics</title>
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
  </head>
  <body class="bg-slate-50 text-slate-900">
    <main class="min-h-screen flex flex-col items-center justify-start py-10 px-4">
      <div class="max-w-5xl w-full space-y-6">
        <div>
          <p class="uppercase tracking-wide text-sm text-slate-500">wordstats v{version}</p>
          <h1 class="text-4xl font-extrabold tracking-tight">Count the words of any Wikipedia article.</h1>
          <p class="text-lg text-slate-600">Enter an article title to see word counts per section and per paragraph, with bar charts.</p>
        </div>
        <form action="/results" method="post" class="space-y-3">
          <label for="page_name" class="block font-medium">Article title</label>
          <input id="page_name" name="page_name" type="text" required class="w-full rounded-md border border-slate-300 px-3 py-2" placeholder="Rust (язык программирования)" />
          <button type="submit" class="inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold">Analyze</button>
        </form>
        <p><a href="/about">About this service</a></p>
      </div>
    </main>
  </body>
</html>"#,
        version = env!("CARGO_PKG_VERSION"),
    )
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "wordstats-web" }))
}

async fn about(State(state): State<SharedState>) -> impl IntoResponse {
    let template = AboutTemplate {
        wiki_url: state.wiki.base_url(),
    };
    Html(
        template
            .render()
            .unwrap_or_else(|err| render_error_page(err.to_string())),
    )
}

async fn results(
    State(state): State<SharedState>,
    form: Result<Form<PageParams>, FormRejection>,
) -> Response {
    let page_name = match form {
        Ok(Form(params)) => params.page_name,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected results form");
            None
        }
    };
    let Some(page_name) = page_name else {
        return (StatusCode::BAD_REQUEST, MISSING_PAGE_NAME).into_response();
    };

    let html = match state.wiki.fetch_page(&page_name).await {
        Ok(html) => html,
        Err(err) => {
            warn!(%page_name, error = %err, "Statistics unavailable");
            let template = ResultsTemplate {
                page_name: &page_name,
                error_message: Some(FETCH_ERROR_MESSAGE),
                report: None,
            };
            return render_page(template.render());
        }
    };

    match build_report(html).await {
        Ok(report) => {
            info!(
                %page_name,
                total_words = report.statistics.total_words,
                "Computed word statistics"
            );
            let template = ResultsTemplate {
                page_name: &page_name,
                error_message: None,
                report: Some(report),
            };
            render_page(template.render())
        }
        Err(err) => {
            error!(%page_name, error = %err, "Report rendering failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(render_error_page(err.to_string())),
            )
                .into_response()
        }
    }
}

async fn api_statistics(
    State(state): State<SharedState>,
    Query(params): Query<PageParams>,
) -> Result<Json<WordStatistics>, ApiError> {
    let page_name = params
        .page_name
        .ok_or_else(|| ApiError::bad_request("Query parameter `page_name` is required"))?;
    let html = state.wiki.fetch_page(&page_name).await.map_err(|err| {
        warn!(%page_name, error = %err, "Statistics unavailable");
        ApiError::bad_gateway(FETCH_ERROR_MESSAGE)
    })?;
    let statistics = task::spawn_blocking(move || WordStatistics::from_html(&html))
        .await
        .map_err(|err| {
            error!(%page_name, error = %err, "Extraction task failed");
            ApiError::internal("Failed to extract statistics")
        })?;
    Ok(Json(statistics))
}

/// Parses and charts on the blocking pool so the worker stays free.
async fn build_report(html: String) -> Result<ReportView, ReportError> {
    let report = task::spawn_blocking(move || {
        let statistics = WordStatistics::from_html(&html);
        ReportView::build(statistics)
    })
    .await??;
    Ok(report)
}

fn render_page(rendered: askama::Result<String>) -> Response {
    Html(rendered.unwrap_or_else(|err| render_error_page(err.to_string()))).into_response()
}

/// An absent `page_name` is missing; any present value is used verbatim.
#[derive(Debug, Deserialize)]
struct PageParams {
    page_name: Option<String>,
}

struct ReportView {
    statistics: WordStatistics,
    section_chart: String,
    paragraph_chart: String,
    section_data: IndexMap<String, i64>,
}

impl ReportView {
    fn build(statistics: WordStatistics) -> Result<Self, ChartError> {
        let section = render_bar_chart(&statistics.section_series(), &SECTION_CHART, true)?;
        let paragraph = render_bar_chart(&statistics.paragraph_series(), &PARAGRAPH_CHART, true)?;
        Ok(Self {
            statistics,
            section_chart: section.image_uri,
            paragraph_chart: paragraph.image_uri,
            section_data: section.rounded.unwrap_or_default(),
        })
    }
}

fn render_error_page(message: impl Into<String>) -> String {
    let message = message.into();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Word Statistics • Error</title>
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
  </head>
  <body class="bg-slate-50 text-slate-900">
    <main class="min-h-screen flex flex-col items-center justify-start py-10 px-4">
      <h1 class="text-4xl font-extrabold tracking-tight">Something went wrong</h1>
      <p class="text-lg text-slate-600">{message}</p>
      <a href="/">Back to home</a>
    </main>
  </body>
</html>"#,
        message = html_escape(&message),
    )
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Word Statistics • {{ page_name }}</title>
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
  </head>
  <body class="bg-slate-50 text-slate-900">
    <main class="min-h-screen flex flex-col items-center justify-start py-10 px-4">
      <div class="max-w-5xl w-full space-y-6">
        <div>
          <p class="uppercase tracking-wide text-sm text-slate-500">Results</p>
          <h1 class="text-4xl font-extrabold tracking-tight">{{ page_name }}</h1>
        </div>

        {% if let Some(message) = error_message %}
        <p class="text-lg text-slate-600" id="error-message">{{ message }}</p>
        {% endif %}

        {% if let Some(report) = report %}
        <section id="summary">
          <table class="min-w-full bg-white shadow rounded">
            <tbody>
              <tr class="border-b border-slate-200"><th class="px-4 py-2 text-left">Total words</th><td class="px-4 py-2" id="total-words">{{ report.statistics.total_words }}</td></tr>
              <tr class="border-b border-slate-200"><th class="px-4 py-2 text-left">Min words per section</th><td class="px-4 py-2">{{ report.statistics.min_words_section }}</td></tr>
              <tr class="border-b border-slate-200"><th class="px-4 py-2 text-left">Max words per section</th><td class="px-4 py-2">{{ report.statistics.max_words_section }}</td></tr>
              <tr class="border-b border-slate-200"><th class="px-4 py-2 text-left">Min words per paragraph</th><td class="px-4 py-2">{{ report.statistics.min_words_paragraph }}</td></tr>
              <tr class="border-b border-slate-200"><th class="px-4 py-2 text-left">Max words per paragraph</th><td class="px-4 py-2">{{ report.statistics.max_words_paragraph }}</td></tr>
            </tbody>
          </table>
        </section>

        <section id="sections">
          <h2 class="text-xl font-semibold mb-2">Sections ({{ report.section_data.len() }})</h2>
          <img class="max-w-full h-auto" alt="Section word counts" src="{{ report.section_chart|safe }}" />
          <table class="min-w-full bg-white shadow rounded">
            <thead><tr><th class="px-4 py-2 text-left">Section</th><th class="px-4 py-2 text-left">Words</th></tr></thead>
            <tbody>
              {% for (heading, count) in report.section_data %}
              <tr class="border-b border-slate-200"><td class="px-4 py-2">{{ heading }}</td><td class="px-4 py-2">{{ count }}</td></tr>
              {% endfor %}
            </tbody>
          </table>
        </section>

        <section id="paragraphs">
          <h2 class="text-xl font-semibold mb-2">Paragraphs ({{ report.statistics.paragraph_statistics.len() }})</h2>
          <img class="max-w-full h-auto" alt="Paragraph word counts" src="{{ report.paragraph_chart|safe }}" />
          <table class="min-w-full bg-white shadow rounded">
            <thead><tr><th class="px-4 py-2 text-left">Paragraph</th><th class="px-4 py-2 text-left">Words</th></tr></thead>
            <tbody>
              {% for (index, count) in report.statistics.paragraph_statistics %}
              <tr class="border-b border-slate-200"><td class="px-4 py-2">{{ index }}</td><td class="px-4 py-2">{{ count }}</td></tr>
              {% endfor %}
            </tbody>
          </table>
        </section>
        {% endif %}

        <a href="/" class="inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold">Analyze another article</a>
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct ResultsTemplate<'a> {
    page_name: &'a str,
    error_message: Option<&'a str>,
    report: Option<ReportView>,
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Word Statistics • About</title>
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
  </head>
  <body class="bg-slate-50 text-slate-900">
    <main class="min-h-screen flex flex-col items-center justify-start py-10 px-4">
      <div class="max-w-5xl w-full space-y-4">
        <h1 class="text-4xl font-extrabold tracking-tight">About</h1>
        <p class="text-lg text-slate-600">This service downloads an article from {{ wiki_url }}, counts the words in every heading and paragraph, and draws bar charts of the counts.</p>
        <p>A word is a run of letters, digits or underscores. Repeated headings with the same text are reported once.</p>
        <a href="/" class="inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold">Back to home</a>
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct AboutTemplate<'a> {
    wiki_url: &'a str,
}
