pub mod chart;
pub mod fetch;
mod stats;

#[cfg(feature = "web")]
pub mod web;

pub use chart::{
    ChartError, ChartLabels, ChartResult, PARAGRAPH_CHART, SECTION_CHART, render_bar_chart,
};
pub use fetch::{FetchError, WikiClient, get_word_statistics};
pub use stats::{WordStatistics, count_words};
