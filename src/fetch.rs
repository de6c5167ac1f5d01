use crate::WordStatistics;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

pub const DEFAULT_WIKI_URL: &str = "https://ru.wikipedia.org";

/// Characters left alone when embedding a title in a path.
const TITLE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("upstream returned {0}")]
    Status(StatusCode),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Read-only client for `<base>/wiki/<title>` article pages.
#[derive(Debug, Clone)]
pub struct WikiClient {
    client: Client,
    base_url: String,
}

impl Default for WikiClient {
    fn default() -> Self {
        Self::new(DEFAULT_WIKI_URL)
    }
}

impl WikiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn page_url(&self, title: &str) -> String {
        format!("{}/wiki/{}", self.base_url, encode_title(title))
    }

    /// Returns the article HTML. Anything other than `200 OK` is an error.
    pub async fn fetch_page(&self, title: &str) -> Result<String, FetchError> {
        let url = self.page_url(title);
        debug!(%url, "Fetching article");
        let response = self.client.get(&url).send().await.map_err(|err| {
            warn!(%url, error = %err, "Article request failed");
            err
        })?;
        let status = response.status();
        if status != StatusCode::OK {
            warn!(%url, %status, "Article not available");
            return Err(FetchError::Status(status));
        }
        Ok(response.text().await?)
    }
}

pub fn encode_title(title: &str) -> String {
    utf8_percent_encode(title, TITLE_ENCODE_SET).to_string()
}

/// Fetches an article and computes its statistics.
pub async fn get_word_statistics(
    client: &WikiClient,
    title: &str,
) -> Result<WordStatistics, FetchError> {
    let html = client.fetch_page(title).await?;
    Ok(WordStatistics::from_html(&html))
}
