//! Reader (scraping) client.
//!
//! Wraps the Jina Reader API: the target URL is appended to the reader
//! endpoint path and the extracted text comes back as the response body.
//! The client is a pure pass-through; no cleanup, parsing, or truncation.

use searchpipe_core::{Error, Result, ScrapeResult};

use crate::search::{env_nonempty, key_from_env, search_timeout_ms};

#[derive(Debug, Clone)]
pub struct ReaderClient {
    client: reqwest::Client,
    api_key: String,
}

impl ReaderClient {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = key_from_env("SEARCHPIPE_JINA_API_KEY", "JINA_API_KEY").ok_or_else(|| {
            Error::NotConfigured("missing SEARCHPIPE_JINA_API_KEY (or JINA_API_KEY)".to_string())
        })?;
        Ok(Self { client, api_key })
    }

    fn endpoint() -> String {
        env_nonempty("SEARCHPIPE_READER_ENDPOINT").unwrap_or_else(|| "https://r.jina.ai".to_string())
    }

    /// Scrape a URL. Total: transport failures and error statuses land in
    /// the result's `error`/`status` fields, never in an `Err`.
    pub async fn scrape(&self, url: &str) -> ScrapeResult {
        let reader_url = format!("{}/{}", Self::endpoint().trim_end_matches('/'), url);

        let sent = self
            .client
            .get(&reader_url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .timeout(std::time::Duration::from_millis(search_timeout_ms()))
            .send()
            .await;

        let resp = match sent {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(url, error = %e, "scrape request failed");
                return ScrapeResult::failed(url, e.to_string());
            }
        };

        let status = resp.status();
        if !status.is_success() {
            return ScrapeResult::failed(url, format!("reader fetch HTTP {status}"));
        }

        match resp.text().await {
            Ok(body) => ScrapeResult::success(url, body),
            Err(e) => ScrapeResult::failed(url, e.to_string()),
        }
    }
}
