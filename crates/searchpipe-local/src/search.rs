//! Web search provider adapters.
//!
//! Each provider knows its own endpoint, auth placement, and response shape,
//! and normalizes into the canonical [`SearchResult`]. Missing optional
//! fields degrade to defaults; they never fail a record.

use serde::Deserialize;
use searchpipe_core::{Error, Result, SearchKind, SearchProvider, SearchResult};

/// Ranking hint used for providers that expose no native relevance score.
const PLACEHOLDER_SCORE: f64 = 0.9;

/// Per-call timeout for outbound provider requests.
///
/// Provider requests can hang indefinitely without an explicit timeout.
/// Keep a conservative cap even if the environment asks for something huge.
pub(crate) fn search_timeout_ms() -> u64 {
    std::env::var("SEARCHPIPE_HTTP_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(20_000)
        .clamp(1_000, 60_000)
}

pub(crate) fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Dual lookup: the SEARCHPIPE_-prefixed variable wins, the bare provider
/// variable is accepted for compatibility with existing deployments.
pub(crate) fn key_from_env(prefixed: &str, bare: &str) -> Option<String> {
    env_nonempty(prefixed).or_else(|| env_nonempty(bare))
}

fn endpoint_from_env(var: &str, default: &str) -> String {
    env_nonempty(var).unwrap_or_else(|| default.to_string())
}

// ---------------------------------------------------------------- Tavily

#[derive(Debug, Clone)]
pub struct TavilyProvider {
    client: reqwest::Client,
    api_key: String,
}

impl TavilyProvider {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = key_from_env("SEARCHPIPE_TAVILY_API_KEY", "TAVILY_API_KEY").ok_or_else(
            || Error::NotConfigured("missing SEARCHPIPE_TAVILY_API_KEY (or TAVILY_API_KEY)".to_string()),
        )?;
        Ok(Self { client, api_key })
    }

    fn endpoint() -> String {
        endpoint_from_env("SEARCHPIPE_TAVILY_ENDPOINT", "https://api.tavily.com/search")
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    results: Option<Vec<TavilyItem>>,
}

#[derive(Debug, Deserialize)]
struct TavilyItem {
    content: Option<String>,
    url: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for TavilyProvider {
    fn name(&self) -> &'static str {
        "tavily"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        // Tavily wants the key as a body field, not a header.
        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": 5,
        });

        let resp = self
            .client
            .post(Self::endpoint())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&body)
            .timeout(std::time::Duration::from_millis(search_timeout_ms()))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("tavily search HTTP {status}")));
        }

        let parsed: TavilyResponse = resp.json().await.map_err(|e| Error::Search(e.to_string()))?;
        Ok(parsed
            .results
            .unwrap_or_default()
            .into_iter()
            .map(|r| SearchResult {
                source: "Tavily".to_string(),
                text: r.content.unwrap_or_default(),
                score: PLACEHOLDER_SCORE,
                kind: SearchKind::Web,
                url: r.url,
            })
            .collect())
    }
}

// ---------------------------------------------------------------- Serper

#[derive(Debug, Clone)]
pub struct SerperProvider {
    client: reqwest::Client,
    api_key: String,
}

impl SerperProvider {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = key_from_env("SEARCHPIPE_SERPER_API_KEY", "SERPER_API_KEY").ok_or_else(
            || Error::NotConfigured("missing SEARCHPIPE_SERPER_API_KEY (or SERPER_API_KEY)".to_string()),
        )?;
        Ok(Self { client, api_key })
    }

    fn endpoint() -> String {
        endpoint_from_env("SEARCHPIPE_SERPER_ENDPOINT", "https://google.serper.dev/search")
    }
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    organic: Option<Vec<SerperItem>>,
}

#[derive(Debug, Deserialize)]
struct SerperItem {
    snippet: Option<String>,
    link: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for SerperProvider {
    fn name(&self) -> &'static str {
        "serper"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let body = serde_json::json!({
            "q": query,
            "hl": "zh-cn",
            "num": 10,
        });

        let resp = self
            .client
            .post(Self::endpoint())
            .header("X-API-KEY", &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&body)
            .timeout(std::time::Duration::from_millis(search_timeout_ms()))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("serper search HTTP {status}")));
        }

        let parsed: SerperResponse = resp.json().await.map_err(|e| Error::Search(e.to_string()))?;
        Ok(parsed
            .organic
            .unwrap_or_default()
            .into_iter()
            .map(|r| SearchResult {
                source: "Serper".to_string(),
                text: r.snippet.unwrap_or_default(),
                score: PLACEHOLDER_SCORE,
                kind: SearchKind::Web,
                url: r.link,
            })
            .collect())
    }
}

// ---------------------------------------------------------------- Bing

#[derive(Debug, Clone)]
pub struct BingProvider {
    client: reqwest::Client,
    api_key: String,
}

impl BingProvider {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = key_from_env("SEARCHPIPE_BING_API_KEY", "BING_API_KEY").ok_or_else(|| {
            Error::NotConfigured("missing SEARCHPIPE_BING_API_KEY (or BING_API_KEY)".to_string())
        })?;
        Ok(Self { client, api_key })
    }

    fn endpoint() -> String {
        endpoint_from_env(
            "SEARCHPIPE_BING_ENDPOINT",
            "https://api.bing.microsoft.com/v7.0/search",
        )
    }
}

#[derive(Debug, Deserialize)]
struct BingResponse {
    #[serde(rename = "webPages")]
    web_pages: Option<BingWebPages>,
}

#[derive(Debug, Deserialize)]
struct BingWebPages {
    value: Option<Vec<BingItem>>,
}

#[derive(Debug, Deserialize)]
struct BingItem {
    snippet: Option<String>,
    #[serde(rename = "displayUrl")]
    display_url: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for BingProvider {
    fn name(&self) -> &'static str {
        "bing"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let resp = self
            .client
            .get(Self::endpoint())
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .query(&[("q", query), ("mkt", "global")])
            .timeout(std::time::Duration::from_millis(search_timeout_ms()))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("bing search HTTP {status}")));
        }

        let parsed: BingResponse = resp.json().await.map_err(|e| Error::Search(e.to_string()))?;
        Ok(parsed
            .web_pages
            .and_then(|w| w.value)
            .unwrap_or_default()
            .into_iter()
            .map(|r| SearchResult {
                source: "Bing".to_string(),
                text: r.snippet.unwrap_or_default(),
                score: PLACEHOLDER_SCORE,
                kind: SearchKind::Web,
                url: r.display_url,
            })
            .collect())
    }
}

// ---------------------------------------------------------------- Google

#[derive(Debug, Clone)]
pub struct GoogleProvider {
    client: reqwest::Client,
    api_key: String,
    search_engine_id: String,
}

impl GoogleProvider {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = key_from_env("SEARCHPIPE_GOOGLE_API_KEY", "GOOGLE_API_KEY").ok_or_else(
            || Error::NotConfigured("missing SEARCHPIPE_GOOGLE_API_KEY (or GOOGLE_API_KEY)".to_string()),
        )?;
        let search_engine_id = key_from_env(
            "SEARCHPIPE_GOOGLE_SEARCH_ENGINE_ID",
            "GOOGLE_SEARCH_ENGINE_ID",
        )
        .ok_or_else(|| {
            Error::NotConfigured(
                "missing SEARCHPIPE_GOOGLE_SEARCH_ENGINE_ID (or GOOGLE_SEARCH_ENGINE_ID)"
                    .to_string(),
            )
        })?;
        Ok(Self {
            client,
            api_key,
            search_engine_id,
        })
    }

    fn endpoint() -> String {
        endpoint_from_env(
            "SEARCHPIPE_GOOGLE_ENDPOINT",
            "https://www.googleapis.com/customsearch/v1",
        )
    }
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    items: Option<Vec<GoogleItem>>,
}

#[derive(Debug, Deserialize)]
struct GoogleItem {
    snippet: Option<String>,
    link: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let resp = self
            .client
            .get(Self::endpoint())
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.search_engine_id.as_str()),
                ("q", query),
            ])
            .timeout(std::time::Duration::from_millis(search_timeout_ms()))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("google search HTTP {status}")));
        }

        let parsed: GoogleResponse = resp.json().await.map_err(|e| Error::Search(e.to_string()))?;
        Ok(parsed
            .items
            .unwrap_or_default()
            .into_iter()
            .map(|r| SearchResult {
                source: "Google".to_string(),
                text: r.snippet.unwrap_or_default(),
                score: PLACEHOLDER_SCORE,
                kind: SearchKind::Web,
                url: r.link,
            })
            .collect())
    }
}

// ---------------------------------------------------------------- Linkup

#[derive(Debug, Clone)]
pub struct LinkupProvider {
    client: reqwest::Client,
    api_key: String,
}

impl LinkupProvider {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = key_from_env("SEARCHPIPE_LINKUP_API_KEY", "LINKUP_API_KEY").ok_or_else(
            || Error::NotConfigured("missing SEARCHPIPE_LINKUP_API_KEY (or LINKUP_API_KEY)".to_string()),
        )?;
        Ok(Self { client, api_key })
    }

    fn endpoint() -> String {
        endpoint_from_env("SEARCHPIPE_LINKUP_ENDPOINT", "https://api.linkup.so/v1/search")
    }
}

#[derive(Debug, Deserialize)]
struct LinkupResponse {
    results: Option<Vec<LinkupItem>>,
}

#[derive(Debug, Deserialize)]
struct LinkupItem {
    content: Option<String>,
    url: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for LinkupProvider {
    fn name(&self) -> &'static str {
        "linkup"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let body = serde_json::json!({
            "q": query,
            "depth": "standard",
            "outputType": "searchResults",
        });

        let resp = self
            .client
            .post(Self::endpoint())
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .json(&body)
            .timeout(std::time::Duration::from_millis(search_timeout_ms()))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("linkup search HTTP {status}")));
        }

        let parsed: LinkupResponse = resp.json().await.map_err(|e| Error::Search(e.to_string()))?;
        Ok(parsed
            .results
            .unwrap_or_default()
            .into_iter()
            .take(10)
            .map(|r| SearchResult {
                source: "Linkup".to_string(),
                text: r.content.unwrap_or_default(),
                score: PLACEHOLDER_SCORE,
                kind: SearchKind::Web,
                url: r.url,
            })
            .collect())
    }
}

// ---------------------------------------------------------------- Exa

#[derive(Debug, Clone)]
pub struct ExaProvider {
    client: reqwest::Client,
    api_key: String,
}

impl ExaProvider {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = key_from_env("SEARCHPIPE_EXA_API_KEY", "EXA_API_KEY").ok_or_else(|| {
            Error::NotConfigured("missing SEARCHPIPE_EXA_API_KEY (or EXA_API_KEY)".to_string())
        })?;
        Ok(Self { client, api_key })
    }

    fn endpoint() -> String {
        endpoint_from_env("SEARCHPIPE_EXA_ENDPOINT", "https://api.exa.ai/search")
    }
}

#[derive(Debug, Deserialize)]
struct ExaResponse {
    results: Option<Vec<ExaItem>>,
}

#[derive(Debug, Deserialize)]
struct ExaItem {
    text: Option<String>,
    url: Option<String>,
    // Exa is the one web provider with a native relevance score.
    score: Option<f64>,
}

#[async_trait::async_trait]
impl SearchProvider for ExaProvider {
    fn name(&self) -> &'static str {
        "exa"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let body = serde_json::json!({
            "query": query,
            "numResults": 10,
            "contents": { "text": true },
        });

        let resp = self
            .client
            .post(Self::endpoint())
            .header("x-api-key", &self.api_key)
            .json(&body)
            .timeout(std::time::Duration::from_millis(search_timeout_ms()))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("exa search HTTP {status}")));
        }

        let parsed: ExaResponse = resp.json().await.map_err(|e| Error::Search(e.to_string()))?;
        Ok(parsed
            .results
            .unwrap_or_default()
            .into_iter()
            .map(|r| SearchResult {
                source: "Exa".to_string(),
                text: r.text.unwrap_or_default(),
                score: r.score.unwrap_or(0.0),
                kind: SearchKind::Web,
                url: r.url,
            })
            .collect())
    }
}
