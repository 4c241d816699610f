use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("search failed: {0}")]
    Search(String),
    #[error("scrape failed: {0}")]
    Scrape(String),
    #[error("knowledge base failed: {0}")]
    Knowledge(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Origin category of a canonical search record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    #[default]
    Web,
    Vector,
}

impl SearchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Vector => "vector",
        }
    }
}

/// The one record shape every provider response is normalized into.
///
/// Every field has a total default: a provider omitting a snippet yields an
/// empty `text`, a missing score yields 0.0. A record is never rejected for
/// missing optional data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    /// Provider display label ("Tavily", "Bing", ...) or the originating
    /// file name for knowledge-base hits.
    pub source: String,
    /// Snippet/content body; empty when the provider omits it.
    pub text: String,
    /// Ranking hint. Semantics vary by provider; never compared across
    /// providers.
    pub score: f64,
    pub kind: SearchKind,
    /// Present for web providers, absent for knowledge-base hits.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    Success,
    Failed,
}

/// Outcome of a single scrape call.
///
/// Exactly one of `content`/`error` is populated, determined by `status`.
/// Build values through [`ScrapeResult::success`] / [`ScrapeResult::failed`]
/// to keep that invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub url: String,
    pub content: Option<String>,
    pub error: Option<String>,
    pub status: ScrapeStatus,
}

impl ScrapeResult {
    pub fn success(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: Some(content.into()),
            error: None,
            status: ScrapeStatus::Success,
        }
    }

    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: None,
            error: Some(error.into()),
            status: ScrapeStatus::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ScrapeStatus::Success
    }
}

/// Outcome of a knowledge-base query.
///
/// Unlike the web providers (which collapse failure into an empty list at
/// the dispatch boundary), the knowledge base distinguishes "zero matches"
/// from "the call failed".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum KnowledgeOutcome {
    Hits(Vec<SearchResult>),
    Failed { error: String },
}

impl KnowledgeOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_result_defaults_are_total() {
        let r = SearchResult::default();
        assert_eq!(r.source, "");
        assert_eq!(r.text, "");
        assert_eq!(r.score, 0.0);
        assert_eq!(r.kind, SearchKind::Web);
        assert!(r.url.is_none());
    }

    #[test]
    fn search_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&SearchKind::Web).unwrap(), "\"web\"");
        assert_eq!(
            serde_json::to_string(&SearchKind::Vector).unwrap(),
            "\"vector\""
        );
    }

    #[test]
    fn scrape_result_constructors_keep_exclusivity() {
        let ok = ScrapeResult::success("https://example.com", "body");
        assert!(ok.is_success());
        assert_eq!(ok.content.as_deref(), Some("body"));
        assert!(ok.error.is_none());

        let bad = ScrapeResult::failed("https://example.com", "connect refused");
        assert!(!bad.is_success());
        assert!(bad.content.is_none());
        assert_eq!(bad.error.as_deref(), Some("connect refused"));
    }

    #[test]
    fn knowledge_outcome_distinguishes_empty_from_failed() {
        assert!(!KnowledgeOutcome::Hits(Vec::new()).is_failed());
        assert!(KnowledgeOutcome::Failed {
            error: "request timed out".to_string()
        }
        .is_failed());
    }
}
