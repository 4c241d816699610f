//! Internal knowledge-base client.
//!
//! One persistent connection reused across calls, a bounded transport-level
//! retry for connection failures, and an explicit failure record instead of
//! the web providers' empty-on-failure collapse: callers of this path must
//! be able to tell "zero matches" from "the call failed".

use serde::Deserialize;
use std::time::Duration;

use searchpipe_core::{Error, KnowledgeOutcome, Result, SearchKind, SearchResult};

use crate::search::{env_nonempty, key_from_env};

/// Connection-failure retry budget. Application-level errors (HTTP status,
/// timeout, malformed body) are never retried.
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_PAUSE: Duration = Duration::from_millis(100);

/// Fixed query bundle sent verbatim on every call; the query string is the
/// only caller-controlled input.
const RESULT_COUNT: u32 = 20;
const SIMILARITY_THRESHOLD: u32 = 3;
const RERANK_METHOD: &str = "jina";
const BACKEND_SEARCH_ENGINE: &str = "linkup";
const CLIENT_TAG: &str = "searchpipe-mcp-call";

fn query_timeout() -> Duration {
    let ms = env_nonempty("SEARCHPIPE_KNOWLEDGE_TIMEOUT_MS")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(30_000);
    Duration::from_millis(ms)
}

#[derive(Debug, Clone)]
pub struct KnowledgeClient {
    client: reqwest::Client,
    query_url: String,
}

#[derive(Debug, Deserialize)]
struct KnowledgeResponse {
    results: Option<Vec<KnowledgeItem>>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KnowledgeItem {
    file_name: Option<String>,
    chunk_text: Option<String>,
    relevance_score: Option<f64>,
    distance: Option<f64>,
}

impl KnowledgeClient {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let base_url = key_from_env("SEARCHPIPE_KNOWLEDGE_BASE_URL", "KNOWLEDGE_BASE_URL")
            .ok_or_else(|| {
                Error::NotConfigured(
                    "missing SEARCHPIPE_KNOWLEDGE_BASE_URL (or KNOWLEDGE_BASE_URL)".to_string(),
                )
            })?;
        let query_url = format!("{}/query", base_url.trim_end_matches('/'));
        Ok(Self { client, query_url })
    }

    pub fn query_url(&self) -> &str {
        &self.query_url
    }

    /// Query the knowledge base. Total: every failure path is reported as
    /// [`KnowledgeOutcome::Failed`], never as an error or a panic.
    pub async fn search(&self, query: &str) -> KnowledgeOutcome {
        let payload = serde_json::json!({
            "query": query,
            "k": RESULT_COUNT,
            "threshold": SIMILARITY_THRESHOLD,
            "full_docs_search": true,
            "rerank_method": RERANK_METHOD,
            "file_name": CLIENT_TAG,
            "contextual_embedding_query": true,
            "search_engine": BACKEND_SEARCH_ENGINE,
        });

        let mut attempt = 1;
        let resp = loop {
            let sent = self
                .client
                .post(&self.query_url)
                .json(&payload)
                .timeout(query_timeout())
                .send()
                .await;
            match sent {
                Ok(resp) => break resp,
                Err(e) if e.is_timeout() => {
                    tracing::error!(error = %e, "knowledge base search timed out");
                    return KnowledgeOutcome::Failed {
                        error: "request timed out".to_string(),
                    };
                }
                // Connection failures are idempotent to retry; nothing was
                // processed upstream.
                Err(e) if e.is_connect() && attempt < RETRY_ATTEMPTS => {
                    tracing::warn!(attempt, error = %e, "knowledge base connect failed, retrying");
                    tokio::time::sleep(RETRY_PAUSE).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(error = %e, "knowledge base request failed");
                    return KnowledgeOutcome::Failed {
                        error: e.to_string(),
                    };
                }
            }
        };

        let status = resp.status();
        if !status.is_success() {
            return KnowledgeOutcome::Failed {
                error: format!("knowledge base HTTP {status}"),
            };
        }

        let raw: serde_json::Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => {
                return KnowledgeOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        let sanitized = strip_summary(raw);
        let parsed: KnowledgeResponse = match serde_json::from_value(sanitized) {
            Ok(p) => p,
            Err(e) => {
                return KnowledgeOutcome::Failed {
                    error: format!("malformed knowledge base response: {e}"),
                }
            }
        };
        if let Some(error) = parsed.error {
            return KnowledgeOutcome::Failed { error };
        }

        KnowledgeOutcome::Hits(
            parsed
                .results
                .unwrap_or_default()
                .into_iter()
                .map(normalize_hit)
                .collect(),
        )
    }
}

/// Drop the bulk `summary` field before anything downstream sees the
/// response. The summary is large and carries upstream-synthesized prose
/// this server never exposes.
fn strip_summary(mut value: serde_json::Value) -> serde_json::Value {
    if let Some(map) = value.as_object_mut() {
        if map.remove("summary").is_some() {
            tracing::debug!("stripped summary field from knowledge base response");
        }
    }
    value
}

fn normalize_hit(item: KnowledgeItem) -> SearchResult {
    SearchResult {
        source: item.file_name.unwrap_or_else(|| "Unknown".to_string()),
        text: item.chunk_text.unwrap_or_default(),
        score: item.relevance_score.or(item.distance).unwrap_or(0.0),
        kind: SearchKind::Vector,
        url: None,
    }
}
