//! Transport-agnostic tool gateway.
//!
//! Owns the adapters and the note store, validates arguments, routes each
//! tool invocation, and formats results as text blocks. Both transports
//! (rmcp stdio and the HTTP/SSE endpoint) depend on this type; it knows
//! nothing about either.

use serde::Serialize;
use tokio::sync::broadcast;

use searchpipe_core::{Error, KnowledgeOutcome, Result, SearchResult};
use searchpipe_local::{EngineRegistry, KnowledgeClient, ReaderClient};

use crate::notes::NoteStore;

pub const NOTE_URI_PREFIX: &str = "note://internal/";

/// Fixed engine set declared in the `search` tool description. Dispatch
/// itself stays permissive: an unknown name yields an empty result list.
pub const ENGINE_NAMES: [&str; 6] = ["tavily", "serper", "bing", "google", "linkup", "exa"];

const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Advisory notification emitted when a call changed or touched shared
/// state. Streamed over the HTTP transport's SSE endpoint; not required for
/// correctness.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GatewayEvent {
    NoteAdded { name: String },
    ScrapeCompleted { url: String, ok: bool },
    KnowledgeSearchCompleted { ok: bool },
}

impl GatewayEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoteAdded { .. } => "note_added",
            Self::ScrapeCompleted { .. } => "scrape_completed",
            Self::KnowledgeSearchCompleted { .. } => "knowledge_search_completed",
        }
    }
}

/// Errors attributable to the caller. These terminate the single invocation
/// at the protocol layer; provider failures never surface this way.
#[derive(thiserror::Error, Debug)]
pub enum CallerError {
    #[error("missing or empty required argument: {0}")]
    MissingArgument(&'static str),
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("unsupported URI scheme: {0}")]
    UnsupportedScheme(String),
    #[error("note not found: {0}")]
    NoteNotFound(String),
}

pub struct ToolGateway {
    registry: EngineRegistry,
    knowledge: KnowledgeClient,
    reader: ReaderClient,
    notes: NoteStore,
    events: broadcast::Sender<GatewayEvent>,
}

impl ToolGateway {
    /// Build every adapter from the environment.
    ///
    /// All-or-nothing: missing configuration from any adapter is collected
    /// into one descriptive error so the server never starts partially
    /// configured.
    pub fn from_env() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("searchpipe-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::NotConfigured(format!("http client: {e}")))?;

        let registry = EngineRegistry::from_env(client.clone());
        let knowledge = KnowledgeClient::from_env(client.clone());
        let reader = ReaderClient::from_env(client);

        let mut missing: Vec<String> = Vec::new();
        for err in [
            registry.as_ref().err(),
            knowledge.as_ref().err(),
            reader.as_ref().err(),
        ]
        .into_iter()
        .flatten()
        {
            missing.push(err.to_string());
        }
        if !missing.is_empty() {
            return Err(Error::NotConfigured(missing.join("; ")));
        }

        let (Ok(registry), Ok(knowledge), Ok(reader)) = (registry, knowledge, reader) else {
            return Err(Error::NotConfigured("incomplete configuration".to_string()));
        };
        tracing::info!("all gateway components initialized");
        Ok(Self::new(registry, knowledge, reader, NoteStore::new()))
    }

    pub fn new(
        registry: EngineRegistry,
        knowledge: KnowledgeClient,
        reader: ReaderClient,
        notes: NoteStore,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            registry,
            knowledge,
            reader,
            notes,
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: GatewayEvent) {
        // Nobody listening is fine; the signal is advisory.
        let _ = self.events.send(event);
    }

    /// `search` tool: one formatted block per normalized result. An unknown
    /// engine or a failed provider yields zero blocks.
    pub async fn search(
        &self,
        engine: &str,
        query: &str,
    ) -> std::result::Result<Vec<String>, CallerError> {
        let engine = required(engine, "engine")?;
        let query = required(query, "query")?;

        tracing::info!(engine, query, "performing web search");
        let results = self.registry.dispatch(engine, query).await;
        tracing::info!(engine, count = results.len(), "search finished");
        Ok(results.iter().map(format_web_block).collect())
    }

    /// `knowledge-search` tool: per-hit blocks, a dedicated "no results"
    /// block, or a failure block carrying the knowledge base's error.
    pub async fn knowledge_search(
        &self,
        query: &str,
    ) -> std::result::Result<Vec<String>, CallerError> {
        let query = required(query, "query")?;

        tracing::info!(query, "searching knowledge base");
        let outcome = self.knowledge.search(query).await;
        self.emit(GatewayEvent::KnowledgeSearchCompleted {
            ok: !outcome.is_failed(),
        });

        Ok(match outcome {
            KnowledgeOutcome::Failed { error } => {
                vec![format!("Failed to search knowledge base: {error}")]
            }
            KnowledgeOutcome::Hits(hits) if hits.is_empty() => {
                vec!["No results found in knowledge base".to_string()]
            }
            KnowledgeOutcome::Hits(hits) => hits.iter().map(format_knowledge_block).collect(),
        })
    }

    /// `scrape-url` tool: a single success or failure block.
    pub async fn scrape_url(&self, url: &str) -> std::result::Result<String, CallerError> {
        let url = required(url, "url")?;

        tracing::info!(url, "scraping url");
        let result = self.reader.scrape(url).await;
        self.emit(GatewayEvent::ScrapeCompleted {
            url: url.to_string(),
            ok: result.is_success(),
        });

        Ok(if result.is_success() {
            format!(
                "Successfully scraped content from {}:\n\n{}",
                result.url,
                result.content.unwrap_or_default()
            )
        } else {
            format!(
                "Failed to scrape {}: {}",
                result.url,
                result.error.unwrap_or_else(|| "Unknown error".to_string())
            )
        })
    }

    /// `add-note` tool: upsert with last-write-wins, then confirm.
    pub fn add_note(
        &self,
        name: &str,
        content: &str,
    ) -> std::result::Result<String, CallerError> {
        let name = required(name, "name")?;
        let content = required(content, "content")?;

        tracing::info!(name, "adding note");
        self.notes.add(name, content);
        self.emit(GatewayEvent::NoteAdded {
            name: name.to_string(),
        });
        Ok(format!("Added note '{name}' with content: {content}"))
    }

    pub fn note_names(&self) -> Vec<String> {
        self.notes.names()
    }

    /// Resolve a `note://internal/<name>` URI to its content. Anything else
    /// is a caller error.
    pub fn read_note(&self, uri: &str) -> std::result::Result<String, CallerError> {
        let name = parse_note_uri(uri)?;
        self.notes
            .get(name)
            .ok_or_else(|| CallerError::NoteNotFound(name.to_string()))
    }
}

pub fn note_uri(name: &str) -> String {
    format!("{NOTE_URI_PREFIX}{name}")
}

pub fn parse_note_uri(uri: &str) -> std::result::Result<&str, CallerError> {
    if !uri.starts_with("note:") {
        let scheme = uri.split(':').next().unwrap_or_default();
        return Err(CallerError::UnsupportedScheme(scheme.to_string()));
    }
    let name = uri
        .strip_prefix(NOTE_URI_PREFIX)
        .unwrap_or_default()
        .trim_start_matches('/');
    if name.is_empty() {
        return Err(CallerError::NoteNotFound(uri.to_string()));
    }
    Ok(name)
}

fn required<'a>(
    value: &'a str,
    arg: &'static str,
) -> std::result::Result<&'a str, CallerError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CallerError::MissingArgument(arg));
    }
    Ok(value)
}

fn format_web_block(r: &SearchResult) -> String {
    format!(
        "Source: {}\nURL: {}\nContent: {}\n",
        r.source,
        r.url.as_deref().unwrap_or(""),
        r.text
    )
}

fn format_knowledge_block(r: &SearchResult) -> String {
    format!(
        "Source: {}\nContent: {}\nDistance: {}\nType: {}\nRelevance: {}\n",
        r.source,
        r.text,
        r.score,
        r.kind.as_str(),
        r.score
    )
}

/// The fixed tool catalog as plain JSON, used by the HTTP transport's
/// `tools/list`. The stdio transport derives the identical surface from the
/// typed argument structs.
pub fn tool_catalog() -> serde_json::Value {
    serde_json::json!([
        {
            "name": "add-note",
            "description": "Add a new note",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "content": { "type": "string" }
                },
                "required": ["name", "content"]
            }
        },
        {
            "name": "search",
            "description": "Search internet using specified search engine",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "engine": {
                        "type": "string",
                        "description": format!("Search engine to use: one of {}", ENGINE_NAMES.join(", "))
                    },
                    "query": { "type": "string", "description": "Search query" }
                },
                "required": ["engine", "query"]
            }
        },
        {
            "name": "scrape-url",
            "description": "Scrape content from a URL",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "URL to scrape" }
                },
                "required": ["url"]
            }
        },
        {
            "name": "knowledge-search",
            "description": "Search the internal knowledge base",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search query for knowledge base" }
                },
                "required": ["query"]
            }
        }
    ])
}
