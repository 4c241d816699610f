//! HTTP/SSE transport.
//!
//! Carries the same tool/resource contract as the stdio transport over a
//! JSON-RPC POST endpoint plus an SSE stream of gateway events. Depends on
//! the gateway only; the gateway knows nothing about this module.

use anyhow::Context as AnyhowContext;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::gateway::{note_uri, tool_catalog, CallerError, ToolGateway};
use crate::service::{AddNoteArgs, KnowledgeSearchArgs, ScrapeUrlArgs, SearchArgs};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
        }
    }

    pub fn method_not_found(message: impl Into<String>) -> Self {
        Self {
            code: -32601,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Clone)]
struct HttpState {
    gateway: Arc<ToolGateway>,
}

pub fn router(gateway: Arc<ToolGateway>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/mcp/request", post(handle_request))
        .route("/mcp/events", get(handle_events))
        .with_state(HttpState { gateway })
}

pub async fn serve(host: &str, port: u16, gateway: Arc<ToolGateway>) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "HTTP/SSE transport listening");

    axum::serve(listener, router(gateway))
        .await
        .context("server error")?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "searchpipe",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn handle_request(
    State(state): State<HttpState>,
    Json(req): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    debug!(method = %req.method, "received JSON-RPC request");
    let id = req.id.clone();

    let response = match req.method.as_str() {
        "initialize" => JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {}, "resources": {} },
                "serverInfo": {
                    "name": "searchpipe",
                    "version": env!("CARGO_PKG_VERSION"),
                    "transport": "http/sse"
                }
            }),
        ),
        "ping" => JsonRpcResponse::success(id, json!({ "status": "ok" })),
        "tools/list" => JsonRpcResponse::success(id, json!({ "tools": tool_catalog() })),
        "tools/call" => handle_call_tool(id, req.params, &state.gateway).await,
        "resources/list" => handle_list_resources(id, &state.gateway),
        "resources/read" => handle_read_resource(id, req.params, &state.gateway),
        other => JsonRpcResponse::error(
            id,
            JsonRpcError::method_not_found(format!("Method not found: {other}")),
        ),
    };

    Json(response)
}

fn caller_error(e: CallerError) -> JsonRpcError {
    JsonRpcError::invalid_params(e.to_string())
}

/// Parse tool arguments against the same typed structs the stdio transport
/// uses, so a missing required argument fails identically on both.
fn parse_args<T: serde::de::DeserializeOwned>(
    arguments: Value,
) -> std::result::Result<T, JsonRpcError> {
    serde_json::from_value(arguments).map_err(|e| JsonRpcError::invalid_params(e.to_string()))
}

async fn handle_call_tool(
    id: Option<Value>,
    params: Option<Value>,
    gateway: &ToolGateway,
) -> JsonRpcResponse {
    let params = match params {
        Some(p) => p,
        None => {
            return JsonRpcResponse::error(id, JsonRpcError::invalid_params("Missing parameters"))
        }
    };
    let name = match params.get("name").and_then(|v| v.as_str()) {
        Some(name) => name.to_string(),
        None => {
            return JsonRpcResponse::error(id, JsonRpcError::invalid_params("Missing tool name"))
        }
    };
    let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

    info!(tool = %name, "calling tool");
    // Dispatch per tool; every success is a list of text blocks.
    let blocks: std::result::Result<Vec<String>, JsonRpcError> = match name.as_str() {
        "search" => match parse_args::<SearchArgs>(arguments) {
            Ok(args) => gateway
                .search(&args.engine, &args.query)
                .await
                .map_err(caller_error),
            Err(e) => Err(e),
        },
        "scrape-url" => match parse_args::<ScrapeUrlArgs>(arguments) {
            Ok(args) => gateway
                .scrape_url(&args.url)
                .await
                .map(|block| vec![block])
                .map_err(caller_error),
            Err(e) => Err(e),
        },
        "knowledge-search" => match parse_args::<KnowledgeSearchArgs>(arguments) {
            Ok(args) => gateway
                .knowledge_search(&args.query)
                .await
                .map_err(caller_error),
            Err(e) => Err(e),
        },
        "add-note" => match parse_args::<AddNoteArgs>(arguments) {
            Ok(args) => gateway
                .add_note(&args.name, &args.content)
                .map(|block| vec![block])
                .map_err(caller_error),
            Err(e) => Err(e),
        },
        other => Err(caller_error(CallerError::UnknownTool(other.to_string()))),
    };

    match blocks {
        Ok(blocks) => {
            let content: Vec<Value> = blocks
                .into_iter()
                .map(|text| json!({ "type": "text", "text": text }))
                .collect();
            JsonRpcResponse::success(id, json!({ "content": content }))
        }
        Err(e) => JsonRpcResponse::error(id, e),
    }
}

fn handle_list_resources(id: Option<Value>, gateway: &ToolGateway) -> JsonRpcResponse {
    let resources: Vec<Value> = gateway
        .note_names()
        .into_iter()
        .map(|name| {
            json!({
                "uri": note_uri(&name),
                "name": format!("Note: {name}"),
                "description": format!("A simple note named {name}"),
                "mimeType": "text/plain"
            })
        })
        .collect();
    JsonRpcResponse::success(id, json!({ "resources": resources }))
}

fn handle_read_resource(
    id: Option<Value>,
    params: Option<Value>,
    gateway: &ToolGateway,
) -> JsonRpcResponse {
    let uri = match params
        .as_ref()
        .and_then(|p| p.get("uri"))
        .and_then(|v| v.as_str())
    {
        Some(uri) => uri.to_string(),
        None => {
            return JsonRpcResponse::error(id, JsonRpcError::invalid_params("Missing resource URI"))
        }
    };

    match gateway.read_note(&uri) {
        Ok(content) => JsonRpcResponse::success(
            id,
            json!({
                "contents": [{
                    "uri": uri,
                    "mimeType": "text/plain",
                    "text": content
                }]
            }),
        ),
        Err(e) => JsonRpcResponse::error(id, caller_error(e)),
    }
}

async fn handle_events(
    State(state): State<HttpState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("new SSE connection established");
    let rx = state.gateway.subscribe_events();

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => {
                let sse = Event::default().event(event.kind()).json_data(&event).ok()?;
                Some(Ok(sse))
            }
            Err(e) => {
                warn!("SSE broadcast error: {e}");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
