//! MCP stdio service.
//!
//! Thin rmcp layer over the gateway: typed tool arguments give the protocol
//! schema, and the `note://` resource surface is served from the note store.
//! All formatting and routing decisions live in [`ToolGateway`].

use rmcp::{
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::AnnotateAble,
    model::{
        CallToolResult, Content, ListResourcesResult, PaginatedRequestParam, RawResource,
        ReadResourceRequestParam, ReadResourceResult, ResourceContents, ServerCapabilities,
        ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

use crate::gateway::{note_uri, CallerError, ToolGateway};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchArgs {
    /// Search engine to use: one of tavily, serper, bing, google, linkup, exa.
    pub engine: String,
    /// Search query.
    pub query: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ScrapeUrlArgs {
    /// URL to scrape.
    pub url: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct KnowledgeSearchArgs {
    /// Search query for the knowledge base.
    pub query: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddNoteArgs {
    /// Unique note name; an existing note with the same name is overwritten.
    pub name: String,
    /// Note content.
    pub content: String,
}

#[derive(Clone)]
pub struct SearchpipeService {
    gateway: Arc<ToolGateway>,
    tool_router: ToolRouter<Self>,
}

fn caller_error(e: CallerError) -> McpError {
    McpError::invalid_params(e.to_string(), None)
}

fn text_blocks(blocks: Vec<String>) -> CallToolResult {
    CallToolResult::success(blocks.into_iter().map(Content::text).collect())
}

#[tool_router]
impl SearchpipeService {
    pub fn new(gateway: Arc<ToolGateway>) -> Self {
        Self {
            gateway,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Search internet using specified search engine")]
    async fn search(
        &self,
        Parameters(args): Parameters<SearchArgs>,
    ) -> Result<CallToolResult, McpError> {
        let blocks = self
            .gateway
            .search(&args.engine, &args.query)
            .await
            .map_err(caller_error)?;
        Ok(text_blocks(blocks))
    }

    #[tool(name = "scrape-url", description = "Scrape content from a URL")]
    async fn scrape_url(
        &self,
        Parameters(args): Parameters<ScrapeUrlArgs>,
    ) -> Result<CallToolResult, McpError> {
        let block = self.gateway.scrape_url(&args.url).await.map_err(caller_error)?;
        Ok(text_blocks(vec![block]))
    }

    #[tool(name = "knowledge-search", description = "Search the internal knowledge base")]
    async fn knowledge_search(
        &self,
        Parameters(args): Parameters<KnowledgeSearchArgs>,
    ) -> Result<CallToolResult, McpError> {
        let blocks = self
            .gateway
            .knowledge_search(&args.query)
            .await
            .map_err(caller_error)?;
        Ok(text_blocks(blocks))
    }

    #[tool(name = "add-note", description = "Add a new note")]
    async fn add_note(
        &self,
        Parameters(args): Parameters<AddNoteArgs>,
    ) -> Result<CallToolResult, McpError> {
        let block = self
            .gateway
            .add_note(&args.name, &args.content)
            .map_err(caller_error)?;
        Ok(text_blocks(vec![block]))
    }
}

#[tool_handler]
impl ServerHandler for SearchpipeService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Web search across several engines, URL scraping, knowledge-base \
                 queries, and ephemeral notes. Notes are listed as note:// resources."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            ..Default::default()
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let resources = self
            .gateway
            .note_names()
            .into_iter()
            .map(|name| {
                let mut raw = RawResource::new(note_uri(&name), format!("Note: {name}"));
                raw.description = Some(format!("A simple note named {name}"));
                raw.mime_type = Some("text/plain".to_string());
                raw.no_annotation()
            })
            .collect();
        Ok(ListResourcesResult {
            meta: None,
            resources,
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri }: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        match self.gateway.read_note(&uri) {
            Ok(content) => Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(content, uri)],
            }),
            Err(e @ CallerError::UnsupportedScheme(_)) => Err(caller_error(e)),
            Err(e) => Err(McpError::resource_not_found(
                e.to_string(),
                Some(serde_json::json!({ "uri": uri })),
            )),
        }
    }
}

pub async fn serve_stdio(gateway: Arc<ToolGateway>) -> Result<(), McpError> {
    let svc = SearchpipeService::new(gateway);
    let running = svc
        .serve(stdio())
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    // Keep the stdio server alive until the client closes.
    running
        .waiting()
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(())
}
