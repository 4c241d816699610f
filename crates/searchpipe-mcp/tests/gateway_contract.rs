//! Offline end-to-end contract for the tool gateway.
//!
//! Every outbound endpoint is stubbed with a local axum server and wired in
//! through the endpoint-override environment variables, so these tests are
//! stable and run without network access or real keys.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;

use axum::{routing::get, routing::post, Json, Router};
use searchpipe::gateway::{CallerError, GatewayEvent, ToolGateway};

// Env vars are process-global; serialize tests that touch them.
static ENV_LOCK: Mutex<()> = Mutex::new(());

const ALL_ENV_KEYS: [&str; 21] = [
    "SEARCHPIPE_TAVILY_API_KEY",
    "TAVILY_API_KEY",
    "SEARCHPIPE_SERPER_API_KEY",
    "SERPER_API_KEY",
    "SEARCHPIPE_BING_API_KEY",
    "BING_API_KEY",
    "SEARCHPIPE_GOOGLE_API_KEY",
    "GOOGLE_API_KEY",
    "SEARCHPIPE_GOOGLE_SEARCH_ENGINE_ID",
    "GOOGLE_SEARCH_ENGINE_ID",
    "SEARCHPIPE_LINKUP_API_KEY",
    "LINKUP_API_KEY",
    "SEARCHPIPE_EXA_API_KEY",
    "EXA_API_KEY",
    "SEARCHPIPE_KNOWLEDGE_BASE_URL",
    "KNOWLEDGE_BASE_URL",
    "SEARCHPIPE_JINA_API_KEY",
    "JINA_API_KEY",
    "SEARCHPIPE_TAVILY_ENDPOINT",
    "SEARCHPIPE_SERPER_ENDPOINT",
    "SEARCHPIPE_KNOWLEDGE_TIMEOUT_MS",
];

struct EnvGuard {
    _lock: std::sync::MutexGuard<'static, ()>,
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn new() -> Self {
        // Recover the guard if a prior test panicked while holding the lock.
        let lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut saved: Vec<(String, Option<String>)> = ALL_ENV_KEYS
            .iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect();
        for extra in [
            "SEARCHPIPE_BING_ENDPOINT",
            "SEARCHPIPE_GOOGLE_ENDPOINT",
            "SEARCHPIPE_LINKUP_ENDPOINT",
            "SEARCHPIPE_EXA_ENDPOINT",
            "SEARCHPIPE_READER_ENDPOINT",
            "SEARCHPIPE_HTTP_TIMEOUT_MS",
        ] {
            saved.push((extra.to_string(), std::env::var(extra).ok()));
        }
        for (k, _) in &saved {
            std::env::remove_var(k);
        }
        Self { _lock: lock, saved }
    }

    fn set(&self, k: &str, v: &str) {
        std::env::set_var(k, v);
    }

    /// Dummy keys for every adapter so the gateway starts fully configured.
    fn set_base_config(&self) {
        self.set("SEARCHPIPE_TAVILY_API_KEY", "test-tavily");
        self.set("SEARCHPIPE_SERPER_API_KEY", "test-serper");
        self.set("SEARCHPIPE_BING_API_KEY", "test-bing");
        self.set("SEARCHPIPE_GOOGLE_API_KEY", "test-google");
        self.set("SEARCHPIPE_GOOGLE_SEARCH_ENGINE_ID", "test-google-id");
        self.set("SEARCHPIPE_LINKUP_API_KEY", "test-linkup");
        self.set("SEARCHPIPE_EXA_API_KEY", "test-exa");
        self.set("SEARCHPIPE_KNOWLEDGE_BASE_URL", "http://127.0.0.1:9");
        self.set("SEARCHPIPE_JINA_API_KEY", "test-jina");
        self.set("SEARCHPIPE_HTTP_TIMEOUT_MS", "2000");
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (k, v) in self.saved.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

async fn spawn_stub(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("axum serve");
    });
    addr
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn search_tavily_formats_one_block_per_result() {
    let env = EnvGuard::new();
    env.set_base_config();

    let app = Router::new().route(
        "/search",
        post(|| async {
            Json(serde_json::json!({
                "results": [ { "content": "C", "url": "U" } ]
            }))
        }),
    );
    let addr = spawn_stub(app).await;
    env.set(
        "SEARCHPIPE_TAVILY_ENDPOINT",
        &format!("http://{addr}/search"),
    );

    let gateway = ToolGateway::from_env().expect("gateway");
    let blocks = gateway.search("tavily", "x").await.expect("search");
    assert_eq!(blocks.len(), 1);
    assert!(blocks[0].contains("Tavily"));
    assert!(blocks[0].contains("C"));
    assert!(blocks[0].contains("U"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_engine_yields_zero_blocks() {
    let env = EnvGuard::new();
    env.set_base_config();

    let gateway = ToolGateway::from_env().expect("gateway");
    let blocks = gateway.search("unknown-provider", "q").await.expect("search");
    assert!(blocks.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn provider_http_error_collapses_to_zero_blocks() {
    let env = EnvGuard::new();
    env.set_base_config();

    let app = Router::new().route(
        "/search",
        post(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let addr = spawn_stub(app).await;
    env.set(
        "SEARCHPIPE_SERPER_ENDPOINT",
        &format!("http://{addr}/search"),
    );

    let gateway = ToolGateway::from_env().expect("gateway");
    let blocks = gateway.search("serper", "q").await.expect("search");
    assert!(blocks.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_search_arguments_are_rejected_before_dispatch() {
    let env = EnvGuard::new();
    env.set_base_config();

    let gateway = ToolGateway::from_env().expect("gateway");
    assert!(matches!(
        gateway.search("", "q").await,
        Err(CallerError::MissingArgument("engine"))
    ));
    assert!(matches!(
        gateway.search("tavily", "   ").await,
        Err(CallerError::MissingArgument("query"))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn knowledge_zero_results_is_a_no_results_block() {
    let env = EnvGuard::new();
    env.set_base_config();

    let app = Router::new().route(
        "/query",
        post(|| async { Json(serde_json::json!({ "results": [] })) }),
    );
    let addr = spawn_stub(app).await;
    env.set("SEARCHPIPE_KNOWLEDGE_BASE_URL", &format!("http://{addr}"));

    let gateway = ToolGateway::from_env().expect("gateway");
    let blocks = gateway.knowledge_search("x").await.expect("knowledge");
    assert_eq!(blocks, vec!["No results found in knowledge base".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn knowledge_hits_are_formatted_and_summary_never_leaks() {
    let env = EnvGuard::new();
    env.set_base_config();

    let app = Router::new().route(
        "/query",
        post(|| async {
            Json(serde_json::json!({
                "results": [
                    { "file_name": "test.txt", "chunk_text": "Test content", "relevance_score": 0.9 }
                ],
                "summary": "UPSTREAM-SYNTHESIZED-BLOB",
                "relevant_count": 1
            }))
        }),
    );
    let addr = spawn_stub(app).await;
    env.set("SEARCHPIPE_KNOWLEDGE_BASE_URL", &format!("http://{addr}"));

    let gateway = ToolGateway::from_env().expect("gateway");
    let blocks = gateway.knowledge_search("test query").await.expect("knowledge");
    assert_eq!(blocks.len(), 1);
    assert!(blocks[0].contains("Source: test.txt"));
    assert!(blocks[0].contains("Content: Test content"));
    assert!(blocks[0].contains("Relevance: 0.9"));
    assert!(blocks[0].contains("Type: vector"));
    assert!(!blocks.iter().any(|b| b.contains("UPSTREAM-SYNTHESIZED-BLOB")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn knowledge_timeout_is_an_explicit_failure_block() {
    let env = EnvGuard::new();
    env.set_base_config();

    let app = Router::new().route(
        "/query",
        post(|| async {
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            Json(serde_json::json!({ "results": [] }))
        }),
    );
    let addr = spawn_stub(app).await;
    env.set("SEARCHPIPE_KNOWLEDGE_BASE_URL", &format!("http://{addr}"));
    env.set("SEARCHPIPE_KNOWLEDGE_TIMEOUT_MS", "50");

    let gateway = ToolGateway::from_env().expect("gateway");
    let blocks = gateway.knowledge_search("x").await.expect("knowledge");
    assert_eq!(blocks.len(), 1);
    assert!(blocks[0].starts_with("Failed to search knowledge base:"));
    assert!(blocks[0].contains("timed out"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scrape_success_passes_the_body_through_verbatim() {
    let env = EnvGuard::new();
    env.set_base_config();

    const BODY: &str = "Title: Example\n\nRaw extracted text, untouched.";
    let app = Router::new().route("/*rest", get(|| async { BODY }));
    let addr = spawn_stub(app).await;
    env.set("SEARCHPIPE_READER_ENDPOINT", &format!("http://{addr}"));

    let gateway = ToolGateway::from_env().expect("gateway");
    let block = gateway
        .scrape_url("https://example.com/page")
        .await
        .expect("scrape");
    assert_eq!(
        block,
        format!("Successfully scraped content from https://example.com/page:\n\n{BODY}")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scrape_http_error_is_a_failure_block() {
    let env = EnvGuard::new();
    env.set_base_config();

    let app = Router::new().route(
        "/*rest",
        get(|| async { (axum::http::StatusCode::FORBIDDEN, "denied") }),
    );
    let addr = spawn_stub(app).await;
    env.set("SEARCHPIPE_READER_ENDPOINT", &format!("http://{addr}"));

    let gateway = ToolGateway::from_env().expect("gateway");
    let block = gateway
        .scrape_url("https://example.com/page")
        .await
        .expect("scrape");
    assert!(block.starts_with("Failed to scrape https://example.com/page:"));
    assert!(block.contains("403"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn notes_round_trip_overwrite_and_resource_errors() {
    let env = EnvGuard::new();
    env.set_base_config();

    let gateway = ToolGateway::from_env().expect("gateway");

    let confirmation = gateway.add_note("test", "test content").expect("add");
    assert!(confirmation.contains("test content"));
    assert_eq!(
        gateway.read_note("note://internal/test").expect("read"),
        "test content"
    );

    gateway.add_note("test", "replaced").expect("overwrite");
    assert_eq!(
        gateway.read_note("note://internal/test").expect("read"),
        "replaced"
    );
    assert_eq!(gateway.note_names(), vec!["test".to_string()]);

    assert!(matches!(
        gateway.read_note("note://internal/missing"),
        Err(CallerError::NoteNotFound(_))
    ));
    assert!(matches!(
        gateway.read_note("file:///etc/passwd"),
        Err(CallerError::UnsupportedScheme(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn gateway_events_are_broadcast_on_note_add() {
    let env = EnvGuard::new();
    env.set_base_config();

    let gateway = Arc::new(ToolGateway::from_env().expect("gateway"));
    let mut rx = gateway.subscribe_events();

    gateway.add_note("evented", "content").expect("add");

    let event = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
        .await
        .expect("event in time")
        .expect("channel open");
    match event {
        GatewayEvent::NoteAdded { name } => assert_eq!(name, "evented"),
        other => panic!("unexpected event: {other:?}"),
    }
}
