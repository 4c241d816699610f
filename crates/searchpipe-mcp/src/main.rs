use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use searchpipe::gateway::ToolGateway;
use searchpipe::supervise::{run_supervised, RestartPolicy};

#[derive(Parser, Debug)]
#[command(name = "searchpipe")]
#[command(about = "Multi-provider search/scrape/knowledge tools (MCP stdio + HTTP/SSE server)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as an MCP stdio server (for MCP clients).
    McpStdio,
    /// Run the HTTP/SSE transport (JSON-RPC POST + SSE events).
    McpHttp(McpHttpCmd),
    /// Diagnose configuration/launch issues (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version,
}

#[derive(clap::Args, Debug)]
struct McpHttpCmd {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    #[arg(long, default_value_t = 7700)]
    port: u16,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Also probe the stdio MCP handshake by spawning this binary.
    #[arg(long, action = clap::ArgAction::Set, default_value_t = false)]
    check_stdio: bool,
    /// Timeout for the stdio probe.
    #[arg(long, default_value_t = 8_000)]
    timeout_ms: u64,
}

/// Opt-in env-file loader.
///
/// MCP server environments often aren't interactive shells, so users want a
/// single place to keep keys without exporting them manually. Opt-in only,
/// never overrides explicit process env, never logs values.
fn load_env_file() {
    let Ok(path) = std::env::var("SEARCHPIPE_ENV_FILE") else {
        return;
    };
    let path = path.trim();
    if path.is_empty() {
        return;
    }
    let Ok(txt) = std::fs::read_to_string(path) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v.trim());
        }
    }
}

fn init_tracing() {
    // stdout is reserved for JSON-RPC on the stdio transport; log to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_file();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::McpStdio => {
            run_supervised(RestartPolicy::default(), "mcp-stdio", || async {
                let gateway = Arc::new(ToolGateway::from_env()?);
                searchpipe::service::serve_stdio(gateway)
                    .await
                    .map_err(|e| anyhow::anyhow!(e.to_string()))
            })
            .await?;
        }
        Commands::McpHttp(args) => {
            let host = args.host.clone();
            run_supervised(RestartPolicy::default(), "mcp-http", || {
                let host = host.clone();
                async move {
                    let gateway = Arc::new(ToolGateway::from_env()?);
                    searchpipe::http::serve(&host, args.port, gateway).await
                }
            })
            .await?;
        }
        Commands::Doctor(args) => {
            let payload = run_doctor(&args).await;
            println!("{}", serde_json::to_string_pretty(&payload)?);
            if payload["ok"].as_bool() != Some(true) {
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "name": "searchpipe",
                    "version": env!("CARGO_PKG_VERSION"),
                }))?
            );
        }
    }

    Ok(())
}

fn has_env(k: &str) -> bool {
    std::env::var(k).ok().is_some_and(|v| !v.trim().is_empty())
}

async fn run_doctor(args: &DoctorCmd) -> serde_json::Value {
    // Env presence only; never print values.
    const REQUIRED: [(&str, &str, &str); 9] = [
        ("tavily_api_key", "SEARCHPIPE_TAVILY_API_KEY", "TAVILY_API_KEY"),
        ("serper_api_key", "SEARCHPIPE_SERPER_API_KEY", "SERPER_API_KEY"),
        ("bing_api_key", "SEARCHPIPE_BING_API_KEY", "BING_API_KEY"),
        ("google_api_key", "SEARCHPIPE_GOOGLE_API_KEY", "GOOGLE_API_KEY"),
        (
            "google_search_engine_id",
            "SEARCHPIPE_GOOGLE_SEARCH_ENGINE_ID",
            "GOOGLE_SEARCH_ENGINE_ID",
        ),
        ("linkup_api_key", "SEARCHPIPE_LINKUP_API_KEY", "LINKUP_API_KEY"),
        ("exa_api_key", "SEARCHPIPE_EXA_API_KEY", "EXA_API_KEY"),
        (
            "knowledge_base_url",
            "SEARCHPIPE_KNOWLEDGE_BASE_URL",
            "KNOWLEDGE_BASE_URL",
        ),
        ("jina_api_key", "SEARCHPIPE_JINA_API_KEY", "JINA_API_KEY"),
    ];

    let mut ok = true;
    let mut checks: Vec<serde_json::Value> = Vec::new();
    for (name, prefixed, bare) in REQUIRED {
        let present = has_env(prefixed) || has_env(bare);
        ok &= present;
        checks.push(serde_json::json!({
            "name": name,
            "ok": present,
            "hint": if present { String::new() } else { format!("Set {prefixed} (or {bare}).") },
        }));
    }

    let mut payload = serde_json::json!({ "ok": ok, "checks": checks });

    if args.check_stdio {
        let t0 = std::time::Instant::now();
        match probe_stdio(args.timeout_ms).await {
            Ok(tool_count) => {
                payload["stdio"] = serde_json::json!({
                    "ok": true,
                    "tool_count": tool_count,
                    "elapsed_ms": t0.elapsed().as_millis(),
                });
            }
            Err(e) => {
                payload["stdio"] = serde_json::json!({
                    "ok": false,
                    "error": e.to_string(),
                    "elapsed_ms": t0.elapsed().as_millis(),
                });
            }
        }
    }

    payload
}

/// Spawn this binary as an MCP stdio server and confirm the handshake and
/// tool listing work end to end.
async fn probe_stdio(timeout_ms: u64) -> Result<usize> {
    use rmcp::service::ServiceExt;
    use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};

    let exe = std::env::current_exe().unwrap_or_else(|_| std::path::PathBuf::from("searchpipe"));
    let child = TokioChildProcess::new(tokio::process::Command::new(exe).configure(|cmd| {
        cmd.args(["mcp-stdio"]);
        // Keep the probe's stderr quiet unless explicitly enabled.
        cmd.env("RUST_LOG", "error");
    }))?;

    let service = ().serve(child).await?;
    let tools = tokio::time::timeout(
        std::time::Duration::from_millis(timeout_ms),
        service.list_tools(Default::default()),
    )
    .await??;
    let count = tools.tools.len();
    service.cancel().await?;
    Ok(count)
}
