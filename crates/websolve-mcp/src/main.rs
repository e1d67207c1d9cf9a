use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::process::ExitCode;

mod app;
mod mcp;
mod ops;

use app::App;
use ops::ToolOutput;

#[derive(Parser, Debug)]
#[command(name = "websolve")]
#[command(about = "Find solutions for error messages via SearXNG (CLI + MCP stdio server)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as an MCP stdio server (for Cursor / Claude Desktop / MCP clients).
    McpStdio,
    /// Search the web through SearXNG.
    Search(SearchCmd),
    /// Fetch a URL and convert it (markdown, html, text or json).
    Fetch(FetchCmd),
    /// Find ranked solutions for an error message.
    Solve(SolveCmd),
    /// Diagnose configuration/launch issues (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct SearchCmd {
    query: String,
    #[arg(long)]
    pageno: Option<u32>,
    /// day, week, month or year.
    #[arg(long)]
    time_range: Option<String>,
    #[arg(long)]
    language: Option<String>,
    /// 0 (none), 1 (moderate), 2 (strict).
    #[arg(long)]
    safesearch: Option<i64>,
    #[arg(long)]
    max_results: Option<usize>,
    /// Output format: json|markdown
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct FetchCmd {
    url: String,
    /// Content format: markdown, html, text or json.
    #[arg(long = "content-format", default_value = "markdown")]
    content_format: String,
    /// Return the body without conversion.
    #[arg(long)]
    raw: bool,
    #[arg(long)]
    max_bytes: Option<u64>,
    /// Extra request header as `Name: value`. Repeatable.
    #[arg(long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,
    /// Output format: json|markdown
    #[arg(long = "output", default_value = "json")]
    output: String,
}

fn parse_header(raw: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got {raw:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("header name must not be empty".to_string());
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[derive(clap::Args, Debug)]
struct SolveCmd {
    /// Error message or stack trace. Use `-` to read it from stdin.
    error_message: String,
    #[arg(long)]
    tech_stack: Option<String>,
    #[arg(long, default_value_t = 5, allow_negative_numbers = true)]
    max_results: i64,
    /// Output format: json|markdown
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
    /// Spawn a child `websolve mcp-stdio` and call `list_tools` to prove an MCP client can start it.
    ///
    /// No search or fetch is performed and no secret values are printed.
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    check_stdio: bool,
    /// Also send one query to the configured SearXNG instance.
    #[arg(long, action = clap::ArgAction::Set, default_value_t = false)]
    check_searxng: bool,
    /// Timeout for each live check (ms).
    #[arg(long, default_value_t = 3000)]
    timeout_ms: u64,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

/// Load `KEY=VALUE` lines from `path`; variables already in the process environment win.
fn load_env_file(path: &str) {
    let Ok(txt) = std::fs::read_to_string(path) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let s = s.strip_prefix("export ").unwrap_or(s);
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        let v = v.trim().trim_matches('"');
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
        }
    }
}

/// `LOG_LEVEL` (DEBUG/INFO/WARNING/ERROR) to a tracing filter directive.
fn level_from_log_level(raw: Option<&str>) -> &'static str {
    match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
        Some("TRACE") => "trace",
        Some("DEBUG") => "debug",
        Some("INFO") => "info",
        Some("ERROR") | Some("CRITICAL") => "error",
        _ => "warn",
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let level = level_from_log_level(std::env::var("LOG_LEVEL").ok().as_deref());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // stdout carries MCP JSON-RPC; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();
}

fn wants_markdown(output: &str) -> bool {
    matches!(
        output.trim().to_ascii_lowercase().as_str(),
        "markdown" | "md" | "text"
    )
}

fn emit(out: &ToolOutput, output: &str) -> ExitCode {
    if wants_markdown(output) {
        println!("{}", out.markdown);
    } else {
        println!("{}", out.payload);
    }
    if out.ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    if let Ok(p) = std::env::var("WEBSOLVE_ENV_FILE") {
        let p = p.trim();
        if !p.is_empty() {
            load_env_file(p);
        }
    }
    init_tracing();

    let cli = Cli::parse();

    let code = match cli.command {
        Commands::McpStdio => {
            let app = App::from_env()?;
            mcp::serve_stdio(app)
                .await
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            ExitCode::SUCCESS
        }
        Commands::Search(args) => {
            let app = App::from_env()?;
            let out = ops::metasearch_web(
                &app,
                ops::MetasearchWebArgs {
                    query: Some(args.query),
                    pageno: args.pageno,
                    time_range: args.time_range,
                    language: args.language,
                    safesearch: args.safesearch,
                    max_results: args.max_results,
                },
            )
            .await;
            emit(&out, &args.output)
        }
        Commands::Fetch(args) => {
            let app = App::from_env()?;
            let out = ops::fetch_web_content(
                &app,
                ops::FetchWebContentArgs {
                    url: Some(args.url),
                    format: Some(args.content_format),
                    raw: Some(args.raw),
                    max_bytes: args.max_bytes,
                    headers: (!args.headers.is_empty())
                        .then(|| args.headers.into_iter().collect()),
                },
            )
            .await;
            emit(&out, &args.output)
        }
        Commands::Solve(args) => {
            let message = if args.error_message == "-" {
                let mut s = String::new();
                std::io::stdin().read_to_string(&mut s)?;
                s
            } else {
                args.error_message
            };
            let app = App::from_env()?;
            let out = ops::find_error_solutions(
                &app,
                ops::FindErrorSolutionsArgs {
                    error_message: Some(message),
                    tech_stack: args.tech_stack,
                    max_results: Some(args.max_results),
                },
            )
            .await;
            emit(&out, &args.output)
        }
        Commands::Doctor(args) => doctor(args).await?,
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "websolve",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" | "markdown" => println!("websolve {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{}", v),
            }
            ExitCode::SUCCESS
        }
    };
    Ok(code)
}

async fn doctor(args: DoctorCmd) -> Result<ExitCode> {
    use websolve_core::{SearchProvider, SearchQuery};
    use websolve_local::{LocalConfig, SearxngSearchProvider};
    use websolve_pipeline::{CompiledTables, FinderConfig};

    fn has_env(k: &str) -> bool {
        std::env::var(k).ok().is_some_and(|v| !v.trim().is_empty())
    }

    let t0 = std::time::Instant::now();
    let mut checks: Vec<serde_json::Value> = Vec::new();

    let local = LocalConfig::from_env();
    checks.push(serde_json::json!({
        "name": "config_valid",
        "ok": local.is_ok(),
        "message": match &local {
            Ok(_) => "environment configuration parsed".to_string(),
            Err(e) => e.to_string(),
        },
        "hint": if local.is_ok() { "" } else { "Fix SEARXNG_URL / WEBSOLVE_SEARXNG_ENDPOINTS (must start with http:// or https://)." },
    }));
    let local = local.unwrap_or_default();

    let tables = CompiledTables::from_env();
    checks.push(serde_json::json!({
        "name": "patterns_compile",
        "ok": tables.is_ok(),
        "message": match &tables {
            Ok(_) => "pattern tables compiled".to_string(),
            Err(e) => e.to_string(),
        },
        "hint": if tables.is_ok() { "" } else { "Fix or unset WEBSOLVE_PATTERNS_FILE." },
    }));

    if args.check_searxng {
        let check_t0 = std::time::Instant::now();
        let res = match SearxngSearchProvider::from_config(&local) {
            Ok(p) => {
                let mut q = SearchQuery::new("websolve doctor");
                q.max_results = Some(1);
                q.timeout_ms = Some(args.timeout_ms);
                p.search(&q).await.map(|r| r.results.len())
            }
            Err(e) => Err(e),
        };
        checks.push(serde_json::json!({
            "name": "searxng_reachable",
            "ok": res.is_ok(),
            "message": match &res {
                Ok(n) => format!("searxng answered ({n} results)"),
                Err(e) => e.to_string(),
            },
            "hint": if res.is_ok() { "" } else { "Check SEARXNG_URL, basic auth and that the instance enables the json output format." },
            "elapsed_ms": check_t0.elapsed().as_millis(),
        }));
    }

    let mut stdio_ok: Option<bool> = None;
    let mut stdio_tool_count: Option<usize> = None;
    let mut stdio_error: Option<serde_json::Value> = None;
    let mut stdio_elapsed_ms: Option<u128> = None;

    if args.check_stdio {
        use rmcp::service::ServiceExt;
        use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};
        use tokio::process::Command;

        let exe = std::env::current_exe().unwrap_or_else(|_| std::path::PathBuf::from("websolve"));
        let child = TokioChildProcess::new(Command::new(exe).configure(|cmd| {
            cmd.args(["mcp-stdio"]);
            cmd.env("RUST_LOG", "error");
        }))?;

        let service = ().serve(child).await?;
        let check_t0 = std::time::Instant::now();
        let res = tokio::time::timeout(
            std::time::Duration::from_millis(args.timeout_ms),
            service.list_tools(Default::default()),
        )
        .await;
        stdio_elapsed_ms = Some(check_t0.elapsed().as_millis());

        match res {
            Ok(Ok(tools)) => {
                stdio_ok = Some(true);
                stdio_tool_count = Some(tools.tools.len());
            }
            Ok(Err(e)) => {
                stdio_ok = Some(false);
                stdio_error = Some(serde_json::json!({
                    "code": "handshake_failed",
                    "message": e.to_string(),
                    "hint": "The child closed the stdio transport. Check that nothing is printed to stdout in mcp-stdio mode and that the client runs `websolve mcp-stdio`."
                }));
            }
            Err(_elapsed) => {
                stdio_ok = Some(false);
                stdio_error = Some(serde_json::json!({
                    "code": "timeout",
                    "message": format!("stdio handshake timed out after {}ms", args.timeout_ms),
                    "hint": "The child did not answer list_tools in time; run `websolve mcp-stdio` by hand with LOG_LEVEL=DEBUG."
                }));
            }
        }

        let _ = service.cancel().await;
    }

    checks.push(serde_json::json!({
        "name": "mcp_stdio_handshake",
        "ok": if args.check_stdio { stdio_ok.unwrap_or(false) } else { true },
        "skipped": !args.check_stdio,
        "message": if !args.check_stdio {
            "stdio MCP handshake skipped"
        } else if stdio_ok.unwrap_or(false) {
            "stdio MCP handshake succeeded"
        } else {
            "stdio MCP handshake failed"
        },
        "tool_count": stdio_tool_count,
        "elapsed_ms": stdio_elapsed_ms,
        "error": stdio_error,
    }));

    let searxng_configured = !local.searxng_endpoints.is_empty();
    let mut warnings: Vec<&str> = Vec::new();
    if !searxng_configured {
        warnings.push("SEARXNG_URL is not set; metasearch_web and find_error_solutions return not_configured.");
    }

    let ok = checks.iter().all(|c| c["ok"].as_bool().unwrap_or(false));
    let payload = serde_json::json!({
        "schema_version": 1,
        "kind": "doctor",
        "ok": ok,
        "name": "websolve",
        "version": env!("CARGO_PKG_VERSION"),
        "platform": {
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        },
        "elapsed_ms": t0.elapsed().as_millis(),
        "configured": {
            "searxng": searxng_configured,
            "searxng_endpoints": local.searxng_endpoints.len(),
            "basic_auth": local.auth.is_some(),
            "proxy": local.proxy.is_some(),
            "patterns_file": has_env("WEBSOLVE_PATTERNS_FILE"),
            "env_file": has_env("WEBSOLVE_ENV_FILE"),
            "allow_private_urls": local.allow_private_urls,
            "allow_unsafe_headers": local.allow_unsafe_headers,
        },
        "limits": {
            "search_timeout_ms": local.search_timeout.as_millis(),
            "max_content_size": local.max_content_size,
        },
        "finder": FinderConfig::from_env(),
        "warnings": warnings,
        "checks": checks,
    });

    match args.output.to_ascii_lowercase().as_str() {
        "text" | "markdown" => {
            println!("websolve {} (ok={})", env!("CARGO_PKG_VERSION"), ok);
            println!(
                "searxng: configured={} endpoints={}",
                searxng_configured,
                local.searxng_endpoints.len()
            );
            for w in &warnings {
                println!("warning: {w}");
            }
            println!("checks:");
            for c in &checks {
                let name = c["name"].as_str().unwrap_or("?");
                if c["skipped"].as_bool().unwrap_or(false) {
                    println!("- {name}: skipped");
                } else {
                    let ok = c["ok"].as_bool().unwrap_or(false);
                    println!("- {name}: {}", if ok { "ok" } else { "fail" });
                }
            }
        }
        _ => println!("{payload}"),
    }
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
