//! Tutor CLI
//!
//! Main entry point for serving the adaptive tutor session API.

use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use tutor_engine::{
    create_router, AppState, ChatCompletionsClient, Config, JsonlProgressLog, SessionOrchestrator,
};

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 3000;

/// Tutor - Adaptive Learning Session Server
///
/// Generates lesson modules with an OpenAI-compatible chat completions
/// service and serves a session API that walks a learner through each
/// module, scores the quiz, and adapts the next module to the result.
#[derive(Parser, Debug)]
#[command(name = "tutor")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: tutor.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,

    /// Port for the HTTP API server
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Tutor starting");
    tracing::debug!(config = ?args.config, "Config file");

    match run_server(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Loads configuration, wires the session engine and serves the API until
/// Ctrl+C.
async fn run_server(args: Args) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    print_config(&config);

    let client = ChatCompletionsClient::from_config(&config.generator)
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let mut orchestrator = SessionOrchestrator::new(client, config.session.clone());
    if let Some(path) = &config.progress_log {
        let log = JsonlProgressLog::open(path).map_err(|e| anyhow::anyhow!("{e}"))?;
        tracing::info!(path = %log.path().display(), "Recording progress");
        orchestrator = orchestrator.with_progress_sink(Arc::new(log));
    }

    let router = create_router(AppState::new(orchestrator));

    let addr: SocketAddr = ([127, 0, 0, 1], args.port).into();
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!();
    println!("Session API running on http://{addr}/api/session");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {e}"))?;

    tracing::info!("Tutor stopped");
    Ok(())
}

/// Resolves once Ctrl+C is received.
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Received Ctrl+C, shutting down");
    }
}

/// Loads configuration from the given path or the current directory.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Prints the effective configuration.
fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Endpoint: {}", config.generator.endpoint);
    println!("  Model: {}", config.generator.model);
    println!("  API key variable: {}", config.generator.api_key_env);
    println!("  Timeout: {}s", config.generator.timeout_secs);
    println!(
        "  Quiz items: {}, practice items: {}",
        config.session.quiz_item_count, config.session.practice_item_count
    );
    println!(
        "  Thresholds: strong >= {}%, partial >= {}%",
        config.session.thresholds.strong, config.session.thresholds.partial
    );
    println!(
        "  Progress log: {}",
        config.progress_log.as_deref().unwrap_or("disabled")
    );
}
