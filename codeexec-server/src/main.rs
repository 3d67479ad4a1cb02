use anyhow::{Context, Result};
use clap::Parser;
use codeexec_sandbox::{DockerEngine, SandboxService};
use codeexec_server::config::{AppConfig, ConfigOverrides};
use codeexec_server::{router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "codeexec-server")]
#[command(about = "Runs untrusted code submissions in Docker sandboxes")]
pub struct Args {
    /// Path to a TOML config file
    #[arg(short, long, env = "CODEEXEC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on (overrides the config file)
    #[arg(short, long, env = "CODEEXEC_BIND_ADDRESS")]
    pub bind: Option<String>,

    /// Docker socket path (overrides the config file)
    #[arg(long, env = "CODEEXEC_DOCKER_SOCKET")]
    pub docker_socket: Option<String>,

    /// Memory ceiling per sandbox in MiB
    #[arg(long, env = "CODEEXEC_MEMORY_LIMIT_MB")]
    pub memory_limit_mb: Option<u64>,

    /// Timeout applied when a request does not set one, in seconds
    #[arg(long, env = "CODEEXEC_DEFAULT_TIMEOUT_SECS")]
    pub default_timeout_secs: Option<u64>,

    /// Longest timeout a request may ask for, in seconds
    #[arg(long, env = "CODEEXEC_MAX_TIMEOUT_SECS")]
    pub max_timeout_secs: Option<u64>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .init();

    let config = AppConfig::load(args.config.as_deref())
        .and_then(|config| {
            config.with_overrides(ConfigOverrides {
                bind_address: args.bind,
                docker_socket: args.docker_socket,
                memory_limit_mb: args.memory_limit_mb,
                default_timeout_secs: args.default_timeout_secs,
                max_timeout_secs: args.max_timeout_secs,
            })
        })
        .context("Failed to load configuration")?;
    info!("Configuration loaded");

    let engine = DockerEngine::connect(&config.docker_settings())?;
    let service = SandboxService::with_config(Arc::new(engine), config.registry()?, config.limits());

    // executions report provisioning failures until the daemon is up
    match service.ping().await {
        Ok(()) => info!(engine = service.engine_name(), "Runtime engine reachable"),
        Err(err) => warn!(error = %format!("{:#}", err), "Runtime engine not reachable"),
    }

    let app = router(AppState::new(service));
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address))?;
    info!("Starting server on {}", config.server.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
