//! incr-engine: in-memory incremental ingestion engine over HTTP.
//!
//! Serves the incremental management endpoints at
//! `/api/catalog/incremental` for local development against `incr-cli`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use incr_core::{load_dotenv, Config, Lifecycle};
use incr_ingestion::router;
use incr_ingestion::{MemoryEngine, CATALOG_PLUGIN_ID};
use incr_metrics::{RootMetricsService, RootTelemetry};

// ── CLI ─────────────────────────────────────────────────────────────

/// In-memory incremental ingestion engine.
#[derive(Parser, Debug)]
#[command(name = "incr-engine", version, about)]
struct Cli {
    /// Path to config.toml (defaults to ~/.config/incr/config.toml).
    #[arg(long, env = "INCR_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind, overriding `[engine].bind`.
    #[arg(long)]
    bind: Option<String>,

    /// Provider to register; repeatable. Added to `[engine].providers`.
    #[arg(long = "provider")]
    providers: Vec<String>,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("failed to load config")?;
    if let Some(bind) = cli.bind {
        config.engine.bind = bind;
    }
    config.engine.providers.extend(cli.providers);
    config.log_summary();

    let lifecycle = Lifecycle::new();
    let telemetry =
        RootTelemetry::from_config(&config.telemetry).context("failed to initialise telemetry")?;
    telemetry.bootstrap(&lifecycle);

    let plugin_metrics = telemetry
        .root_metrics()
        .for_plugin(CATALOG_PLUGIN_ID, Some(env!("CARGO_PKG_VERSION")));

    if config.engine.providers.is_empty() {
        warn!("no providers configured; pass --provider or set [engine].providers");
    }
    let engine = Arc::new(MemoryEngine::with_metrics(
        config.engine.providers.clone(),
        plugin_metrics.as_ref(),
    ));

    lifecycle.startup().context("startup hook failed")?;

    let listener = TcpListener::bind(&config.engine.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.engine.bind))?;

    router::serve(listener, engine, async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down");
        }
    })
    .await
    .context("server error")?;

    lifecycle.shutdown().context("shutdown hook failed")?;
    Ok(())
}
