mod admin;
mod cli;
mod dashboard;
mod terminal;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use incr_core::{load_dotenv, Config, Lifecycle};
use incr_ingestion::{IncrementalIngestionApi, IngestionClient, StaticDiscovery};
use incr_metrics::{RootMetricsService, RootTelemetry};

use crate::admin::{
    load_rows, perform_action, Action, ActionTracker, HealthBanner, MarksPanel,
    NotificationLevel,
};
use crate::cli::{CliArgs, Command};
use crate::dashboard::Dashboard;
use crate::terminal::Terminal;

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let terminal = Terminal::new();

    // Load config, then apply flag overrides
    let mut config =
        Config::load(args.config.as_deref()).context("failed to load configuration")?;
    args.apply_to(&mut config);

    let lifecycle = Lifecycle::new();
    let telemetry =
        RootTelemetry::from_config(&config.telemetry).context("failed to initialise telemetry")?;
    telemetry.bootstrap(&lifecycle);

    let discovery = Arc::new(StaticDiscovery::from_config(&config.backend));
    let mut client = IngestionClient::new(discovery);
    if telemetry.http_instrumentation_enabled() {
        let metrics = telemetry
            .root_metrics()
            .for_service("incr-cli", Some(env!("CARGO_PKG_VERSION")));
        client = client.with_metrics(metrics.as_ref());
    }
    let api: Arc<dyn IncrementalIngestionApi> = Arc::new(client);

    let command = args.command.clone().unwrap_or(Command::Dashboard);
    info!(?command, backend = %config.backend.base_url, "running command");

    let outcome = run_command(api, &terminal, &config, command).await;

    if let Err(e) = lifecycle.shutdown() {
        warn!(error = %e, "telemetry shutdown failed");
    }

    if let Err(e) = &outcome {
        error!(error = %e, "command failed");
    }
    outcome
}

/// Run one subcommand; the dashboard runs until the user leaves it.
async fn run_command(
    api: Arc<dyn IncrementalIngestionApi>,
    terminal: &Terminal,
    config: &Config,
    command: Command,
) -> Result<()> {
    let refresh_delay = Duration::from_millis(config.admin.refresh_delay_ms);
    let api_ref = api.as_ref();
    match command {
        Command::Dashboard => {
            Dashboard::new(api.clone(), refresh_delay)
                .run(&config.backend.base_url)
                .await?;
        }
        Command::Health => {
            let health = api_ref.get_health().await.context("failed to load health")?;
            terminal.print_health(&HealthBanner::from_response(&health))?;
        }
        Command::Providers => {
            let rows = load_rows(api_ref).await.context("failed to list providers")?;
            terminal.print_providers(&rows)?;
        }
        Command::Status { provider } => {
            let status = api_ref
                .get_provider_status(&provider)
                .await
                .with_context(|| format!("failed to load status of '{provider}'"))?;
            terminal.print_status(&provider, &status)?;
        }
        Command::Trigger { provider } => act(api_ref, terminal, Action::Trigger, &provider).await?,
        Command::Start { provider } => act(api_ref, terminal, Action::Start, &provider).await?,
        Command::Cancel { provider } => act(api_ref, terminal, Action::Cancel, &provider).await?,
        Command::Delete { provider } => {
            let purge = api_ref
                .delete_provider(&provider)
                .await
                .with_context(|| format!("failed to delete '{provider}'"))?;
            terminal.print_purge(&purge)?;
        }
        Command::Marks { provider } => {
            let marks = api_ref
                .get_provider_marks(&provider)
                .await
                .with_context(|| format!("failed to load marks of '{provider}'"))?;
            terminal.print_marks(&provider, &MarksPanel::from_response(&marks))?;
        }
        Command::DeleteMarks { provider } => {
            let resp = api_ref
                .delete_provider_marks(&provider)
                .await
                .with_context(|| format!("failed to delete marks of '{provider}'"))?;
            terminal.print_delete_marks(&provider, &resp)?;
        }
        Command::Cleanup { yes } => {
            if !yes
                && !terminal.confirm(
                    "Remove ALL records for ALL incremental providers? This can orphan entities.",
                )?
            {
                terminal.print_info("Cleanup aborted.")?;
                return Ok(());
            }
            let resp = api_ref.cleanup().await.context("cleanup failed")?;
            terminal.print_cleanup(&resp)?;
        }
    }
    Ok(())
}

async fn act(
    api: &dyn IncrementalIngestionApi,
    terminal: &Terminal,
    action: Action,
    provider: &str,
) -> Result<()> {
    let notification = perform_action(api, &ActionTracker::new(), action, provider).await;
    terminal.print_notification(&notification)?;
    if notification.level == NotificationLevel::Error {
        anyhow::bail!("{}", notification.message);
    }
    Ok(())
}
