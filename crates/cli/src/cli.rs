use std::path::PathBuf;

use clap::{Parser, Subcommand};
use incr_core::{Config, ExporterKind};

/// Admin CLI for the catalog's incremental entity providers.
///
/// Without a subcommand, opens the interactive dashboard.
#[derive(Parser, Debug)]
#[command(name = "incr-cli", version, about = "Manage incremental ingestion providers")]
pub struct CliArgs {
    /// Path to config file (default: ~/.config/incr/config.toml)
    #[arg(long, env = "INCR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Backend base URL (overrides config and INCR_BACKEND_URL)
    #[arg(long)]
    pub backend: Option<String>,

    /// Delay in milliseconds before refreshing after an action
    #[arg(long)]
    pub refresh_delay_ms: Option<u64>,

    /// Do not export telemetry for this invocation
    #[arg(long)]
    pub no_telemetry: bool,

    /// Keep console metric exporters (they print to stdout alongside command output)
    #[arg(long)]
    pub console_metrics: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl CliArgs {
    /// Apply flag overrides on top of the loaded config.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(backend) = &self.backend {
            config.backend.base_url = backend.clone();
        }
        if let Some(delay) = self.refresh_delay_ms {
            config.admin.refresh_delay_ms = delay;
        }
        if self.no_telemetry {
            config.telemetry.enabled = false;
        }
        if !self.console_metrics {
            config.telemetry.disable_exporter(ExporterKind::Console);
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show provider health (duplicate ingestions)
    Health,
    /// List providers with status, next action and last error
    Providers,
    /// Show one provider's status
    Status { provider: String },
    /// Run a provider's next action now
    Trigger { provider: String },
    /// Abandon the current cycle and start a new one now
    Start { provider: String },
    /// Abandon the current cycle; next start in 24 hours
    Cancel { provider: String },
    /// Remove every record for a provider; restarts in 24 hours
    Delete { provider: String },
    /// Show ingestion marks for the current cycle
    Marks { provider: String },
    /// Remove ingestion marks for the current cycle
    DeleteMarks { provider: String },
    /// Remove every record for ALL providers (may orphan entities)
    Cleanup {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Interactive dashboard (default)
    Dashboard,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_no_subcommand() {
        let args = CliArgs::try_parse_from(["incr-cli"]).unwrap();
        assert!(args.command.is_none());
        assert!(!args.no_telemetry);
    }

    #[test]
    fn parses_provider_subcommands() {
        let args =
            CliArgs::try_parse_from(["incr-cli", "--backend", "http://b:7007", "trigger", "github"])
                .unwrap();
        assert_eq!(args.backend.as_deref(), Some("http://b:7007"));
        assert_eq!(
            args.command,
            Some(Command::Trigger {
                provider: "github".into()
            })
        );

        let args = CliArgs::try_parse_from(["incr-cli", "delete-marks", "ldap"]).unwrap();
        assert_eq!(
            args.command,
            Some(Command::DeleteMarks {
                provider: "ldap".into()
            })
        );
    }

    #[test]
    fn console_exporter_is_off_unless_requested() {
        let mut config = Config::default();
        CliArgs::try_parse_from(["incr-cli", "--refresh-delay-ms", "250", "providers"])
            .unwrap()
            .apply_to(&mut config);
        assert_eq!(config.admin.refresh_delay_ms, 250);
        assert!(config.telemetry.enabled);
        assert!(config
            .telemetry
            .exporters
            .iter()
            .filter(|e| e.kind == ExporterKind::Console)
            .all(|e| !e.enabled));

        let mut config = Config::default();
        CliArgs::try_parse_from(["incr-cli", "--console-metrics", "--no-telemetry", "health"])
            .unwrap()
            .apply_to(&mut config);
        assert!(!config.telemetry.enabled);
        assert!(config.telemetry.exporters[0].enabled);
    }

    #[test]
    fn cleanup_confirmation_flag() {
        let args = CliArgs::try_parse_from(["incr-cli", "cleanup", "--yes"]).unwrap();
        assert_eq!(args.command, Some(Command::Cleanup { yes: true }));
        assert!(CliArgs::try_parse_from(["incr-cli", "trigger"]).is_err());
    }
}
