use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

// ── Top-level config ──────────────────────────────────────────

/// Workspace-wide configuration, parsed from `incr.toml`.
///
/// Every section is optional in the file; missing sections fall back to
/// their defaults. A handful of `INCR_*` environment variables override
/// the parsed values (see [`Config::apply_env_overrides`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Config {
    /// Return the default config file path: ~/.config/incr/config.toml
    pub fn default_path() -> Result<PathBuf, CoreError> {
        let dir = dirs::config_dir()
            .ok_or_else(|| CoreError::Config("could not determine user config directory".into()))?;
        Ok(dir.join("incr").join("config.toml"))
    }

    /// Load config from the given path, or the default path.
    ///
    /// An explicit path must exist. A missing default file yields the
    /// defaults. Environment overrides are applied in both cases.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let mut config = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(CoreError::Config(format!(
                        "config file not found: {}",
                        p.display()
                    )));
                }
                Self::from_file(p)?
            }
            None => {
                let default_path = Self::default_path()?;
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    debug!(path = %default_path.display(), "Config file not found, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a TOML file without applying environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        debug!(path = %path.display(), "Loading config");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CoreError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `INCR_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(env_opt);
    }

    /// Apply overrides from an arbitrary key lookup. Unparsable values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("INCR_BACKEND_URL") {
            self.backend.base_url = url;
        }
        if let Some(delay) = lookup("INCR_REFRESH_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.admin.refresh_delay_ms = delay;
        }
        if let Some(enabled) = lookup("INCR_TELEMETRY_ENABLED").and_then(|v| parse_bool(&v)) {
            self.telemetry.enabled = enabled;
        }
        if let Some(bind) = lookup("INCR_ENGINE_BIND") {
            self.engine.bind = bind;
        }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("  backend:    url={}", self.backend.base_url);
        tracing::info!("  admin:      refresh_delay_ms={}", self.admin.refresh_delay_ms);
        tracing::info!(
            "  telemetry:  enabled={}, service={}, exporters={}",
            self.telemetry.enabled,
            self.telemetry.resource.service_name,
            self.telemetry.exporters.iter().filter(|e| e.enabled).count()
        );
        tracing::info!(
            "  engine:     bind={}, providers={}",
            self.engine.bind,
            self.engine.providers.len()
        );
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ── Backend / discovery ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend root; plugin base URLs are `{base_url}/api/{plugin_id}`.
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    /// Per-plugin base URL overrides (plugin_id -> full base URL).
    #[serde(default)]
    pub plugins: HashMap<String, String>,
}

fn default_backend_url() -> String {
    "http://localhost:7007".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            plugins: HashMap::new(),
        }
    }
}

// ── Admin surface ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Delay before the providers table is refreshed after a mutating action.
    #[serde(default = "default_refresh_delay_ms")]
    pub refresh_delay_ms: u64,
}

fn default_refresh_delay_ms() -> u64 {
    1000
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            refresh_delay_ms: default_refresh_delay_ms(),
        }
    }
}

// ── Telemetry ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Root namespace every metric name starts with.
    #[serde(default = "default_root_namespace")]
    pub root_namespace: String,

    #[serde(default)]
    pub resource: ResourceConfig,

    #[serde(default = "default_exporters")]
    pub exporters: Vec<ExporterConfig>,

    /// Interval of the periodic metric readers.
    #[serde(default = "default_export_interval_secs")]
    pub export_interval_secs: u64,

    #[serde(default, alias = "autoInstrumentations")]
    pub instrumentations: InstrumentationConfig,
}

fn default_true() -> bool {
    true
}

fn default_root_namespace() -> String {
    "backstage".to_string()
}

fn default_exporters() -> Vec<ExporterConfig> {
    vec![ExporterConfig {
        kind: ExporterKind::Console,
        enabled: true,
        endpoint: None,
    }]
}

fn default_export_interval_secs() -> u64 {
    60
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root_namespace: default_root_namespace(),
            resource: ResourceConfig::default(),
            exporters: default_exporters(),
            export_interval_secs: default_export_interval_secs(),
            instrumentations: InstrumentationConfig::default(),
        }
    }
}

impl TelemetryConfig {
    /// Switch off every exporter of `kind`. Returns how many were enabled.
    pub fn disable_exporter(&mut self, kind: ExporterKind) -> usize {
        let mut disabled = 0;
        for exporter in self.exporters.iter_mut().filter(|e| e.kind == kind && e.enabled) {
            exporter.enabled = false;
            disabled += 1;
        }
        disabled
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    #[serde(default = "default_service_name", alias = "serviceName")]
    pub service_name: String,
    #[serde(default = "default_service_version", alias = "serviceVersion")]
    pub service_version: String,
}

fn default_service_name() -> String {
    "backstage".to_string()
}

fn default_service_version() -> String {
    "0.0.0".to_string()
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            service_version: default_service_version(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExporterKind {
    /// Periodically print metrics to stdout.
    Console,
    /// Push metrics to an OTLP/HTTP collector.
    Otlp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    #[serde(rename = "type")]
    pub kind: ExporterKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Collector endpoint (OTLP only).
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentationConfig {
    /// Record request count and latency for outgoing HTTP calls.
    #[serde(default = "default_true")]
    pub http: bool,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self { http: true }
    }
}

// ── In-memory engine ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_engine_bind")]
    pub bind: String,

    /// Providers registered at startup.
    #[serde(default)]
    pub providers: Vec<String>,
}

fn default_engine_bind() -> String {
    "127.0.0.1:7007".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bind: default_engine_bind(),
            providers: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg.backend.base_url, "http://localhost:7007");
        assert_eq!(cfg.admin.refresh_delay_ms, 1000);
        assert!(cfg.telemetry.enabled);
        assert_eq!(cfg.telemetry.root_namespace, "backstage");
        assert_eq!(cfg.telemetry.resource.service_name, "backstage");
        assert_eq!(cfg.telemetry.resource.service_version, "0.0.0");
        assert_eq!(cfg.telemetry.exporters.len(), 1);
        assert_eq!(cfg.telemetry.exporters[0].kind, ExporterKind::Console);
        assert!(cfg.telemetry.instrumentations.http);
        assert!(cfg.engine.providers.is_empty());
    }

    #[test]
    fn disable_exporter_only_touches_that_kind() {
        let mut cfg = Config::from_toml_str(
            r#"
            [[telemetry.exporters]]
            type = "console"

            [[telemetry.exporters]]
            type = "otlp"
            endpoint = "http://collector:4318/v1/metrics"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.telemetry.disable_exporter(ExporterKind::Console), 1);
        assert!(!cfg.telemetry.exporters[0].enabled);
        assert!(cfg.telemetry.exporters[1].enabled);
        assert_eq!(cfg.telemetry.disable_exporter(ExporterKind::Console), 0);
    }

    #[test]
    fn parses_all_sections() {
        let toml = r#"
[backend]
base_url = "http://backstage.internal:7007"

[backend.plugins]
catalog = "http://catalog.internal/api/catalog"

[admin]
refresh_delay_ms = 250

[telemetry]
enabled = false
root_namespace = "acme"
export_interval_secs = 5

[telemetry.resource]
serviceName = "portal"
serviceVersion = "1.2.3"

[[telemetry.exporters]]
type = "otlp"
endpoint = "http://collector:4318/v1/metrics"

[telemetry.autoInstrumentations]
http = false

[engine]
bind = "0.0.0.0:9000"
providers = ["github", "gitlab"]
"#;
        let cfg = Config::from_toml_str(toml).unwrap();
        assert_eq!(cfg.backend.base_url, "http://backstage.internal:7007");
        assert_eq!(
            cfg.backend.plugins.get("catalog").map(String::as_str),
            Some("http://catalog.internal/api/catalog")
        );
        assert_eq!(cfg.admin.refresh_delay_ms, 250);
        assert!(!cfg.telemetry.enabled);
        assert_eq!(cfg.telemetry.root_namespace, "acme");
        assert_eq!(cfg.telemetry.resource.service_name, "portal");
        assert_eq!(cfg.telemetry.resource.service_version, "1.2.3");
        assert_eq!(cfg.telemetry.exporters[0].kind, ExporterKind::Otlp);
        assert!(cfg.telemetry.exporters[0].enabled);
        assert!(!cfg.telemetry.instrumentations.http);
        assert_eq!(cfg.engine.bind, "0.0.0.0:9000");
        assert_eq!(cfg.engine.providers, vec!["github", "gitlab"]);
    }

    #[test]
    fn overrides_replace_parsed_values() {
        let mut cfg = Config::default();
        cfg.apply_overrides(|key| match key {
            "INCR_BACKEND_URL" => Some("http://override:1234".to_string()),
            "INCR_REFRESH_DELAY_MS" => Some("0".to_string()),
            "INCR_TELEMETRY_ENABLED" => Some("off".to_string()),
            _ => None,
        });
        assert_eq!(cfg.backend.base_url, "http://override:1234");
        assert_eq!(cfg.admin.refresh_delay_ms, 0);
        assert!(!cfg.telemetry.enabled);
        assert_eq!(cfg.engine.bind, "127.0.0.1:7007");
    }

    #[test]
    fn unparsable_overrides_are_ignored() {
        let mut cfg = Config::default();
        cfg.apply_overrides(|key| match key {
            "INCR_REFRESH_DELAY_MS" => Some("soon".to_string()),
            "INCR_TELEMETRY_ENABLED" => Some("maybe".to_string()),
            _ => None,
        });
        assert_eq!(cfg.admin.refresh_delay_ms, 1000);
        assert!(cfg.telemetry.enabled);
    }

    #[test]
    fn load_reads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[admin]\nrefresh_delay_ms = 42").unwrap();
        let cfg = Config::from_file(file.path()).unwrap();
        assert_eq!(cfg.admin.refresh_delay_ms, 42);
    }

    #[test]
    fn load_rejects_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = Config::load(Some(&missing)).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = Config::from_toml_str("[admin\nrefresh_delay_ms = 1").unwrap_err();
        assert!(matches!(err, CoreError::ConfigParse(_)));
    }
}
