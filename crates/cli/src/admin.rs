//! View logic for the incremental ingestion admin surface.
//!
//! Everything here is independent of the terminal: fetching rows, turning
//! API responses into display text, and tracking in-flight actions.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use incr_ingestion::{
    IncrementalIngestionApi, IncrementalProviderHealthResponse, IngestionError,
    IngestionMarksResponse, StatusKind, SuccessResponse,
};

/// Max characters of `last_error` shown in the providers table.
pub const ERROR_DISPLAY_LIMIT: usize = 100;

/// Placeholder for an absent last error.
pub const NO_ERROR: &str = "—";

/// Shown when the backend reports an empty current action.
pub const UNKNOWN_STATUS: &str = "unknown";

// ── Provider rows ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRow {
    pub name: String,
    pub status: String,
    pub next_action_at: Option<String>,
    pub last_error: Option<String>,
}

impl ProviderRow {
    pub fn kind(&self) -> StatusKind {
        StatusKind::classify(&self.status)
    }
}

/// List providers, then fetch every status concurrently.
///
/// A failed status fetch does not fail the load: the row reports status
/// `error` with the failure text as its last error.
pub async fn load_rows(
    api: &dyn IncrementalIngestionApi,
) -> Result<Vec<ProviderRow>, IngestionError> {
    let list = api.get_providers().await?;
    debug!(count = list.providers.len(), "fetching provider statuses");

    let statuses = join_all(list.providers.iter().map(|name| api.get_provider_status(name))).await;

    Ok(list
        .providers
        .into_iter()
        .zip(statuses)
        .map(|(name, result)| match result {
            Ok(resp) => ProviderRow {
                name,
                status: status_label(&resp.status.current_action),
                next_action_at: resp.status.next_action_at,
                last_error: resp.last_error,
            },
            Err(e) => {
                warn!(provider = %name, error = %e, "failed to fetch provider status");
                ProviderRow {
                    name,
                    status: "error".to_string(),
                    next_action_at: None,
                    last_error: Some(e.to_string()),
                }
            }
        })
        .collect())
}

pub fn status_label(current_action: &str) -> String {
    if current_action.is_empty() {
        UNKNOWN_STATUS.to_string()
    } else {
        current_action.to_string()
    }
}

/// Render a timestamp in local time; unparsable input is shown verbatim.
pub fn format_timestamp(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

pub fn format_next_action(next_action_at: Option<&str>) -> String {
    next_action_at.map(format_timestamp).unwrap_or_else(|| "N/A".to_string())
}

pub fn truncate_error(last_error: Option<&str>) -> String {
    match last_error {
        None => NO_ERROR.to_string(),
        Some(e) if e.chars().count() > ERROR_DISPLAY_LIMIT => {
            let head: String = e.chars().take(ERROR_DISPLAY_LIMIT).collect();
            format!("{head}...")
        }
        Some(e) => e.to_string(),
    }
}

// ── Health banner ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct HealthBanner {
    pub healthy: bool,
    pub title: String,
    /// Providers with duplicate ingestions.
    pub providers: Vec<String>,
}

impl HealthBanner {
    pub fn from_response(health: &IncrementalProviderHealthResponse) -> Self {
        if health.healthy {
            return Self {
                healthy: true,
                title: "All incremental providers are healthy".to_string(),
                providers: Vec::new(),
            };
        }
        let providers = health.duplicate_ingestions.clone().unwrap_or_default();
        let n = providers.len();
        let plural = if n == 1 { "" } else { "s" };
        Self {
            healthy: false,
            title: format!("Unhealthy Providers Detected ({n} duplicate ingestion{plural})"),
            providers,
        }
    }
}

// ── Marks panel ─────────────────────────────────────────────────

pub const NO_MARKS: &str = "No ingestion marks found for this cycle.";

#[derive(Debug, Clone, PartialEq)]
pub struct MarkLine {
    pub sequence: String,
    pub created_at: String,
    pub cursor: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarksPanel {
    /// The backend reported failure.
    Unavailable(String),
    Empty,
    Marks { title: String, lines: Vec<MarkLine> },
}

impl MarksPanel {
    pub fn from_response(resp: &IngestionMarksResponse) -> Self {
        if !resp.success {
            return Self::Unavailable(
                resp.message
                    .clone()
                    .unwrap_or_else(|| "Failed to load ingestion marks".to_string()),
            );
        }
        match resp.records.as_deref() {
            None | Some([]) => Self::Empty,
            Some(records) => Self::Marks {
                title: format!("Ingestion Marks ({})", records.len()),
                lines: records
                    .iter()
                    .map(|m| MarkLine {
                        sequence: format!("#{}", m.sequence),
                        created_at: format_timestamp(&m.created_at),
                        cursor: format_cursor(&m.cursor),
                    })
                    .collect(),
            },
        }
    }
}

/// Strings verbatim, other JSON pretty-printed.
pub fn format_cursor(cursor: &Value) -> String {
    match cursor {
        Value::Null => "No cursor".to_string(),
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

// ── Actions ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Trigger,
    Start,
    Cancel,
}

impl Action {
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Start => "start",
            Self::Cancel => "cancel",
        }
    }

    fn default_message(&self, provider: &str) -> String {
        match self {
            Self::Trigger => format!("Triggered next action for {provider}"),
            Self::Start => format!("Started new ingestion cycle for {provider}"),
            Self::Cancel => format!("Canceled ingestion for {provider}"),
        }
    }

    pub async fn run(
        &self,
        api: &dyn IncrementalIngestionApi,
        provider: &str,
    ) -> Result<SuccessResponse, IngestionError> {
        match self {
            Self::Trigger => api.trigger_provider(provider).await,
            Self::Start => api.start_provider(provider).await,
            Self::Cancel => api.cancel_provider(provider).await,
        }
    }
}

/// Providers with an action currently running.
#[derive(Debug, Clone, Default)]
pub struct ActionTracker {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl ActionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `provider` busy; `None` if an action is already running for it.
    pub fn try_begin(&self, provider: &str) -> Option<InFlight> {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(provider.to_string()) {
            return None;
        }
        Some(InFlight {
            provider: provider.to_string(),
            in_flight: self.in_flight.clone(),
        })
    }

    pub fn is_busy(&self, provider: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(provider)
    }
}

/// Clears the provider's busy flag on drop.
#[derive(Debug)]
pub struct InFlight {
    provider: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.provider);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// Run `action` unless one is already in flight for `provider`.
///
/// Never fails: the outcome is reported as a notification.
pub async fn perform_action(
    api: &dyn IncrementalIngestionApi,
    tracker: &ActionTracker,
    action: Action,
    provider: &str,
) -> Notification {
    let Some(_guard) = tracker.try_begin(provider) else {
        return Notification::error(format!(
            "An action is already in progress for {provider}"
        ));
    };
    match action.run(api, provider).await {
        Ok(resp) if resp.message.is_empty() => {
            Notification::success(action.default_message(provider))
        }
        Ok(resp) => Notification::success(resp.message),
        Err(e) => {
            warn!(provider, action = action.verb(), error = %e, "provider action failed");
            Notification::error(format!("Failed to {} {provider}: {e}", action.verb()))
        }
    }
}

/// Notifications that expire after a fixed time.
#[derive(Debug)]
pub struct Notifications {
    ttl: Duration,
    items: Vec<(Instant, Notification)>,
}

impl Notifications {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            items: Vec::new(),
        }
    }

    pub fn push(&mut self, notification: Notification) {
        self.items.push((Instant::now(), notification));
    }

    /// Drop expired notifications and return the rest, oldest first.
    pub fn active(&mut self) -> Vec<Notification> {
        self.prune(Instant::now());
        self.items.iter().map(|(_, n)| n.clone()).collect()
    }

    fn prune(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.items.retain(|(at, _)| now.duration_since(*at) < ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use incr_ingestion::{
        CleanupResponse, DeleteMarksResponse, IngestionMark, MemoryEngine, ProviderPurgeResponse,
        ProviderStatusResponse, ProvidersListResponse,
    };
    use serde_json::json;

    /// Delegates to an engine but fails status reads for one provider and
    /// reports an empty current action for another.
    struct FlakyApi {
        engine: MemoryEngine,
        broken: &'static str,
        blank: &'static str,
    }

    #[async_trait]
    impl IncrementalIngestionApi for FlakyApi {
        async fn get_health(&self) -> Result<IncrementalProviderHealthResponse, IngestionError> {
            self.engine.get_health().await
        }
        async fn get_providers(&self) -> Result<ProvidersListResponse, IngestionError> {
            self.engine.get_providers().await
        }
        async fn get_provider_status(
            &self,
            provider: &str,
        ) -> Result<ProviderStatusResponse, IngestionError> {
            if provider == self.broken {
                return Err(IngestionError::Discovery {
                    plugin_id: "catalog".into(),
                    message: "backend unavailable".into(),
                });
            }
            let mut resp = self.engine.get_provider_status(provider).await?;
            if provider == self.blank {
                resp.status.current_action.clear();
            }
            Ok(resp)
        }
        async fn trigger_provider(&self, p: &str) -> Result<SuccessResponse, IngestionError> {
            self.engine.trigger_provider(p).await
        }
        async fn start_provider(&self, p: &str) -> Result<SuccessResponse, IngestionError> {
            self.engine.start_provider(p).await
        }
        async fn cancel_provider(&self, p: &str) -> Result<SuccessResponse, IngestionError> {
            self.engine.cancel_provider(p).await
        }
        async fn delete_provider(&self, p: &str) -> Result<ProviderPurgeResponse, IngestionError> {
            self.engine.delete_provider(p).await
        }
        async fn get_provider_marks(
            &self,
            p: &str,
        ) -> Result<IngestionMarksResponse, IngestionError> {
            self.engine.get_provider_marks(p).await
        }
        async fn delete_provider_marks(
            &self,
            p: &str,
        ) -> Result<DeleteMarksResponse, IngestionError> {
            self.engine.delete_provider_marks(p).await
        }
        async fn cleanup(&self) -> Result<CleanupResponse, IngestionError> {
            IncrementalIngestionApi::cleanup(&self.engine).await
        }
    }

    #[tokio::test]
    async fn failed_status_becomes_error_row() {
        let api = FlakyApi {
            engine: MemoryEngine::new(["github", "ldap"]),
            broken: "ldap",
            blank: "",
        };
        api.engine.trigger("github").await.unwrap();

        let rows = load_rows(&api).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "github");
        assert_eq!(rows[0].kind(), StatusKind::Running);
        assert_eq!(rows[1].name, "ldap");
        assert_eq!(rows[1].status, "error");
        assert_eq!(rows[1].kind(), StatusKind::Error);
        assert!(rows[1]
            .last_error
            .as_deref()
            .unwrap()
            .contains("backend unavailable"));
    }

    #[tokio::test]
    async fn empty_current_action_shows_unknown() {
        let api = FlakyApi {
            engine: MemoryEngine::new(["github", "gitlab"]),
            broken: "",
            blank: "gitlab",
        };

        let rows = load_rows(&api).await.unwrap();
        assert_eq!(rows[0].status, "resting");
        assert_eq!(rows[1].name, "gitlab");
        assert_eq!(rows[1].status, UNKNOWN_STATUS);
        assert_eq!(rows[1].kind(), StatusKind::Unknown);
        assert_eq!(status_label("bursting"), "bursting");
    }

    #[test]
    fn next_action_formatting() {
        assert_eq!(format_next_action(None), "N/A");
        assert_eq!(format_next_action(Some("tomorrow-ish")), "tomorrow-ish");

        let raw = "2024-03-01T12:30:00Z";
        let expected = DateTime::parse_from_rfc3339(raw)
            .unwrap()
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        assert_eq!(format_next_action(Some(raw)), expected);
    }

    #[test]
    fn long_errors_are_truncated() {
        assert_eq!(truncate_error(None), "—");
        assert_eq!(truncate_error(Some("timeout")), "timeout");

        let exact = "x".repeat(100);
        assert_eq!(truncate_error(Some(&exact)), exact);

        let long = "é".repeat(150);
        let shown = truncate_error(Some(&long));
        assert_eq!(shown, format!("{}...", "é".repeat(100)));
    }

    #[test]
    fn healthy_banner() {
        let banner = HealthBanner::from_response(&IncrementalProviderHealthResponse {
            healthy: true,
            duplicate_ingestions: None,
        });
        assert!(banner.healthy);
        assert_eq!(banner.title, "All incremental providers are healthy");
        assert!(banner.providers.is_empty());
    }

    #[test]
    fn unhealthy_banner_lists_every_duplicate() {
        let banner = HealthBanner::from_response(&IncrementalProviderHealthResponse {
            healthy: false,
            duplicate_ingestions: Some(vec!["a".into(), "b".into()]),
        });
        assert!(!banner.healthy);
        assert_eq!(
            banner.title,
            "Unhealthy Providers Detected (2 duplicate ingestions)"
        );
        assert_eq!(banner.providers, vec!["a".to_string(), "b".to_string()]);

        let single = HealthBanner::from_response(&IncrementalProviderHealthResponse {
            healthy: false,
            duplicate_ingestions: Some(vec!["a".into()]),
        });
        assert_eq!(
            single.title,
            "Unhealthy Providers Detected (1 duplicate ingestion)"
        );
    }

    #[test]
    fn successful_empty_marks_render_placeholder() {
        for records in [None, Some(vec![])] {
            let panel = MarksPanel::from_response(&IngestionMarksResponse {
                success: true,
                records,
                message: None,
            });
            assert_eq!(panel, MarksPanel::Empty);
        }
        assert_eq!(NO_MARKS, "No ingestion marks found for this cycle.");
    }

    #[test]
    fn failed_marks_show_message() {
        let panel = MarksPanel::from_response(&IngestionMarksResponse {
            success: false,
            records: None,
            message: Some("No active ingestion cycle".into()),
        });
        assert_eq!(
            panel,
            MarksPanel::Unavailable("No active ingestion cycle".into())
        );
    }

    #[test]
    fn marks_panel_lines() {
        let mark = |sequence, cursor| IngestionMark {
            id: format!("m{sequence}"),
            sequence,
            ingestion_id: "i1".into(),
            cursor,
            created_at: "not-a-date".into(),
        };
        let panel = MarksPanel::from_response(&IngestionMarksResponse {
            success: true,
            records: Some(vec![
                mark(1, json!("page-2")),
                mark(2, json!({"offset": 50})),
                mark(3, Value::Null),
            ]),
            message: None,
        });
        let MarksPanel::Marks { title, lines } = panel else {
            panic!("expected marks");
        };
        assert_eq!(title, "Ingestion Marks (3)");
        assert_eq!(lines[0].sequence, "#1");
        assert_eq!(lines[0].created_at, "not-a-date");
        assert_eq!(lines[0].cursor, "page-2");
        assert_eq!(lines[1].cursor, "{\n  \"offset\": 50\n}");
        assert_eq!(lines[2].cursor, "No cursor");
    }

    #[test]
    fn tracker_blocks_concurrent_actions_per_provider() {
        let tracker = ActionTracker::new();
        let guard = tracker.try_begin("github").unwrap();
        assert!(tracker.is_busy("github"));
        assert!(tracker.try_begin("github").is_none());
        assert!(tracker.try_begin("ldap").is_some());
        drop(guard);
        assert!(!tracker.is_busy("github"));
        assert!(tracker.try_begin("github").is_some());
    }

    #[tokio::test]
    async fn perform_action_reports_outcomes() {
        let engine = MemoryEngine::new(["github"]);
        let tracker = ActionTracker::new();

        let ok = perform_action(&engine, &tracker, Action::Trigger, "github").await;
        assert_eq!(ok.level, NotificationLevel::Success);
        assert!(ok.message.contains("github"));
        assert!(!tracker.is_busy("github"));

        let missing = perform_action(&engine, &tracker, Action::Start, "gitlab").await;
        assert_eq!(missing.level, NotificationLevel::Error);
        assert!(missing.message.starts_with("Failed to start gitlab"));

        let _busy = tracker.try_begin("github").unwrap();
        let blocked = perform_action(&engine, &tracker, Action::Cancel, "github").await;
        assert_eq!(blocked.level, NotificationLevel::Error);
        assert!(blocked.message.contains("already in progress"));
        assert_eq!(
            engine.status("github").await.unwrap().status.current_action,
            "interstitial"
        );
    }

    #[test]
    fn notifications_expire() {
        let mut notes = Notifications::new(Duration::from_secs(60));
        notes.push(Notification::success("done"));
        assert_eq!(notes.active(), vec![Notification::success("done")]);

        notes.prune(Instant::now() + Duration::from_secs(61));
        assert!(notes.active().is_empty());
    }
}
