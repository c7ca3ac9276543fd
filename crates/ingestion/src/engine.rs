//! In-memory incremental ingestion engine.
//!
//! Holds per-provider scheduler state, ingestion cycles and their marks, and
//! applies the management commands synchronously: by the time a command
//! returns, its effect is visible to the next read. Used by the
//! `incr-engine` binary and by tests as the REST client's counterpart.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use incr_metrics::names::incremental;
use incr_metrics::{MetricOptions, MetricsService, NoopRootMetricsService, RootMetricsService};
use opentelemetry::metrics::Counter;
use opentelemetry::KeyValue;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::IncrementalIngestionApi;
use crate::error::{EngineError, IngestionError};
use crate::types::{
    CleanupResponse, DeleteMarksResponse, IncrementalProviderHealthResponse, IngestionMark,
    IngestionMarksResponse, ProviderPurgeResponse, ProviderState, ProviderStatus,
    ProviderStatusResponse, ProvidersListResponse, SuccessResponse,
};

/// Delay before the next cycle after cancel or delete.
pub const REST_PERIOD_HOURS: i64 = 24;

/// Entities referenced by each recorded mark.
pub const BURST_PAGE_SIZE: u64 = 25;

struct Mark {
    id: String,
    sequence: u64,
    cursor: serde_json::Value,
    entities: u64,
    created_at: DateTime<Utc>,
}

struct Ingestion {
    id: String,
    open: bool,
    marks: Vec<Mark>,
    /// Never reset for the life of the cycle, even when marks are deleted.
    last_sequence: u64,
}

impl Ingestion {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            open: true,
            marks: Vec::new(),
            last_sequence: 0,
        }
    }

    fn next_sequence(&mut self) -> u64 {
        self.last_sequence += 1;
        self.last_sequence
    }
}

struct ProviderRecord {
    state: ProviderState,
    next_action_at: DateTime<Utc>,
    last_error: Option<String>,
    ingestions: Vec<Ingestion>,
}

impl ProviderRecord {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            state: ProviderState::Resting,
            next_action_at: now,
            last_error: None,
            ingestions: Vec::new(),
        }
    }

    /// Most recently opened cycle that is still open.
    fn current(&mut self) -> Option<&mut Ingestion> {
        self.ingestions.iter_mut().rev().find(|i| i.open)
    }

    fn current_or_open(&mut self) -> &mut Ingestion {
        let idx = match self.ingestions.iter().rposition(|i| i.open) {
            Some(idx) => idx,
            None => {
                self.ingestions.push(Ingestion::new());
                self.ingestions.len() - 1
            }
        };
        &mut self.ingestions[idx]
    }

    fn close_open(&mut self) {
        for ingestion in self.ingestions.iter_mut().filter(|i| i.open) {
            ingestion.open = false;
        }
    }

    fn open_count(&self) -> usize {
        self.ingestions.iter().filter(|i| i.open).count()
    }

    fn purge(&mut self, provider: &str) -> ProviderPurgeResponse {
        let marks: Vec<&Mark> = self.ingestions.iter().flat_map(|i| &i.marks).collect();
        let purge = ProviderPurgeResponse {
            provider: provider.to_string(),
            ingestions_deleted: self.ingestions.len() as u64,
            marks_deleted: marks.len() as u64,
            mark_entities_deleted: marks.iter().map(|m| m.entities).sum(),
        };
        self.ingestions.clear();
        purge
    }

    fn rest(&mut self, now: DateTime<Utc>) {
        self.state = ProviderState::Resting;
        self.next_action_at = now + Duration::hours(REST_PERIOD_HOURS);
    }
}

struct EngineMetrics {
    commands: Counter<u64>,
    marks: Counter<u64>,
}

impl EngineMetrics {
    fn new(metrics: &dyn MetricsService, provider_count: Arc<AtomicU64>) -> Self {
        metrics.create_observable_gauge(
            incremental::PROVIDERS,
            Box::new(move |observer| {
                observer.observe(provider_count.load(Ordering::Relaxed) as f64, &[])
            }),
            Some(MetricOptions::new().with_description("Registered incremental providers")),
        );
        Self {
            commands: metrics.create_counter(
                incremental::COMMANDS,
                Some(MetricOptions::new().with_description("Management commands applied")),
            ),
            marks: metrics.create_counter(
                incremental::MARKS_RECORDED,
                Some(MetricOptions::new().with_description("Ingestion marks recorded")),
            ),
        }
    }

    fn command(&self, command: &'static str) {
        self.commands.add(1, &[KeyValue::new("command", command)]);
    }
}

/// In-memory implementation of the provider lifecycle protocol.
pub struct MemoryEngine {
    providers: RwLock<BTreeMap<String, ProviderRecord>>,
    provider_count: Arc<AtomicU64>,
    metrics: EngineMetrics,
}

impl MemoryEngine {
    /// Engine whose metrics are recorded but never exported.
    pub fn new<I, S>(providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let noop = NoopRootMetricsService::new().for_plugin("catalog", None);
        Self::with_metrics(providers, noop.as_ref())
    }

    pub fn with_metrics<I, S>(providers: I, metrics: &dyn MetricsService) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = Utc::now();
        let map: BTreeMap<String, ProviderRecord> = providers
            .into_iter()
            .map(|name| (name.into(), ProviderRecord::new(now)))
            .collect();
        let provider_count = Arc::new(AtomicU64::new(map.len() as u64));
        Self {
            metrics: EngineMetrics::new(metrics, provider_count.clone()),
            providers: RwLock::new(map),
            provider_count,
        }
    }

    /// Register a provider in the resting state. No-op if already known.
    pub async fn register_provider(&self, name: impl Into<String>) {
        let name = name.into();
        let mut providers = self.providers.write().await;
        if !providers.contains_key(&name) {
            info!(provider = %name, "registered incremental provider");
            providers.insert(name, ProviderRecord::new(Utc::now()));
            self.provider_count
                .store(providers.len() as u64, Ordering::Relaxed);
        }
    }

    /// Put a provider into the error state with `message` as its last error.
    pub async fn record_failure(
        &self,
        provider: &str,
        message: impl Into<String>,
    ) -> Result<(), EngineError> {
        self.with_provider(provider, |record| {
            let message = message.into();
            warn!(provider, error = %message, "provider failed");
            record.state = ProviderState::Error;
            record.last_error = Some(message);
        })
        .await
    }

    /// Put a provider into the backing-off state until `until`.
    pub async fn back_off(
        &self,
        provider: &str,
        until: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.with_provider(provider, |record| {
            record.state = ProviderState::BackingOff;
            record.next_action_at = until;
        })
        .await
    }

    /// Open an extra cycle without closing the current one, as happens
    /// when two schedulers race on the same provider.
    pub async fn open_duplicate_cycle(&self, provider: &str) -> Result<(), EngineError> {
        self.with_provider(provider, |record| {
            record.current_or_open();
            record.ingestions.push(Ingestion::new());
        })
        .await
    }

    async fn with_provider<R>(
        &self,
        provider: &str,
        f: impl FnOnce(&mut ProviderRecord) -> R,
    ) -> Result<R, EngineError> {
        let mut providers = self.providers.write().await;
        let record = providers
            .get_mut(provider)
            .ok_or_else(|| EngineError::UnknownProvider(provider.to_string()))?;
        Ok(f(record))
    }

    // ── Reads ───────────────────────────────────────────────────

    pub async fn health(&self) -> IncrementalProviderHealthResponse {
        let providers = self.providers.read().await;
        let duplicates: Vec<String> = providers
            .iter()
            .filter(|(_, r)| r.open_count() > 1)
            .map(|(name, _)| name.clone())
            .collect();
        if duplicates.is_empty() {
            IncrementalProviderHealthResponse {
                healthy: true,
                duplicate_ingestions: None,
            }
        } else {
            IncrementalProviderHealthResponse {
                healthy: false,
                duplicate_ingestions: Some(duplicates),
            }
        }
    }

    pub async fn providers(&self) -> ProvidersListResponse {
        let providers = self.providers.read().await;
        ProvidersListResponse {
            success: true,
            providers: providers.keys().cloned().collect(),
        }
    }

    pub async fn status(&self, provider: &str) -> Result<ProviderStatusResponse, EngineError> {
        let providers = self.providers.read().await;
        let record = providers
            .get(provider)
            .ok_or_else(|| EngineError::UnknownProvider(provider.to_string()))?;
        Ok(ProviderStatusResponse {
            success: true,
            status: ProviderStatus {
                current_action: record.state.to_string(),
                next_action_at: Some(record.next_action_at.to_rfc3339()),
            },
            last_error: record.last_error.clone(),
        })
    }

    pub async fn marks(&self, provider: &str) -> Result<IngestionMarksResponse, EngineError> {
        self.with_provider(provider, |record| match record.current() {
            Some(ingestion) => IngestionMarksResponse {
                success: true,
                records: Some(
                    ingestion
                        .marks
                        .iter()
                        .map(|m| IngestionMark {
                            id: m.id.clone(),
                            sequence: m.sequence,
                            ingestion_id: ingestion.id.clone(),
                            cursor: m.cursor.clone(),
                            created_at: m.created_at.to_rfc3339(),
                        })
                        .collect(),
                ),
                message: None,
            },
            None => IngestionMarksResponse {
                success: false,
                records: None,
                message: Some(format!("No active ingestion cycle for provider '{provider}'")),
            },
        })
        .await
    }

    // ── Commands ────────────────────────────────────────────────

    /// Advance to the next scheduled action now.
    ///
    /// Resting, backing-off and errored providers move to interstitial with
    /// an open cycle. An interstitial or bursting provider runs one burst,
    /// recording the next mark of the current cycle.
    pub async fn trigger(&self, provider: &str) -> Result<SuccessResponse, EngineError> {
        self.metrics.command("trigger");
        let now = Utc::now();
        let (message, recorded) = self
            .with_provider(provider, |record| match record.state {
                ProviderState::Resting | ProviderState::BackingOff | ProviderState::Error => {
                    let from = record.state;
                    record.current_or_open();
                    record.state = ProviderState::Interstitial;
                    record.next_action_at = now;
                    record.last_error = None;
                    debug!(provider, %from, "provider triggered");
                    (
                        format!("{provider}: next action triggered ({from} -> interstitial)"),
                        false,
                    )
                }
                ProviderState::Interstitial | ProviderState::Bursting => {
                    let ingestion = record.current_or_open();
                    let sequence = ingestion.next_sequence();
                    ingestion.marks.push(Mark {
                        id: Uuid::new_v4().to_string(),
                        sequence,
                        cursor: json!({ "offset": sequence * BURST_PAGE_SIZE }),
                        entities: BURST_PAGE_SIZE,
                        created_at: now,
                    });
                    record.state = ProviderState::Interstitial;
                    record.next_action_at = now;
                    debug!(provider, sequence, "burst recorded mark");
                    (
                        format!("{provider}: burst completed, mark #{sequence} recorded"),
                        true,
                    )
                }
            })
            .await?;
        if recorded {
            self.metrics.marks.add(1, &[]);
        }
        Ok(SuccessResponse {
            success: true,
            message,
        })
    }

    /// Abandon the current cycle and begin a new one now.
    pub async fn start(&self, provider: &str) -> Result<SuccessResponse, EngineError> {
        self.metrics.command("start");
        let now = Utc::now();
        self.with_provider(provider, |record| {
            record.close_open();
            record.ingestions.push(Ingestion::new());
            record.state = ProviderState::Interstitial;
            record.next_action_at = now;
            record.last_error = None;
        })
        .await?;
        info!(provider, "started new ingestion cycle");
        Ok(SuccessResponse {
            success: true,
            message: format!("{provider}: new ingestion cycle started"),
        })
    }

    /// Abandon the current cycle and rest for 24 hours.
    pub async fn cancel(&self, provider: &str) -> Result<SuccessResponse, EngineError> {
        self.metrics.command("cancel");
        let now = Utc::now();
        self.with_provider(provider, |record| {
            record.close_open();
            record.rest(now);
        })
        .await?;
        info!(provider, "canceled ingestion cycle");
        Ok(SuccessResponse {
            success: true,
            message: format!(
                "{provider}: ingestion canceled, next cycle in {REST_PERIOD_HOURS} hours"
            ),
        })
    }

    /// Remove every cycle and mark of a provider and rest for 24 hours.
    pub async fn delete(&self, provider: &str) -> Result<ProviderPurgeResponse, EngineError> {
        self.metrics.command("delete");
        let now = Utc::now();
        let purge = self
            .with_provider(provider, |record| {
                let purge = record.purge(provider);
                record.rest(now);
                purge
            })
            .await?;
        info!(
            provider,
            ingestions = purge.ingestions_deleted,
            marks = purge.marks_deleted,
            "purged provider records"
        );
        Ok(purge)
    }

    /// Remove the marks of the current cycle.
    pub async fn delete_marks(&self, provider: &str) -> Result<DeleteMarksResponse, EngineError> {
        self.metrics.command("delete_marks");
        self.with_provider(provider, |record| match record.current() {
            Some(ingestion) => {
                let deletions = ingestion.marks.len() as u64;
                ingestion.marks.clear();
                DeleteMarksResponse {
                    success: true,
                    message: format!("{provider}: deleted {deletions} marks"),
                    deletions,
                }
            }
            None => DeleteMarksResponse {
                success: false,
                message: format!("No active ingestion cycle for provider '{provider}'"),
                deletions: 0,
            },
        })
        .await
    }

    /// [`delete`](Self::delete) applied to every provider.
    pub async fn cleanup(&self) -> CleanupResponse {
        self.metrics.command("cleanup");
        let now = Utc::now();
        let mut providers = self.providers.write().await;
        let mut totals = CleanupResponse::default();
        for (name, record) in providers.iter_mut() {
            totals.absorb(&record.purge(name));
            record.rest(now);
        }
        warn!(
            providers = providers.len(),
            ingestions = totals.ingestions_deleted,
            "cleaned up all incremental providers"
        );
        totals
    }
}

fn not_found(e: EngineError) -> IngestionError {
    let message = e.to_string();
    IngestionError::Response {
        status: 404,
        status_text: "Not Found".into(),
        body: json!({ "error": { "name": e.name(), "message": message } }).to_string(),
        message,
    }
}

/// Direct in-process access, bypassing HTTP.
#[async_trait]
impl IncrementalIngestionApi for MemoryEngine {
    async fn get_health(&self) -> Result<IncrementalProviderHealthResponse, IngestionError> {
        Ok(self.health().await)
    }

    async fn get_providers(&self) -> Result<ProvidersListResponse, IngestionError> {
        Ok(self.providers().await)
    }

    async fn get_provider_status(
        &self,
        provider: &str,
    ) -> Result<ProviderStatusResponse, IngestionError> {
        self.status(provider).await.map_err(not_found)
    }

    async fn trigger_provider(&self, provider: &str) -> Result<SuccessResponse, IngestionError> {
        self.trigger(provider).await.map_err(not_found)
    }

    async fn start_provider(&self, provider: &str) -> Result<SuccessResponse, IngestionError> {
        self.start(provider).await.map_err(not_found)
    }

    async fn cancel_provider(&self, provider: &str) -> Result<SuccessResponse, IngestionError> {
        self.cancel(provider).await.map_err(not_found)
    }

    async fn delete_provider(
        &self,
        provider: &str,
    ) -> Result<ProviderPurgeResponse, IngestionError> {
        self.delete(provider).await.map_err(not_found)
    }

    async fn get_provider_marks(
        &self,
        provider: &str,
    ) -> Result<IngestionMarksResponse, IngestionError> {
        self.marks(provider).await.map_err(not_found)
    }

    async fn delete_provider_marks(
        &self,
        provider: &str,
    ) -> Result<DeleteMarksResponse, IngestionError> {
        self.delete_marks(provider).await.map_err(not_found)
    }

    async fn cleanup(&self) -> Result<CleanupResponse, IngestionError> {
        Ok(MemoryEngine::cleanup(self).await)
    }
}
