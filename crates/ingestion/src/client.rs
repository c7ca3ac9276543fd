//! REST client for the catalog's incremental ingestion endpoints.
//!
//! Every call resolves the catalog base URL through [`Discovery`], appends
//! `/incremental` and the endpoint path, and decodes the JSON body. Non-2xx
//! responses become [`IngestionError::Response`]. There is no retry, timeout
//! or caching at this layer.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use incr_metrics::names::http_client;
use incr_metrics::{MetricOptions, MetricsService};
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::KeyValue;
use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::discovery::Discovery;
use crate::error::IngestionError;
use crate::types::{
    CleanupResponse, DeleteMarksResponse, IncrementalProviderHealthResponse,
    IngestionMarksResponse, ProviderPurgeResponse, ProviderStatusResponse, ProvidersListResponse,
    SuccessResponse,
};

/// Plugin whose base URL hosts the incremental endpoints.
pub const CATALOG_PLUGIN_ID: &str = "catalog";

/// Management API for incremental entity providers.
#[async_trait]
pub trait IncrementalIngestionApi: Send + Sync {
    /// Health of all providers; lists any with duplicate ingestions.
    async fn get_health(&self) -> Result<IncrementalProviderHealthResponse, IngestionError>;

    async fn get_providers(&self) -> Result<ProvidersListResponse, IngestionError>;

    /// Current action (resting, interstitial, ...) of one provider.
    async fn get_provider_status(
        &self,
        provider: &str,
    ) -> Result<ProviderStatusResponse, IngestionError>;

    /// Run the provider's next scheduled action now.
    async fn trigger_provider(&self, provider: &str) -> Result<SuccessResponse, IngestionError>;

    /// Abandon the current cycle and start a new one now.
    async fn start_provider(&self, provider: &str) -> Result<SuccessResponse, IngestionError>;

    /// Abandon the current cycle; the next one starts in 24 hours.
    async fn cancel_provider(&self, provider: &str) -> Result<SuccessResponse, IngestionError>;

    /// Remove every record for the provider; it restarts in 24 hours.
    async fn delete_provider(&self, provider: &str)
        -> Result<ProviderPurgeResponse, IngestionError>;

    /// Marks recorded in the current cycle.
    async fn get_provider_marks(
        &self,
        provider: &str,
    ) -> Result<IngestionMarksResponse, IngestionError>;

    async fn delete_provider_marks(
        &self,
        provider: &str,
    ) -> Result<DeleteMarksResponse, IngestionError>;

    /// Remove every record for every provider. May leave orphaned entities.
    async fn cleanup(&self) -> Result<CleanupResponse, IngestionError>;
}

/// Path of a provider endpoint with the name percent-encoded as one segment.
pub fn provider_path(provider: &str, suffix: &str) -> String {
    format!("/providers/{}{}", urlencoding::encode(provider), suffix)
}

struct RequestMetrics {
    requests: Counter<u64>,
    duration: Histogram<f64>,
}

impl RequestMetrics {
    fn new(metrics: &dyn MetricsService) -> Self {
        Self {
            requests: metrics.create_counter(
                http_client::REQUESTS,
                Some(MetricOptions::new().with_description("Outgoing HTTP requests")),
            ),
            duration: metrics.create_histogram(
                http_client::DURATION,
                Some(
                    MetricOptions::new()
                        .with_description("Outgoing HTTP request duration")
                        .with_unit("ms"),
                ),
            ),
        }
    }

    fn record(&self, method: &Method, status: Option<u16>, started: Instant) {
        let status = status.map(|s| s.to_string()).unwrap_or_else(|| "error".into());
        let attrs = [
            KeyValue::new("http.request.method", method.as_str().to_string()),
            KeyValue::new("http.response.status_code", status),
        ];
        self.requests.add(1, &attrs);
        self.duration
            .record(started.elapsed().as_secs_f64() * 1000.0, &attrs);
    }
}

/// HTTP implementation of [`IncrementalIngestionApi`].
pub struct IngestionClient {
    discovery: Arc<dyn Discovery>,
    http: reqwest::Client,
    metrics: Option<RequestMetrics>,
}

impl IngestionClient {
    pub fn new(discovery: Arc<dyn Discovery>) -> Self {
        Self {
            discovery,
            http: reqwest::Client::new(),
            metrics: None,
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Record request count and duration through `metrics`.
    pub fn with_metrics(mut self, metrics: &dyn MetricsService) -> Self {
        self.metrics = Some(RequestMetrics::new(metrics));
        self
    }

    async fn url(&self, path: &str) -> Result<String, IngestionError> {
        let base = self.discovery.base_url(CATALOG_PLUGIN_ID).await?;
        Ok(format!("{}/incremental{}", base.trim_end_matches('/'), path))
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
    ) -> Result<T, IngestionError> {
        let url = self.url(path).await?;
        debug!(%method, %url, "incremental ingestion request");

        let started = Instant::now();
        let resp = match self.http.request(method.clone(), &url).send().await {
            Ok(resp) => resp,
            Err(source) => {
                if let Some(m) = &self.metrics {
                    m.record(&method, None, started);
                }
                return Err(IngestionError::Transport { url, source });
            }
        };

        let status = resp.status();
        if let Some(m) = &self.metrics {
            m.record(&method, Some(status.as_u16()), started);
        }

        if !status.is_success() {
            let body = match resp.text().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(%url, error = %e, "failed to read error response body");
                    String::new()
                }
            };
            warn!(%method, %url, status = status.as_u16(), "incremental ingestion request failed");
            return Err(IngestionError::from_response(status, body));
        }

        resp.json()
            .await
            .map_err(|source| IngestionError::Decode { url, source })
    }
}

#[async_trait]
impl IncrementalIngestionApi for IngestionClient {
    async fn get_health(&self) -> Result<IncrementalProviderHealthResponse, IngestionError> {
        self.request(Method::GET, "/health").await
    }

    async fn get_providers(&self) -> Result<ProvidersListResponse, IngestionError> {
        self.request(Method::GET, "/providers").await
    }

    async fn get_provider_status(
        &self,
        provider: &str,
    ) -> Result<ProviderStatusResponse, IngestionError> {
        self.request(Method::GET, &provider_path(provider, "")).await
    }

    async fn trigger_provider(&self, provider: &str) -> Result<SuccessResponse, IngestionError> {
        self.request(Method::POST, &provider_path(provider, "/trigger"))
            .await
    }

    async fn start_provider(&self, provider: &str) -> Result<SuccessResponse, IngestionError> {
        self.request(Method::POST, &provider_path(provider, "/start"))
            .await
    }

    async fn cancel_provider(&self, provider: &str) -> Result<SuccessResponse, IngestionError> {
        self.request(Method::POST, &provider_path(provider, "/cancel"))
            .await
    }

    async fn delete_provider(
        &self,
        provider: &str,
    ) -> Result<ProviderPurgeResponse, IngestionError> {
        self.request(Method::DELETE, &provider_path(provider, ""))
            .await
    }

    async fn get_provider_marks(
        &self,
        provider: &str,
    ) -> Result<IngestionMarksResponse, IngestionError> {
        self.request(Method::GET, &provider_path(provider, "/marks"))
            .await
    }

    async fn delete_provider_marks(
        &self,
        provider: &str,
    ) -> Result<DeleteMarksResponse, IngestionError> {
        self.request(Method::DELETE, &provider_path(provider, "/marks"))
            .await
    }

    async fn cleanup(&self) -> Result<CleanupResponse, IngestionError> {
        self.request(Method::POST, "/cleanup").await
    }
}
