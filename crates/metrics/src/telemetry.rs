//! Telemetry bootstrap: meter provider, resource and exporters.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use incr_core::{ExporterConfig, ExporterKind, Lifecycle, TelemetryConfig};
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::resource::SERVICE_VERSION;
use tracing::{info, warn};

use crate::error::MetricsError;
use crate::root::DefaultRootMetricsService;

/// Owns the process meter provider.
///
/// Nothing is registered globally; consumers get the provider (or a root
/// metrics service built on it) from this struct.
pub struct RootTelemetry {
    config: TelemetryConfig,
    provider: SdkMeterProvider,
    shut_down: Arc<AtomicBool>,
}

impl RootTelemetry {
    /// Build the meter provider described by `config`.
    ///
    /// With telemetry disabled the provider has no readers: instruments work
    /// but nothing is exported.
    pub fn from_config(config: &TelemetryConfig) -> Result<Self, MetricsError> {
        let resource = Resource::builder()
            .with_service_name(config.resource.service_name.clone())
            .with_attribute(KeyValue::new(
                SERVICE_VERSION,
                config.resource.service_version.clone(),
            ))
            .build();

        let mut builder = SdkMeterProvider::builder().with_resource(resource);

        if config.enabled {
            let interval = Duration::from_secs(config.export_interval_secs.max(1));
            for exporter in config.exporters.iter().filter(|e| e.enabled) {
                builder = match exporter.kind {
                    ExporterKind::Console => {
                        let reader =
                            PeriodicReader::builder(opentelemetry_stdout::MetricExporter::default())
                                .with_interval(interval)
                                .build();
                        builder.with_reader(reader)
                    }
                    ExporterKind::Otlp => {
                        let reader = PeriodicReader::builder(build_otlp_exporter(exporter)?)
                            .with_interval(interval)
                            .build();
                        builder.with_reader(reader)
                    }
                };
                info!(
                    exporter = ?exporter.kind,
                    interval_secs = interval.as_secs(),
                    "metrics exporter enabled"
                );
            }
        } else {
            info!("telemetry disabled; metrics will not be exported");
        }

        Ok(Self::with_provider(config, builder.build()))
    }

    /// Wrap an existing provider, e.g. one with an in-memory reader.
    pub fn with_provider(config: &TelemetryConfig, provider: SdkMeterProvider) -> Self {
        Self {
            config: config.clone(),
            provider,
            shut_down: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn meter_provider(&self) -> SdkMeterProvider {
        self.provider.clone()
    }

    pub fn root_metrics(&self) -> DefaultRootMetricsService {
        DefaultRootMetricsService::new(self.provider.clone(), self.config.root_namespace.clone())
    }

    /// Whether outgoing HTTP calls should record request metrics.
    pub fn http_instrumentation_enabled(&self) -> bool {
        self.config.enabled && self.config.instrumentations.http
    }

    /// Register flush-and-shutdown as a before-shutdown hook.
    pub fn bootstrap(&self, lifecycle: &Lifecycle) {
        let provider = self.provider.clone();
        let shut_down = self.shut_down.clone();
        lifecycle.add_before_shutdown_hook("telemetry", move || {
            shutdown_provider(&provider, &shut_down).map_err(|e| e.to_string())
        });
        info!(
            service = %self.config.resource.service_name,
            version = %self.config.resource.service_version,
            "telemetry bootstrapped"
        );
    }

    /// Flush pending metrics and shut the provider down. Idempotent.
    pub fn shutdown(&self) -> Result<(), MetricsError> {
        shutdown_provider(&self.provider, &self.shut_down)
    }
}

fn shutdown_provider(
    provider: &SdkMeterProvider,
    shut_down: &AtomicBool,
) -> Result<(), MetricsError> {
    if shut_down.swap(true, Ordering::SeqCst) {
        return Ok(());
    }
    if let Err(e) = provider.force_flush() {
        warn!(error = %e, "failed to flush metrics before shutdown");
    }
    provider
        .shutdown()
        .map_err(|e| MetricsError::Shutdown(e.to_string()))
}

fn build_otlp_exporter(
    config: &ExporterConfig,
) -> Result<opentelemetry_otlp::MetricExporter, MetricsError> {
    let endpoint = config
        .endpoint
        .clone()
        .ok_or(MetricsError::MissingEndpoint("otlp"))?;
    opentelemetry_otlp::MetricExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| MetricsError::Exporter(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::MetricsService;
    use crate::testing::{exported, in_memory_provider};
    use incr_core::Config;

    fn disabled() -> TelemetryConfig {
        TelemetryConfig {
            enabled: false,
            ..TelemetryConfig::default()
        }
    }

    #[test]
    fn disabled_telemetry_still_hands_out_instruments() {
        let telemetry = RootTelemetry::from_config(&disabled()).unwrap();
        assert!(!telemetry.http_instrumentation_enabled());
        telemetry.root_metrics().create_counter("noop", None).add(1, &[]);
        telemetry.shutdown().unwrap();
    }

    #[test]
    fn otlp_without_endpoint_is_rejected() {
        let config = TelemetryConfig {
            exporters: vec![ExporterConfig {
                kind: ExporterKind::Otlp,
                enabled: true,
                endpoint: None,
            }],
            ..TelemetryConfig::default()
        };
        let err = RootTelemetry::from_config(&config).err().unwrap();
        assert!(matches!(err, MetricsError::MissingEndpoint("otlp")));
    }

    #[test]
    fn disabled_exporters_are_skipped() {
        let config = TelemetryConfig {
            exporters: vec![ExporterConfig {
                kind: ExporterKind::Otlp,
                enabled: false,
                endpoint: None,
            }],
            ..TelemetryConfig::default()
        };
        let telemetry = RootTelemetry::from_config(&config).unwrap();
        telemetry.shutdown().unwrap();
    }

    #[test]
    fn root_metrics_use_configured_namespace() {
        let config = Config::from_toml_str("[telemetry]\nroot_namespace = \"acme\"\n")
            .unwrap()
            .telemetry;
        let (provider, exporter) = in_memory_provider();
        let telemetry = RootTelemetry::with_provider(&config, provider.clone());

        telemetry
            .root_metrics()
            .create_counter("boot", None)
            .add(1, &[]);
        provider.force_flush().unwrap();

        let names: Vec<String> = exported(&exporter).into_iter().map(|(_, n)| n).collect();
        assert_eq!(names, vec!["acme.framework.boot".to_string()]);
    }

    #[test]
    fn lifecycle_shutdown_flushes_provider_once() {
        let lifecycle = Lifecycle::new();
        let (provider, _exporter) = in_memory_provider();
        let telemetry = RootTelemetry::with_provider(&TelemetryConfig::default(), provider);
        telemetry.bootstrap(&lifecycle);

        lifecycle.shutdown().unwrap();
        // Already shut down through the hook.
        telemetry.shutdown().unwrap();
    }
}
