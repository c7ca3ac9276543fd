//! In-memory meter provider for unit tests.

use opentelemetry_sdk::metrics::{InMemoryMetricExporter, PeriodicReader, SdkMeterProvider};

pub(crate) fn in_memory_provider() -> (SdkMeterProvider, InMemoryMetricExporter) {
    let exporter = InMemoryMetricExporter::default();
    let reader = PeriodicReader::builder(exporter.clone()).build();
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    (provider, exporter)
}

/// `(scope name, metric name)` pairs exported so far.
pub(crate) fn exported(exporter: &InMemoryMetricExporter) -> Vec<(String, String)> {
    let finished = exporter.get_finished_metrics().unwrap_or_default();
    let mut out = Vec::new();
    for resource_metrics in &finished {
        for scope_metrics in resource_metrics.scope_metrics() {
            let scope = scope_metrics.scope().name().to_string();
            for metric in scope_metrics.metrics() {
                out.push((scope.clone(), metric.name().to_string()));
            }
        }
    }
    out
}
