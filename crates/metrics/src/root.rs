//! Root metrics service and its plugin/service scoped children.

use std::sync::Arc;

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter, MeterProvider, UpDownCounter};
use opentelemetry::{InstrumentationScope, KeyValue};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use tracing::info;

use crate::instruments::{MetricOptions, ObservableCallback};
use crate::names::attributes;
use crate::prefix::{MetricNamePrefixer, MetricScope};
use crate::service::{MetricsService, ScopedMetricsService};

/// Meter provider handle injected into the root service.
pub type SharedMeterProvider = Arc<dyn MeterProvider + Send + Sync>;

/// Default root namespace for metric names.
pub const DEFAULT_ROOT_NAMESPACE: &str = "backstage";

/// Framework-level metrics plus factories for scoped children.
pub trait RootMetricsService: MetricsService {
    fn for_plugin(&self, plugin_id: &str, version: Option<&str>) -> Arc<dyn MetricsService>;

    fn for_service(&self, service_id: &str, version: Option<&str>) -> Arc<dyn MetricsService>;
}

/// Root metrics service over an explicitly provided meter provider.
#[derive(Clone)]
pub struct DefaultRootMetricsService {
    root_namespace: String,
    provider: SharedMeterProvider,
    root: ScopedMetricsService,
}

impl DefaultRootMetricsService {
    pub fn new<P>(provider: P, root_namespace: impl Into<String>) -> Self
    where
        P: MeterProvider + Send + Sync + 'static,
    {
        Self::from_shared(Arc::new(provider), root_namespace)
    }

    pub fn from_shared(provider: SharedMeterProvider, root_namespace: impl Into<String>) -> Self {
        let root_namespace = root_namespace.into();
        let meter = provider
            .meter_with_scope(InstrumentationScope::builder(root_namespace.clone()).build());
        let prefixer = MetricNamePrefixer::new(&root_namespace, MetricScope::Framework, None);
        Self {
            root: ScopedMetricsService::new(meter, prefixer),
            root_namespace,
            provider,
        }
    }

    pub fn root_namespace(&self) -> &str {
        &self.root_namespace
    }

    fn scoped(
        &self,
        scope: MetricScope,
        id: &str,
        version: Option<&str>,
        id_key: &str,
        version_key: &str,
    ) -> ScopedMetricsService {
        let prefixer = MetricNamePrefixer::new(&self.root_namespace, scope, Some(id));

        let mut attrs = vec![KeyValue::new(
            format!("{}.{}", self.root_namespace, id_key),
            id.to_string(),
        )];
        let mut builder = InstrumentationScope::builder(prefixer.namespace().to_string());
        if let Some(v) = version {
            builder = builder.with_version(v.to_string());
            attrs.push(KeyValue::new(
                format!("{}.{}", self.root_namespace, version_key),
                v.to_string(),
            ));
        }
        let meter: Meter = self
            .provider
            .meter_with_scope(builder.with_attributes(attrs).build());

        ScopedMetricsService::new(meter, prefixer)
    }
}

impl RootMetricsService for DefaultRootMetricsService {
    fn for_plugin(&self, plugin_id: &str, version: Option<&str>) -> Arc<dyn MetricsService> {
        info!(plugin_id, "Creating plugin-scoped metrics service");
        Arc::new(self.scoped(
            MetricScope::Plugin,
            plugin_id,
            version,
            attributes::PLUGIN_ID,
            attributes::PLUGIN_VERSION,
        ))
    }

    fn for_service(&self, service_id: &str, version: Option<&str>) -> Arc<dyn MetricsService> {
        info!(service_id, "Creating service-scoped metrics service");
        Arc::new(self.scoped(
            MetricScope::Service,
            service_id,
            version,
            attributes::SERVICE_ID,
            attributes::SERVICE_VERSION,
        ))
    }
}

impl MetricsService for DefaultRootMetricsService {
    fn create_counter(&self, name: &str, opts: Option<MetricOptions>) -> Counter<u64> {
        self.root.create_counter(name, opts)
    }

    fn create_up_down_counter(
        &self,
        name: &str,
        opts: Option<MetricOptions>,
    ) -> UpDownCounter<i64> {
        self.root.create_up_down_counter(name, opts)
    }

    fn create_histogram(&self, name: &str, opts: Option<MetricOptions>) -> Histogram<f64> {
        self.root.create_histogram(name, opts)
    }

    fn create_gauge(&self, name: &str, opts: Option<MetricOptions>) -> Gauge<f64> {
        self.root.create_gauge(name, opts)
    }

    fn create_observable_counter(
        &self,
        name: &str,
        callback: ObservableCallback<u64>,
        opts: Option<MetricOptions>,
    ) {
        self.root.create_observable_counter(name, callback, opts)
    }

    fn create_observable_up_down_counter(
        &self,
        name: &str,
        callback: ObservableCallback<i64>,
        opts: Option<MetricOptions>,
    ) {
        self.root.create_observable_up_down_counter(name, callback, opts)
    }

    fn create_observable_gauge(
        &self,
        name: &str,
        callback: ObservableCallback<f64>,
        opts: Option<MetricOptions>,
    ) {
        self.root.create_observable_gauge(name, callback, opts)
    }
}

/// Root service whose instruments are never exported.
///
/// Backed by a meter provider with no readers, so every instrument is real
/// but measurements go nowhere.
#[derive(Clone)]
pub struct NoopRootMetricsService {
    inner: DefaultRootMetricsService,
}

impl NoopRootMetricsService {
    pub fn new() -> Self {
        Self {
            inner: DefaultRootMetricsService::new(
                SdkMeterProvider::builder().build(),
                DEFAULT_ROOT_NAMESPACE,
            ),
        }
    }
}

impl Default for NoopRootMetricsService {
    fn default() -> Self {
        Self::new()
    }
}

impl RootMetricsService for NoopRootMetricsService {
    fn for_plugin(&self, plugin_id: &str, version: Option<&str>) -> Arc<dyn MetricsService> {
        self.inner.for_plugin(plugin_id, version)
    }

    fn for_service(&self, service_id: &str, version: Option<&str>) -> Arc<dyn MetricsService> {
        self.inner.for_service(service_id, version)
    }
}

impl MetricsService for NoopRootMetricsService {
    fn create_counter(&self, name: &str, opts: Option<MetricOptions>) -> Counter<u64> {
        self.inner.create_counter(name, opts)
    }

    fn create_up_down_counter(
        &self,
        name: &str,
        opts: Option<MetricOptions>,
    ) -> UpDownCounter<i64> {
        self.inner.create_up_down_counter(name, opts)
    }

    fn create_histogram(&self, name: &str, opts: Option<MetricOptions>) -> Histogram<f64> {
        self.inner.create_histogram(name, opts)
    }

    fn create_gauge(&self, name: &str, opts: Option<MetricOptions>) -> Gauge<f64> {
        self.inner.create_gauge(name, opts)
    }

    fn create_observable_counter(
        &self,
        name: &str,
        callback: ObservableCallback<u64>,
        opts: Option<MetricOptions>,
    ) {
        self.inner.create_observable_counter(name, callback, opts)
    }

    fn create_observable_up_down_counter(
        &self,
        name: &str,
        callback: ObservableCallback<i64>,
        opts: Option<MetricOptions>,
    ) {
        self.inner.create_observable_up_down_counter(name, callback, opts)
    }

    fn create_observable_gauge(
        &self,
        name: &str,
        callback: ObservableCallback<f64>,
        opts: Option<MetricOptions>,
    ) {
        self.inner.create_observable_gauge(name, callback, opts)
    }
}
