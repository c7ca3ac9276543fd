//! The metrics facade.
//!
//! [`MetricsService`] is what plugins and services hold. Every name passed in
//! is qualified by the service's [`MetricNamePrefixer`] before the instrument
//! is created on the underlying meter.

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter, UpDownCounter};
use tracing::trace;

use crate::instruments::{self, MetricOptions, ObservableCallback};
use crate::prefix::MetricNamePrefixer;

/// Instrument factory bound to one meter and one name prefix.
pub trait MetricsService: Send + Sync {
    fn create_counter(&self, name: &str, opts: Option<MetricOptions>) -> Counter<u64>;

    fn create_up_down_counter(&self, name: &str, opts: Option<MetricOptions>) -> UpDownCounter<i64>;

    fn create_histogram(&self, name: &str, opts: Option<MetricOptions>) -> Histogram<f64>;

    fn create_gauge(&self, name: &str, opts: Option<MetricOptions>) -> Gauge<f64>;

    fn create_observable_counter(
        &self,
        name: &str,
        callback: ObservableCallback<u64>,
        opts: Option<MetricOptions>,
    );

    fn create_observable_up_down_counter(
        &self,
        name: &str,
        callback: ObservableCallback<i64>,
        opts: Option<MetricOptions>,
    );

    fn create_observable_gauge(
        &self,
        name: &str,
        callback: ObservableCallback<f64>,
        opts: Option<MetricOptions>,
    );
}

/// The single [`MetricsService`] implementation: a meter plus a prefixer.
#[derive(Clone)]
pub struct ScopedMetricsService {
    meter: Meter,
    prefixer: MetricNamePrefixer,
}

impl ScopedMetricsService {
    pub fn new(meter: Meter, prefixer: MetricNamePrefixer) -> Self {
        Self { meter, prefixer }
    }

    pub fn namespace(&self) -> &str {
        self.prefixer.namespace()
    }

    fn qualify(&self, name: &str) -> String {
        let qualified = self.prefixer.prefix(name);
        trace!(metric = %qualified, "creating instrument");
        qualified
    }
}

impl MetricsService for ScopedMetricsService {
    fn create_counter(&self, name: &str, opts: Option<MetricOptions>) -> Counter<u64> {
        instruments::create_counter(&self.meter, self.qualify(name), &opts.unwrap_or_default())
    }

    fn create_up_down_counter(
        &self,
        name: &str,
        opts: Option<MetricOptions>,
    ) -> UpDownCounter<i64> {
        instruments::create_up_down_counter(
            &self.meter,
            self.qualify(name),
            &opts.unwrap_or_default(),
        )
    }

    fn create_histogram(&self, name: &str, opts: Option<MetricOptions>) -> Histogram<f64> {
        instruments::create_histogram(&self.meter, self.qualify(name), &opts.unwrap_or_default())
    }

    fn create_gauge(&self, name: &str, opts: Option<MetricOptions>) -> Gauge<f64> {
        instruments::create_gauge(&self.meter, self.qualify(name), &opts.unwrap_or_default())
    }

    fn create_observable_counter(
        &self,
        name: &str,
        callback: ObservableCallback<u64>,
        opts: Option<MetricOptions>,
    ) {
        instruments::create_observable_counter(
            &self.meter,
            self.qualify(name),
            callback,
            &opts.unwrap_or_default(),
        );
    }

    fn create_observable_up_down_counter(
        &self,
        name: &str,
        callback: ObservableCallback<i64>,
        opts: Option<MetricOptions>,
    ) {
        instruments::create_observable_up_down_counter(
            &self.meter,
            self.qualify(name),
            callback,
            &opts.unwrap_or_default(),
        );
    }

    fn create_observable_gauge(
        &self,
        name: &str,
        callback: ObservableCallback<f64>,
        opts: Option<MetricOptions>,
    ) {
        instruments::create_observable_gauge(
            &self.meter,
            self.qualify(name),
            callback,
            &opts.unwrap_or_default(),
        );
    }
}
