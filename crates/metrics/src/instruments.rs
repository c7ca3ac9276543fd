//! Instrument construction against an OpenTelemetry [`Meter`].
//!
//! The helpers here take an already-qualified name; prefixing happens in
//! the service layer.

use std::borrow::Cow;

use opentelemetry::metrics::{AsyncInstrument, Counter, Gauge, Histogram, Meter, UpDownCounter};

/// Callback invoked at collection time for observable instruments.
pub type ObservableCallback<T> = Box<dyn Fn(&dyn AsyncInstrument<T>) + Send + Sync>;

/// Optional instrument configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricOptions {
    pub description: Option<String>,
    pub unit: Option<String>,
    /// Explicit bucket boundaries (histograms only).
    pub boundaries: Option<Vec<f64>>,
}

impl MetricOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_boundaries(mut self, boundaries: Vec<f64>) -> Self {
        self.boundaries = Some(boundaries);
        self
    }
}

fn description(opts: &MetricOptions) -> Option<Cow<'static, str>> {
    opts.description.clone().map(Cow::Owned)
}

fn unit(opts: &MetricOptions) -> Option<Cow<'static, str>> {
    opts.unit.clone().map(Cow::Owned)
}

// Each builder type is distinct, so the description/unit plumbing is
// repeated per instrument rather than abstracted over.

pub fn create_counter(meter: &Meter, name: String, opts: &MetricOptions) -> Counter<u64> {
    let mut builder = meter.u64_counter(name);
    if let Some(d) = description(opts) {
        builder = builder.with_description(d);
    }
    if let Some(u) = unit(opts) {
        builder = builder.with_unit(u);
    }
    builder.build()
}

pub fn create_up_down_counter(
    meter: &Meter,
    name: String,
    opts: &MetricOptions,
) -> UpDownCounter<i64> {
    let mut builder = meter.i64_up_down_counter(name);
    if let Some(d) = description(opts) {
        builder = builder.with_description(d);
    }
    if let Some(u) = unit(opts) {
        builder = builder.with_unit(u);
    }
    builder.build()
}

pub fn create_histogram(meter: &Meter, name: String, opts: &MetricOptions) -> Histogram<f64> {
    let mut builder = meter.f64_histogram(name);
    if let Some(d) = description(opts) {
        builder = builder.with_description(d);
    }
    if let Some(u) = unit(opts) {
        builder = builder.with_unit(u);
    }
    if let Some(boundaries) = opts.boundaries.clone() {
        builder = builder.with_boundaries(boundaries);
    }
    builder.build()
}

pub fn create_gauge(meter: &Meter, name: String, opts: &MetricOptions) -> Gauge<f64> {
    let mut builder = meter.f64_gauge(name);
    if let Some(d) = description(opts) {
        builder = builder.with_description(d);
    }
    if let Some(u) = unit(opts) {
        builder = builder.with_unit(u);
    }
    builder.build()
}

/// Register an observable counter. The SDK keeps the callback alive; the
/// returned handle is not needed to keep observing.
pub fn create_observable_counter(
    meter: &Meter,
    name: String,
    callback: ObservableCallback<u64>,
    opts: &MetricOptions,
) {
    let mut builder = meter
        .u64_observable_counter(name)
        .with_callback(move |observer| callback(observer));
    if let Some(d) = description(opts) {
        builder = builder.with_description(d);
    }
    if let Some(u) = unit(opts) {
        builder = builder.with_unit(u);
    }
    builder.build();
}

pub fn create_observable_up_down_counter(
    meter: &Meter,
    name: String,
    callback: ObservableCallback<i64>,
    opts: &MetricOptions,
) {
    let mut builder = meter
        .i64_observable_up_down_counter(name)
        .with_callback(move |observer| callback(observer));
    if let Some(d) = description(opts) {
        builder = builder.with_description(d);
    }
    if let Some(u) = unit(opts) {
        builder = builder.with_unit(u);
    }
    builder.build();
}

pub fn create_observable_gauge(
    meter: &Meter,
    name: String,
    callback: ObservableCallback<f64>,
    opts: &MetricOptions,
) {
    let mut builder = meter
        .f64_observable_gauge(name)
        .with_callback(move |observer| callback(observer));
    if let Some(d) = description(opts) {
        builder = builder.with_description(d);
    }
    if let Some(u) = unit(opts) {
        builder = builder.with_unit(u);
    }
    builder.build();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_builder() {
        let opts = MetricOptions::new()
            .with_description("requests served")
            .with_unit("ms")
            .with_boundaries(vec![1.0, 10.0]);
        assert_eq!(opts.description.as_deref(), Some("requests served"));
        assert_eq!(opts.unit.as_deref(), Some("ms"));
        assert_eq!(opts.boundaries, Some(vec![1.0, 10.0]));
    }
}
