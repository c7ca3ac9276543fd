//! Metrics facade over OpenTelemetry.
//!
//! Instruments are created through a [`MetricsService`] that qualifies every
//! name as `<root>.<scope>[.<id>].<name>` and delegates to a meter obtained
//! from an explicitly injected meter provider. [`RootTelemetry`] builds that
//! provider from configuration and ties its shutdown to a [`Lifecycle`](incr_core::Lifecycle).

pub mod error;
pub mod instruments;
pub mod names;
pub mod prefix;
pub mod root;
pub mod service;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use error::MetricsError;
pub use instruments::{MetricOptions, ObservableCallback};
pub use prefix::{MetricNamePrefixer, MetricScope};
pub use root::{
    DefaultRootMetricsService, NoopRootMetricsService, RootMetricsService, SharedMeterProvider,
    DEFAULT_ROOT_NAMESPACE,
};
pub use service::{MetricsService, ScopedMetricsService};
pub use telemetry::RootTelemetry;
