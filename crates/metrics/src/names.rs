//! Well-known metric and attribute names.
//!
//! Metric names here are bare: pass them to a scoped [`MetricsService`](crate::MetricsService)
//! and the root namespace, scope and id are prepended.

/// Incremental ingestion metrics, recorded under the catalog plugin.
pub mod incremental {
    pub const COMMANDS: &str = "incremental.commands";
    pub const PROVIDERS: &str = "incremental.providers";
    pub const MARKS_RECORDED: &str = "incremental.marks.recorded";
}

/// Outgoing HTTP request metrics recorded by instrumented clients.
pub mod http_client {
    pub const REQUESTS: &str = "http.client.requests";
    pub const DURATION: &str = "http.client.duration";
}

/// Attribute key suffixes; the root namespace is prepended at use.
pub mod attributes {
    pub const PLUGIN_ID: &str = "plugin.id";
    pub const PLUGIN_VERSION: &str = "plugin.version";
    pub const SERVICE_ID: &str = "service.id";
    pub const SERVICE_VERSION: &str = "service.version";
}
