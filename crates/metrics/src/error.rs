use thiserror::Error;

/// Errors raised while bootstrapping or shutting down telemetry.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("exporter error: {0}")]
    Exporter(String),

    #[error("missing endpoint for {0} exporter")]
    MissingEndpoint(&'static str),

    #[error("meter provider shutdown failed: {0}")]
    Shutdown(String),
}
