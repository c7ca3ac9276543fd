pub mod config;
pub mod error;
pub mod lifecycle;

pub use config::{
    load_dotenv, AdminConfig, BackendConfig, Config, EngineConfig, ExporterConfig, ExporterKind,
    InstrumentationConfig, ResourceConfig, TelemetryConfig,
};
pub use error::*;
pub use lifecycle::Lifecycle;
