//! Incremental ingestion: wire types, REST client and an in-memory engine.
//!
//! [`IngestionClient`] talks to `<catalog base>/incremental` over HTTP;
//! [`MemoryEngine`] implements the same [`IncrementalIngestionApi`] in
//! process and [`router`] serves it over axum.

pub mod client;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod router;
pub mod types;

pub use client::{provider_path, IncrementalIngestionApi, IngestionClient, CATALOG_PLUGIN_ID};
pub use discovery::{Discovery, StaticDiscovery};
pub use engine::MemoryEngine;
pub use error::{EngineError, IngestionError};
pub use types::*;
