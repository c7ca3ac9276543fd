//! HTTP surface of the in-memory engine.
//!
//! Mounts the incremental endpoints at `/api/catalog/incremental`, the
//! location the client's default discovery resolves for the catalog plugin.

use std::future::Future;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::info;

use crate::engine::MemoryEngine;
use crate::error::EngineError;
use crate::types::{
    CleanupResponse, DeleteMarksResponse, IncrementalProviderHealthResponse,
    IngestionMarksResponse, ProviderPurgeResponse, ProviderStatusResponse, ProvidersListResponse,
    SuccessResponse,
};

/// Mount point of [`incremental_router`] inside [`build_router`].
pub const INCREMENTAL_PREFIX: &str = "/api/catalog/incremental";

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;

fn engine_err(e: EngineError) -> (StatusCode, Json<Value>) {
    let status = match e {
        EngineError::UnknownProvider(_) => StatusCode::NOT_FOUND,
    };
    (
        status,
        Json(json!({ "error": { "name": e.name(), "message": e.to_string() } })),
    )
}

/// Incremental endpoints relative to their mount point.
pub fn incremental_router(engine: Arc<MemoryEngine>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/providers", get(providers))
        .route(
            "/providers/{name}",
            get(provider_status).delete(delete_provider),
        )
        .route("/providers/{name}/trigger", post(trigger_provider))
        .route("/providers/{name}/start", post(start_provider))
        .route("/providers/{name}/cancel", post(cancel_provider))
        .route(
            "/providers/{name}/marks",
            get(provider_marks).delete(delete_provider_marks),
        )
        .route("/cleanup", post(cleanup))
        .with_state(engine)
}

/// Full application router.
pub fn build_router(engine: Arc<MemoryEngine>) -> Router {
    Router::new().nest(INCREMENTAL_PREFIX, incremental_router(engine))
}

/// Serve the engine on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    engine: Arc<MemoryEngine>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, prefix = INCREMENTAL_PREFIX, "incremental engine listening");
    }
    axum::serve(listener, build_router(engine))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("incremental engine stopped");
    Ok(())
}

// ── Handlers ────────────────────────────────────────────────────

async fn health(
    State(engine): State<Arc<MemoryEngine>>,
) -> Json<IncrementalProviderHealthResponse> {
    Json(engine.health().await)
}

async fn providers(State(engine): State<Arc<MemoryEngine>>) -> Json<ProvidersListResponse> {
    Json(engine.providers().await)
}

async fn provider_status(
    State(engine): State<Arc<MemoryEngine>>,
    Path(name): Path<String>,
) -> ApiResult<ProviderStatusResponse> {
    engine.status(&name).await.map(Json).map_err(engine_err)
}

async fn trigger_provider(
    State(engine): State<Arc<MemoryEngine>>,
    Path(name): Path<String>,
) -> ApiResult<SuccessResponse> {
    engine.trigger(&name).await.map(Json).map_err(engine_err)
}

async fn start_provider(
    State(engine): State<Arc<MemoryEngine>>,
    Path(name): Path<String>,
) -> ApiResult<SuccessResponse> {
    engine.start(&name).await.map(Json).map_err(engine_err)
}

async fn cancel_provider(
    State(engine): State<Arc<MemoryEngine>>,
    Path(name): Path<String>,
) -> ApiResult<SuccessResponse> {
    engine.cancel(&name).await.map(Json).map_err(engine_err)
}

async fn delete_provider(
    State(engine): State<Arc<MemoryEngine>>,
    Path(name): Path<String>,
) -> ApiResult<ProviderPurgeResponse> {
    engine.delete(&name).await.map(Json).map_err(engine_err)
}

async fn provider_marks(
    State(engine): State<Arc<MemoryEngine>>,
    Path(name): Path<String>,
) -> ApiResult<IngestionMarksResponse> {
    engine.marks(&name).await.map(Json).map_err(engine_err)
}

async fn delete_provider_marks(
    State(engine): State<Arc<MemoryEngine>>,
    Path(name): Path<String>,
) -> ApiResult<DeleteMarksResponse> {
    engine.delete_marks(&name).await.map(Json).map_err(engine_err)
}

async fn cleanup(State(engine): State<Arc<MemoryEngine>>) -> Json<CleanupResponse> {
    Json(engine.cleanup().await)
}
