//! # feedlens-api
//!
//! HTTP surface for feedlens: one JSON-RPC 2.0 endpoint that starts
//! background jobs and reports their status, plus a health check.

pub mod rpc;
pub mod source;

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use feedlens_jobs::Dispatcher;

pub use source::HttpCommentSource;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Build the application router.
///
/// The JSON-RPC endpoint is served at both `/` and `/rpc`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(rpc_endpoint))
        .route("/rpc", post(rpc_endpoint))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .with_state(state)
}

async fn rpc_endpoint(State(state): State<AppState>, body: Bytes) -> Json<Value> {
    Json(rpc::handle(&state.dispatcher, &body))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let kinds: Vec<&str> = feedlens_core::JobKind::ALL
        .into_iter()
        .filter(|kind| state.dispatcher.handles(*kind))
        .map(|kind| kind.as_str())
        .collect();
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "jobs": kinds,
    }))
}
