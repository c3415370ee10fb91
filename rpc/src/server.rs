//! Router assembly.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use ballot_rounds::{RoundMetrics, SchedulerHandle, VoteAggregator};
use ballot_websocket::{BroadcastHub, WsState};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;

/// Everything the handlers need, shared across requests.
pub struct RpcState {
    pub aggregator: Arc<VoteAggregator>,
    pub hub: Arc<BroadcastHub>,
    pub metrics: Arc<RoundMetrics>,
    pub scheduler: SchedulerHandle,
    /// Bound on a single WebSocket write.
    pub send_timeout: Duration,
}

/// The full HTTP surface, including the WebSocket stream.
pub fn build_router(state: Arc<RpcState>) -> Router {
    let ws_state = WsState::new(state.hub.clone(), state.aggregator.clone())
        .with_send_timeout(state.send_timeout);

    Router::new()
        .route("/api/voting/vote", post(handlers::vote))
        .route("/api/voting/status", get(handlers::status))
        .route("/api/history", get(handlers::history))
        .route("/api/history/latest", get(handlers::latest))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .merge(ballot_websocket::router(Arc::new(ws_state)))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
