//! Request handlers.
//!
//! Every store access is synchronous, so handlers hop onto the blocking pool
//! before touching the aggregator.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use ballot_rounds::{SchedulerState, VoteAggregator, VoteError};
use ballot_types::{Round, RoundId, Snapshot, Timestamp, Winner};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pagination::HistoryParams;
use crate::server::RpcState;
use crate::RpcError;

// ── Voting ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub option: String,
}

pub async fn vote(
    State(state): State<Arc<RpcState>>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<Snapshot>, RpcError> {
    let Json(request) = payload.map_err(|e| RpcError::InvalidRequest(e.body_text()))?;
    let snapshot = with_aggregator(&state, move |aggregator| {
        aggregator.cast_vote(&request.option)
    })
    .await?;
    debug!(
        round_id = ?snapshot.round_id,
        red = snapshot.red_votes,
        green = snapshot.green_votes,
        "vote accepted"
    );
    Ok(Json(snapshot))
}

pub async fn status(State(state): State<Arc<RpcState>>) -> Result<Json<Snapshot>, RpcError> {
    let snapshot = with_aggregator(&state, |aggregator| aggregator.get_status()).await?;
    Ok(Json(snapshot))
}

// ── History ──────────────────────────────────────────────────────────────

/// A closed round as served by the history endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: RoundId,
    pub winner: Option<Winner>,
    pub red_votes: u64,
    pub green_votes: u64,
    pub opened_at: Timestamp,
    pub closed_at: Option<Timestamp>,
}

impl From<Round> for HistoryEntry {
    fn from(round: Round) -> Self {
        Self {
            id: round.id,
            winner: round.winner,
            red_votes: round.red_votes,
            green_votes: round.green_votes,
            opened_at: round.opened_at,
            closed_at: round.closed_at,
        }
    }
}

pub async fn history(
    State(state): State<Arc<RpcState>>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<Vec<HistoryEntry>>, RpcError> {
    let Query(params) = params.map_err(|e| RpcError::InvalidRequest(e.body_text()))?;
    let limit = params.effective_limit()?;
    let rounds = with_aggregator(&state, move |aggregator| aggregator.history(limit)).await?;
    Ok(Json(rounds.into_iter().map(HistoryEntry::from).collect()))
}

pub async fn latest(
    State(state): State<Arc<RpcState>>,
) -> Result<Json<Option<HistoryEntry>>, RpcError> {
    let round = with_aggregator(&state, |aggregator| aggregator.latest()).await?;
    Ok(Json(round.map(HistoryEntry::from)))
}

// ── Node ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub scheduler: SchedulerState,
}

/// Healthy while the scheduler is still running rounds.
pub async fn health(State(state): State<Arc<RpcState>>) -> impl IntoResponse {
    let scheduler = state.scheduler.state();
    let (code, status) = match scheduler {
        SchedulerState::Stopped => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
        _ => (StatusCode::OK, "healthy"),
    };
    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            scheduler,
        }),
    )
}

pub async fn metrics(State(state): State<Arc<RpcState>>) -> Result<impl IntoResponse, RpcError> {
    let metrics = &state.metrics;
    metrics.subscribers.set(state.hub.subscriber_count() as i64);
    metrics.broadcast_evictions.set(state.hub.evictions() as i64);
    let body = metrics
        .encode()
        .map_err(|e| RpcError::Internal(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

async fn with_aggregator<T, F>(state: &RpcState, f: F) -> Result<T, RpcError>
where
    T: Send + 'static,
    F: FnOnce(&VoteAggregator) -> Result<T, VoteError> + Send + 'static,
{
    let aggregator = state.aggregator.clone();
    let result = tokio::task::spawn_blocking(move || f(&aggregator))
        .await
        .map_err(|e| RpcError::Internal(format!("blocking task failed: {e}")))?;
    Ok(result?)
}
