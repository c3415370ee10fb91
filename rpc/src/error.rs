//! API error types and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ballot_rounds::VoteError;
use ballot_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Vote(#[from] VoteError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RpcError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Vote(e) => match e {
                VoteError::InvalidVote(_) => StatusCode::BAD_REQUEST,
                VoteError::VotingCutoff { .. } => StatusCode::CONFLICT,
                VoteError::VoteDropped { .. } => StatusCode::SERVICE_UNAVAILABLE,
                VoteError::Store(StoreError::StorageUnavailable(_)) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                VoteError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for RpcError {
    fn from(e: StoreError) -> Self {
        Self::Vote(VoteError::Store(e))
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
