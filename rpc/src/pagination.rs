//! `limit` parsing for the history endpoint.

use serde::Deserialize;

use crate::RpcError;

/// Page size when `limit` is not given.
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

/// Largest page a single request may ask for.
pub const MAX_HISTORY_LIMIT: u32 = 500;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<u32>,
}

impl HistoryParams {
    /// The requested page size; out-of-range values are refused rather than clamped.
    pub fn effective_limit(&self) -> Result<usize, RpcError> {
        match self.limit.unwrap_or(DEFAULT_HISTORY_LIMIT) {
            limit @ 1..=MAX_HISTORY_LIMIT => Ok(limit as usize),
            other => Err(RpcError::InvalidRequest(format!(
                "limit must be between 1 and {MAX_HISTORY_LIMIT}, got {other}"
            ))),
        }
    }
}
