use ballot_types::RoundId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The round closed before the conditional update could apply.
    #[error("round {0} is already closed")]
    RoundClosedConflict(RoundId),

    /// Another round already holds the single open slot.
    #[error("round {0} is already open")]
    OpenRoundExists(RoundId),

    #[error("round not found: {0}")]
    RoundNotFound(RoundId),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database is corrupted: {0}")]
    Corruption(String),
}

impl StoreError {
    /// Conflicts are benign races that the caller resolves by re-reading.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::RoundClosedConflict(_) | Self::OpenRoundExists(_)
        )
    }
}
