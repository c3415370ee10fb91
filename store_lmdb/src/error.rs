use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmdbError {
    #[error("LMDB error: {0}")]
    Heed(#[from] heed::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("corrupted record: {0}")]
    Corruption(String),

    #[error("schema error: {0}")]
    Schema(String),
}

impl From<LmdbError> for ballot_store::StoreError {
    fn from(e: LmdbError) -> Self {
        match e {
            LmdbError::Serialization(inner) => {
                ballot_store::StoreError::Serialization(inner.to_string())
            }
            LmdbError::Corruption(msg) => ballot_store::StoreError::Corruption(msg),
            other => ballot_store::StoreError::StorageUnavailable(other.to_string()),
        }
    }
}
