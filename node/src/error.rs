use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Lmdb(#[from] ballot_store_lmdb::LmdbError),

    #[error("store error: {0}")]
    Store(#[from] ballot_store::StoreError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] ballot_rounds::SchedulerError),

    #[error("logging error: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP server error: {0}")]
    Http(String),

    #[error("background task failed: {0}")]
    Task(String),
}
