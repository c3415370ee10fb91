use ballot_store::StoreError;
use ballot_types::InvalidVote;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoteError {
    #[error(transparent)]
    InvalidVote(#[from] InvalidVote),

    #[error("voting cutoff reached: {seconds_remaining}s left, votes close at {cutoff_secs}s")]
    VotingCutoff {
        seconds_remaining: u64,
        cutoff_secs: u64,
    },

    /// Every attempt landed on a round that closed before the increment committed.
    #[error("vote dropped after {attempts} attempts at the round boundary")]
    VoteDropped { attempts: u32 },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The loop exhausted its retries; rounds are no longer being run.
    #[error("round scheduler stopped after {attempts} consecutive failures while {phase}: {source}")]
    Fatal {
        phase: &'static str,
        attempts: u32,
        #[source]
        source: StoreError,
    },
}
