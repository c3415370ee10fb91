//! Timing and retry knobs shared by the aggregator and the scheduler.

use std::time::Duration;

use ballot_types::WinnerRule;

#[derive(Clone, Debug)]
pub struct RoundConfig {
    /// Length of the voting window.
    pub round_duration_secs: u64,
    /// Pause between a close and the next open.
    pub intermission: Duration,
    /// Votes are refused once this few seconds remain. `0` disables the cutoff.
    pub voting_cutoff_secs: u64,
    /// Upper bound on how long the scheduler sleeps between deadline checks;
    /// also bounds how long a stop request can go unnoticed.
    pub poll_interval: Duration,
    pub winner_rule: WinnerRule,
    /// Attempts a vote gets when rounds keep closing under it.
    pub vote_retry_attempts: u32,
    /// Consecutive storage failures before the scheduler gives up.
    pub scheduler_max_failures: u32,
    pub scheduler_backoff: Duration,
    pub scheduler_backoff_max: Duration,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            round_duration_secs: 60,
            intermission: Duration::from_secs(2),
            voting_cutoff_secs: 0,
            poll_interval: Duration::from_secs(1),
            winner_rule: WinnerRule::StrictMajority,
            vote_retry_attempts: 3,
            scheduler_max_failures: 5,
            scheduler_backoff: Duration::from_millis(500),
            scheduler_backoff_max: Duration::from_secs(10),
        }
    }
}
