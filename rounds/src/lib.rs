//! Round lifecycle for timed RED/GREEN voting.
//!
//! Two actors share one [`ballot_store::RoundStore`]:
//! - [`VoteAggregator`] applies votes to whichever round is open at the
//!   instant the store commits them, retrying across a round boundary.
//! - [`RoundScheduler`] is the single control loop that closes a round at its
//!   deadline, stamps the winner, waits out the intermission and opens the
//!   next round.
//!
//! Both publish their results on the [`ballot_websocket::BroadcastHub`].

pub mod aggregator;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod scheduler;

pub use aggregator::VoteAggregator;
pub use clock::RuntimeClock;
pub use config::RoundConfig;
pub use error::{SchedulerError, VoteError};
pub use metrics::RoundMetrics;
pub use scheduler::{RoundScheduler, SchedulerHandle, SchedulerState};
