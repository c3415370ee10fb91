//! Fundamental types for timed RED/GREEN voting rounds.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! vote colors, winners and tie policies, round records, tallies, snapshots,
//! timestamps and the clock abstraction.

pub mod error;
pub mod round;
pub mod time;
pub mod vote;

pub use error::InvalidVote;
pub use round::{Round, RoundId, RoundStatus, Snapshot, Tally};
pub use time::{Clock, SystemClock, Timestamp};
pub use vote::{Color, Winner, WinnerRule};
