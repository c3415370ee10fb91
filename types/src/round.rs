//! The round record and the views derived from it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Color, Timestamp, Winner, WinnerRule};

/// Store-assigned round identifier. Ids grow monotonically with creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundId(u64);

impl RoundId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    /// Big-endian bytes, so that lexicographic key order equals id order.
    pub fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_be_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoundStatus {
    Open,
    Closed,
}

/// One timed voting window.
///
/// `winner` and `closed_at` are `None` while the round is open and set exactly
/// once when it closes; after that the record never changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub red_votes: u64,
    pub green_votes: u64,
    pub status: RoundStatus,
    pub winner: Option<Winner>,
    pub opened_at: Timestamp,
    pub closed_at: Option<Timestamp>,
}

impl Round {
    /// A freshly opened round with zero counters.
    pub fn open(id: RoundId, opened_at: Timestamp) -> Self {
        Self {
            id,
            red_votes: 0,
            green_votes: 0,
            status: RoundStatus::Open,
            winner: None,
            opened_at,
            closed_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == RoundStatus::Open
    }

    pub fn total_votes(&self) -> u64 {
        self.red_votes + self.green_votes
    }

    pub fn deadline(&self, duration_secs: u64) -> Timestamp {
        self.opened_at.plus_secs(duration_secs)
    }

    pub fn seconds_remaining(&self, duration_secs: u64, now: Timestamp) -> u64 {
        self.deadline(duration_secs).as_secs().saturating_sub(now.as_secs())
    }

    /// Add one vote. Callers are responsible for checking that the round is open.
    pub fn record(&mut self, color: Color) {
        match color {
            Color::Red => self.red_votes += 1,
            Color::Green => self.green_votes += 1,
        }
    }

    /// Flip to closed, stamping the winner from the current counters.
    pub fn finalize(&mut self, rule: WinnerRule, closed_at: Timestamp) {
        self.winner = Some(rule.decide(self.red_votes, self.green_votes));
        self.status = RoundStatus::Closed;
        self.closed_at = Some(closed_at);
    }

    pub fn tally(&self) -> Tally {
        Tally {
            round_id: self.id,
            red_votes: self.red_votes,
            green_votes: self.green_votes,
        }
    }
}

/// Post-increment counters of a single round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub round_id: RoundId,
    pub red_votes: u64,
    pub green_votes: u64,
}

/// Ephemeral view of the current round handed to voters and observers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub round_id: Option<RoundId>,
    pub red_votes: u64,
    pub green_votes: u64,
    pub seconds_remaining: u64,
}

impl Snapshot {
    /// What observers see while no round is open.
    pub fn idle() -> Self {
        Self {
            round_id: None,
            red_votes: 0,
            green_votes: 0,
            seconds_remaining: 0,
        }
    }

    pub fn from_tally(tally: Tally, seconds_remaining: u64) -> Self {
        Self {
            round_id: Some(tally.round_id),
            red_votes: tally.red_votes,
            green_votes: tally.green_votes,
            seconds_remaining,
        }
    }
}
