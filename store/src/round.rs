//! Round storage trait.

use ballot_types::{Color, Round, RoundId, Tally, Timestamp, WinnerRule};

use crate::StoreError;

/// Owner of the single "current round" slot and the completed-round log.
///
/// `increment` and `close` must each be one atomic conditional operation
/// against persisted state. Implementations never read-then-write across two
/// steps; that is what keeps votes from being lost or double-counted at a
/// round boundary.
pub trait RoundStore: Send + Sync {
    /// The round currently accepting votes, if any.
    fn get_open_round(&self) -> Result<Option<Round>, StoreError>;

    /// Persist a new open round with zero counters.
    ///
    /// Fails with [`StoreError::OpenRoundExists`] when another round already
    /// holds the open slot.
    fn create_round(&self, opened_at: Timestamp) -> Result<Round, StoreError>;

    /// Add one vote for `color` to `round_id`, only if that round is still open.
    ///
    /// Fails with [`StoreError::RoundClosedConflict`] once the round has closed.
    fn increment(&self, round_id: RoundId, color: Color) -> Result<Tally, StoreError>;

    /// Close `round_id`, stamping the winner computed by `rule` from the
    /// counters as they stand at commit time.
    ///
    /// Closing an already-closed round is a no-op that returns the stored record.
    fn close(
        &self,
        round_id: RoundId,
        rule: WinnerRule,
        closed_at: Timestamp,
    ) -> Result<Round, StoreError>;

    /// Closed rounds, most recently closed first, at most `limit` entries.
    fn list_closed(&self, limit: usize) -> Result<Vec<Round>, StoreError>;

    fn get_round(&self, round_id: RoundId) -> Result<Option<Round>, StoreError>;

    fn latest_closed(&self) -> Result<Option<Round>, StoreError> {
        Ok(self.list_closed(1)?.into_iter().next())
    }

    /// Create a round, or adopt the one that won a concurrent creation race.
    fn open_or_current(&self, opened_at: Timestamp) -> Result<Round, StoreError> {
        match self.create_round(opened_at) {
            Ok(round) => Ok(round),
            Err(StoreError::OpenRoundExists(id)) => match self.get_open_round()? {
                Some(round) => Ok(round),
                // The winner closed between our conflict and the re-read.
                None => Err(StoreError::RoundClosedConflict(id)),
            },
            Err(e) => Err(e),
        }
    }
}
