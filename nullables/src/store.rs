//! Nullable store: thread-safe in-memory round storage for testing.

use ballot_store::{RoundStore, StoreError};
use ballot_types::{Color, Round, RoundId, Tally, Timestamp, WinnerRule};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    rounds: BTreeMap<RoundId, Round>,
    open: Option<RoundId>,
    /// Completed-round log in closure order.
    closed: Vec<RoundId>,
    next_id: u64,
}

/// An in-memory [`RoundStore`].
///
/// One mutex guards the whole state, so every operation is atomic exactly as
/// a single LMDB write transaction would be. Outages can be injected with
/// [`NullRoundStore::set_unavailable`].
#[derive(Default)]
pub struct NullRoundStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
    close_calls: AtomicUsize,
}

impl NullRoundStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every operation fails with `StorageUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `close` calls that reached the store, including no-op repeats.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Number of entries in the completed-round log.
    pub fn closed_count(&self) -> usize {
        self.state.lock().unwrap().closed.len()
    }

    /// Number of rounds currently marked open (the invariant says at most one).
    pub fn open_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .rounds
            .values()
            .filter(|r| r.is_open())
            .count()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::StorageUnavailable(
                "null store is offline".to_string(),
            ));
        }
        Ok(self.state.lock().unwrap())
    }
}

impl RoundStore for NullRoundStore {
    fn get_open_round(&self) -> Result<Option<Round>, StoreError> {
        let state = self.lock()?;
        Ok(state.open.and_then(|id| state.rounds.get(&id).cloned()))
    }

    fn create_round(&self, opened_at: Timestamp) -> Result<Round, StoreError> {
        let mut state = self.lock()?;
        if let Some(existing) = state.open {
            return Err(StoreError::OpenRoundExists(existing));
        }
        state.next_id += 1;
        let round = Round::open(RoundId::new(state.next_id), opened_at);
        state.rounds.insert(round.id, round.clone());
        state.open = Some(round.id);
        Ok(round)
    }

    fn increment(&self, round_id: RoundId, color: Color) -> Result<Tally, StoreError> {
        let mut state = self.lock()?;
        let round = state
            .rounds
            .get_mut(&round_id)
            .ok_or(StoreError::RoundNotFound(round_id))?;
        if !round.is_open() {
            return Err(StoreError::RoundClosedConflict(round_id));
        }
        round.record(color);
        Ok(round.tally())
    }

    fn close(
        &self,
        round_id: RoundId,
        rule: WinnerRule,
        closed_at: Timestamp,
    ) -> Result<Round, StoreError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock()?;
        let round = state
            .rounds
            .get_mut(&round_id)
            .ok_or(StoreError::RoundNotFound(round_id))?;
        if !round.is_open() {
            return Ok(round.clone());
        }
        round.finalize(rule, closed_at);
        let closed = round.clone();
        state.closed.push(round_id);
        if state.open == Some(round_id) {
            state.open = None;
        }
        Ok(closed)
    }

    fn list_closed(&self, limit: usize) -> Result<Vec<Round>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .closed
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| state.rounds.get(id).cloned())
            .collect())
    }

    fn get_round(&self, round_id: RoundId) -> Result<Option<Round>, StoreError> {
        Ok(self.lock()?.rounds.get(&round_id).cloned())
    }
}
