//! Vote intake.

use std::sync::Arc;
use std::time::Instant;

use ballot_store::{RoundStore, StoreError};
use ballot_types::{Clock, Color, Round, Snapshot};
use ballot_websocket::{BroadcastHub, HubEvent, SnapshotSource};
use tracing::{debug, info, warn};

use crate::{RoundConfig, RoundMetrics, VoteError};

/// Applies votes to the open round and answers status and history reads.
///
/// The aggregator never decides which round a vote belongs to on its own: it
/// reads the open round, then asks the store to increment that round only if
/// it is still open. A round closed in between surfaces as
/// [`StoreError::RoundClosedConflict`] and the vote is retried against the
/// next round.
pub struct VoteAggregator {
    store: Arc<dyn RoundStore>,
    hub: Arc<BroadcastHub>,
    clock: Arc<dyn Clock>,
    metrics: Arc<RoundMetrics>,
    config: RoundConfig,
}

impl VoteAggregator {
    pub fn new(
        store: Arc<dyn RoundStore>,
        hub: Arc<BroadcastHub>,
        clock: Arc<dyn Clock>,
        metrics: Arc<RoundMetrics>,
        config: RoundConfig,
    ) -> Self {
        Self {
            store,
            hub,
            clock,
            metrics,
            config,
        }
    }

    /// Count one vote for `option` ("red" or "green", any case).
    ///
    /// Returns the post-increment counters of the round that received it.
    pub fn cast_vote(&self, option: &str) -> Result<Snapshot, VoteError> {
        let started = Instant::now();
        let color: Color = option.parse().inspect_err(|_| {
            self.metrics.votes_rejected.inc();
        })?;

        let snapshot = self.apply(color)?;

        self.metrics.record_accepted(color);
        self.metrics
            .vote_latency_ms
            .observe(started.elapsed().as_secs_f64() * 1_000.0);
        self.hub.publish(HubEvent::vote_update(snapshot));
        Ok(snapshot)
    }

    fn apply(&self, color: Color) -> Result<Snapshot, VoteError> {
        let attempts = self.config.vote_retry_attempts.max(1);
        for attempt in 1..=attempts {
            let Some(round) = self.current_round()? else {
                continue;
            };

            let seconds_remaining = self.seconds_remaining(&round);
            let cutoff = self.config.voting_cutoff_secs;
            if cutoff > 0 && seconds_remaining <= cutoff {
                self.metrics.votes_rejected.inc();
                return Err(VoteError::VotingCutoff {
                    seconds_remaining,
                    cutoff_secs: cutoff,
                });
            }

            match self.store.increment(round.id, color) {
                Ok(tally) => return Ok(Snapshot::from_tally(tally, seconds_remaining)),
                Err(StoreError::RoundClosedConflict(id)) => {
                    self.metrics.boundary_retries.inc();
                    debug!(round_id = %id, attempt, %color, "round closed under vote, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.metrics.votes_dropped.inc();
        warn!(attempts, %color, "vote dropped at round boundary");
        Err(VoteError::VoteDropped { attempts })
    }

    /// The open round, opening one if the scheduler has not yet.
    ///
    /// `None` means a concurrent creator won and already lost its round to a
    /// close; the caller retries.
    fn current_round(&self) -> Result<Option<Round>, VoteError> {
        if let Some(round) = self.store.get_open_round()? {
            return Ok(Some(round));
        }
        match self.store.open_or_current(self.clock.now()) {
            Ok(round) => {
                info!(round_id = %round.id, "round opened by incoming vote");
                Ok(Some(round))
            }
            Err(e) if e.is_conflict() => {
                self.metrics.boundary_retries.inc();
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Counters of the open round, or the idle snapshot when none is open.
    pub fn get_status(&self) -> Result<Snapshot, VoteError> {
        Ok(match self.store.get_open_round()? {
            Some(round) => Snapshot::from_tally(round.tally(), self.seconds_remaining(&round)),
            None => Snapshot::idle(),
        })
    }

    /// Closed rounds, newest first.
    pub fn history(&self, limit: usize) -> Result<Vec<Round>, VoteError> {
        Ok(self.store.list_closed(limit)?)
    }

    pub fn latest(&self) -> Result<Option<Round>, VoteError> {
        Ok(self.store.latest_closed()?)
    }

    fn seconds_remaining(&self, round: &Round) -> u64 {
        round.seconds_remaining(self.config.round_duration_secs, self.clock.now())
    }
}

impl SnapshotSource for VoteAggregator {
    fn snapshot(&self) -> Option<Snapshot> {
        self.get_status()
            .inspect_err(|e| warn!(error = %e, "status unavailable for new observer"))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_nullables::{NullClock, NullRoundStore};
    use ballot_types::{RoundId, Tally, Timestamp, Winner, WinnerRule};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Harness {
        store: Arc<NullRoundStore>,
        clock: Arc<NullClock>,
        hub: Arc<BroadcastHub>,
        metrics: Arc<RoundMetrics>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: Arc::new(NullRoundStore::new()),
                clock: Arc::new(NullClock::new(1_000)),
                hub: Arc::new(BroadcastHub::default()),
                metrics: Arc::new(RoundMetrics::new().unwrap()),
            }
        }

        fn aggregator(&self, config: RoundConfig) -> VoteAggregator {
            self.aggregator_over(self.store.clone(), config)
        }

        fn aggregator_over(&self, store: Arc<dyn RoundStore>, config: RoundConfig) -> VoteAggregator {
            VoteAggregator::new(
                store,
                self.hub.clone(),
                self.clock.clone(),
                self.metrics.clone(),
                config,
            )
        }
    }

    #[test]
    fn invalid_option_is_rejected_without_touching_the_store() {
        let h = Harness::new();
        let aggregator = h.aggregator(RoundConfig::default());

        let err = aggregator.cast_vote("blue").unwrap_err();
        assert!(matches!(err, VoteError::InvalidVote(_)));
        assert!(h.store.get_open_round().unwrap().is_none());
        assert_eq!(h.metrics.votes_rejected.get(), 1);
    }

    #[test]
    fn first_vote_opens_a_round() {
        let h = Harness::new();
        let aggregator = h.aggregator(RoundConfig::default());

        let snapshot = aggregator.cast_vote("GREEN").unwrap();
        assert_eq!(snapshot.green_votes, 1);
        assert_eq!(snapshot.red_votes, 0);
        assert_eq!(snapshot.seconds_remaining, 60);

        let round = h.store.get_open_round().unwrap().unwrap();
        assert_eq!(Some(round.id), snapshot.round_id);
        assert_eq!(round.opened_at, Timestamp::new(1_000));
    }

    #[test]
    fn votes_accumulate_on_the_open_round() {
        let h = Harness::new();
        let aggregator = h.aggregator(RoundConfig::default());
        h.store.create_round(Timestamp::new(1_000)).unwrap();

        aggregator.cast_vote("red").unwrap();
        h.clock.advance(15);
        aggregator.cast_vote("red").unwrap();
        let snapshot = aggregator.cast_vote(" Green ").unwrap();

        assert_eq!((snapshot.red_votes, snapshot.green_votes), (2, 1));
        assert_eq!(snapshot.seconds_remaining, 45);
        assert_eq!(aggregator.get_status().unwrap(), snapshot);
        assert_eq!(
            h.metrics.votes_accepted.with_label_values(&["red"]).get(),
            2
        );
    }

    #[test]
    fn status_is_idle_without_an_open_round() {
        let h = Harness::new();
        let aggregator = h.aggregator(RoundConfig::default());
        assert_eq!(aggregator.get_status().unwrap(), Snapshot::idle());
        assert_eq!(aggregator.snapshot(), Some(Snapshot::idle()));
    }

    #[test]
    fn cutoff_refuses_late_votes() {
        let h = Harness::new();
        let aggregator = h.aggregator(RoundConfig {
            voting_cutoff_secs: 5,
            ..RoundConfig::default()
        });
        h.store.create_round(Timestamp::new(1_000)).unwrap();

        h.clock.set(1_054);
        aggregator.cast_vote("red").unwrap();

        h.clock.set(1_055);
        let err = aggregator.cast_vote("red").unwrap_err();
        assert!(matches!(
            err,
            VoteError::VotingCutoff {
                seconds_remaining: 5,
                cutoff_secs: 5
            }
        ));
        assert_eq!(h.store.get_open_round().unwrap().unwrap().red_votes, 1);
    }

    #[test]
    fn zero_cutoff_accepts_until_the_round_closes() {
        let h = Harness::new();
        let aggregator = h.aggregator(RoundConfig::default());
        h.store.create_round(Timestamp::new(1_000)).unwrap();

        h.clock.set(1_070);
        let snapshot = aggregator.cast_vote("red").unwrap();
        assert_eq!(snapshot.seconds_remaining, 0);
        assert_eq!(snapshot.red_votes, 1);
    }

    #[test]
    fn accepted_votes_are_published() {
        let h = Harness::new();
        let aggregator = h.aggregator(RoundConfig::default());
        let mut sub = h.hub.subscribe();

        let snapshot = aggregator.cast_vote("red").unwrap();

        let event = sub.events.try_recv().unwrap();
        assert_eq!(*event, HubEvent::vote_update(snapshot));
    }

    #[test]
    fn rejected_votes_are_not_published() {
        let h = Harness::new();
        let aggregator = h.aggregator(RoundConfig::default());
        let mut sub = h.hub.subscribe();

        aggregator.cast_vote("purple").unwrap_err();
        assert!(sub.events.try_recv().is_err());
    }

    #[test]
    fn history_returns_closed_rounds_newest_first() {
        let h = Harness::new();
        let aggregator = h.aggregator(RoundConfig::default());

        for _ in 0..3 {
            aggregator.cast_vote("green").unwrap();
            let open = h.store.get_open_round().unwrap().unwrap();
            h.store
                .close(open.id, WinnerRule::StrictMajority, h.clock.now())
                .unwrap();
        }

        let history = aggregator.history(2).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].id > history[1].id);
        assert_eq!(aggregator.latest().unwrap().unwrap().id, history[0].id);
        assert_eq!(history[0].winner, Some(Winner::Green));
    }

    /// Closes the round the vote is aimed at and opens the next one just
    /// before the increment lands, `races` times.
    struct RacingStore {
        inner: NullRoundStore,
        races: AtomicU32,
    }

    impl RacingStore {
        fn new(races: u32) -> Self {
            Self {
                inner: NullRoundStore::new(),
                races: AtomicU32::new(races),
            }
        }
    }

    impl RoundStore for RacingStore {
        fn get_open_round(&self) -> Result<Option<Round>, StoreError> {
            self.inner.get_open_round()
        }

        fn create_round(&self, opened_at: Timestamp) -> Result<Round, StoreError> {
            self.inner.create_round(opened_at)
        }

        fn increment(&self, round_id: RoundId, color: Color) -> Result<Tally, StoreError> {
            let racing = self
                .races
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if racing {
                let now = Timestamp::new(2_000);
                self.inner.close(round_id, WinnerRule::StrictMajority, now)?;
                self.inner.create_round(now)?;
            }
            self.inner.increment(round_id, color)
        }

        fn close(
            &self,
            round_id: RoundId,
            rule: WinnerRule,
            closed_at: Timestamp,
        ) -> Result<Round, StoreError> {
            self.inner.close(round_id, rule, closed_at)
        }

        fn list_closed(&self, limit: usize) -> Result<Vec<Round>, StoreError> {
            self.inner.list_closed(limit)
        }

        fn get_round(&self, round_id: RoundId) -> Result<Option<Round>, StoreError> {
            self.inner.get_round(round_id)
        }
    }

    #[test]
    fn vote_lost_to_a_close_lands_in_the_next_round() {
        let h = Harness::new();
        let store = Arc::new(RacingStore::new(1));
        let first = store.create_round(Timestamp::new(1_000)).unwrap();
        let aggregator = h.aggregator_over(store.clone(), RoundConfig::default());

        let snapshot = aggregator.cast_vote("red").unwrap();

        let closed = store.get_round(first.id).unwrap().unwrap();
        assert_eq!(closed.total_votes(), 0);
        assert_ne!(snapshot.round_id, Some(first.id));
        assert_eq!(snapshot.red_votes, 1);
        assert_eq!(h.metrics.boundary_retries.get(), 1);
    }

    #[test]
    fn vote_is_dropped_after_exhausting_retries() {
        let h = Harness::new();
        let store = Arc::new(RacingStore::new(u32::MAX));
        store.create_round(Timestamp::new(1_000)).unwrap();
        let aggregator = h.aggregator_over(
            store.clone(),
            RoundConfig {
                vote_retry_attempts: 3,
                ..RoundConfig::default()
            },
        );

        let err = aggregator.cast_vote("green").unwrap_err();
        assert!(matches!(err, VoteError::VoteDropped { attempts: 3 }));
        assert_eq!(h.metrics.votes_dropped.get(), 1);
        let counted: u64 = store
            .list_closed(10)
            .unwrap()
            .iter()
            .map(Round::total_votes)
            .sum();
        assert_eq!(counted, 0);
    }

    #[test]
    fn storage_outage_is_reported_not_retried() {
        let h = Harness::new();
        let aggregator = h.aggregator(RoundConfig::default());
        h.store.set_unavailable(true);

        let err = aggregator.cast_vote("red").unwrap_err();
        assert!(matches!(
            err,
            VoteError::Store(StoreError::StorageUnavailable(_))
        ));
        assert_eq!(h.metrics.boundary_retries.get(), 0);
        assert_eq!(aggregator.snapshot(), None);
    }
}
