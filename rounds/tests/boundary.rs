//! Concurrent voters against LMDB while rounds close underneath them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use ballot_rounds::{RoundConfig, RoundMetrics, VoteAggregator, VoteError};
use ballot_store::RoundStore;
use ballot_store_lmdb::LmdbEnvironment;
use ballot_types::{Round, SystemClock, Timestamp, WinnerRule};
use ballot_websocket::BroadcastHub;
use proptest::prelude::*;

const MAP_SIZE: usize = 16 * 1024 * 1024;

fn aggregator(store: Arc<dyn RoundStore>, config: RoundConfig) -> VoteAggregator {
    VoteAggregator::new(
        store,
        Arc::new(BroadcastHub::default()),
        Arc::new(SystemClock),
        Arc::new(RoundMetrics::new().unwrap()),
        config,
    )
}

fn counted(store: &dyn RoundStore) -> u64 {
    let mut total: u64 = store
        .list_closed(usize::MAX)
        .unwrap()
        .iter()
        .map(Round::total_votes)
        .sum();
    if let Some(open) = store.get_open_round().unwrap() {
        total += open.total_votes();
    }
    total
}

#[test]
fn concurrent_votes_are_all_counted() {
    let dir = tempfile::tempdir().unwrap();
    let env = LmdbEnvironment::open(dir.path(), MAP_SIZE).unwrap();
    let store: Arc<dyn RoundStore> = Arc::new(env.round_store());
    let aggregator = aggregator(store.clone(), RoundConfig::default());

    std::thread::scope(|s| {
        for t in 0..8 {
            let aggregator = &aggregator;
            s.spawn(move || {
                for i in 0..25 {
                    let option = if (t + i) % 3 == 0 { "green" } else { "red" };
                    aggregator.cast_vote(option).unwrap();
                }
            });
        }
    });

    let open = store.get_open_round().unwrap().unwrap();
    assert_eq!(open.total_votes(), 200);
    assert!(store.list_closed(10).unwrap().is_empty());
}

#[test]
fn every_accepted_vote_is_counted_exactly_once_across_closes() {
    let dir = tempfile::tempdir().unwrap();
    let env = LmdbEnvironment::open(dir.path(), MAP_SIZE).unwrap();
    let store: Arc<dyn RoundStore> = Arc::new(env.round_store());
    let aggregator = aggregator(
        store.clone(),
        RoundConfig {
            vote_retry_attempts: 10,
            ..RoundConfig::default()
        },
    );
    let accepted = AtomicU64::new(0);
    let dropped = AtomicU64::new(0);
    let voting = AtomicBool::new(true);

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                while voting.load(Ordering::SeqCst) {
                    match aggregator.cast_vote("red") {
                        Ok(_) => accepted.fetch_add(1, Ordering::SeqCst),
                        Err(VoteError::VoteDropped { .. }) => dropped.fetch_add(1, Ordering::SeqCst),
                        Err(e) => panic!("unexpected vote error: {e}"),
                    };
                }
            });
        }

        // Play the scheduler: close whatever is open, then open the next one.
        for _ in 0..20 {
            let round = store.open_or_current(Timestamp::now()).unwrap();
            std::thread::yield_now();
            store
                .close(round.id, WinnerRule::StrictMajority, Timestamp::now())
                .unwrap();
        }
        voting.store(false, Ordering::SeqCst);
    });

    assert_eq!(counted(store.as_ref()), accepted.load(Ordering::SeqCst));
    let closed = store.list_closed(usize::MAX).unwrap();
    assert!(closed.len() >= 20);
    assert!(closed.iter().all(|r| !r.is_open() && r.winner.is_some()));
    assert!(closed.windows(2).all(|w| w[0].id > w[1].id));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn tallies_match_the_votes_cast(options in prop::collection::vec(
        prop_oneof![Just("red"), Just("green"), Just("RED"), Just("Green"), Just("blue")],
        0..60,
    )) {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), MAP_SIZE).unwrap();
        let store: Arc<dyn RoundStore> = Arc::new(env.round_store());
        let aggregator = aggregator(store.clone(), RoundConfig::default());

        let mut expected = (0u64, 0u64);
        for option in &options {
            match aggregator.cast_vote(option) {
                Ok(_) if option.eq_ignore_ascii_case("red") => expected.0 += 1,
                Ok(_) => expected.1 += 1,
                Err(VoteError::InvalidVote(_)) => prop_assert_eq!(*option, "blue"),
                Err(e) => return Err(TestCaseError::fail(e.to_string())),
            }
        }

        let status = aggregator.get_status().unwrap();
        prop_assert_eq!((status.red_votes, status.green_votes), expected);
    }
}
