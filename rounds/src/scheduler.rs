//! The round lifecycle control loop.
//!
//! ```text
//! IDLE → RUNNING → ┌→ WAIT_FOR_DEADLINE → CLOSING → OPENING ─┐ → STOPPED
//!                  └────────────────────────────────────────┘
//! ```
//!
//! Exactly one scheduler runs per deployment. Stop requests are honoured
//! between phases only: while waiting for a deadline and during the
//! intermission, never in the middle of a close or an open.

use std::sync::Arc;
use std::time::Duration;

use ballot_store::{RoundStore, StoreError};
use ballot_types::{Clock, Round};
use ballot_websocket::{BroadcastHub, HubEvent};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::{RoundConfig, RoundMetrics, SchedulerError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    WaitForDeadline,
    Closing,
    Opening,
    Stopped,
}

impl SchedulerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::WaitForDeadline => "wait_for_deadline",
            Self::Closing => "closing",
            Self::Opening => "opening",
            Self::Stopped => "stopped",
        }
    }
}

/// Read side of the scheduler's state, cheap to clone.
#[derive(Clone)]
pub struct SchedulerHandle {
    state: watch::Receiver<SchedulerState>,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Wait until the scheduler reaches `target`.
    ///
    /// Returns `false` if the scheduler was dropped first.
    pub async fn wait_for(&mut self, target: SchedulerState) -> bool {
        self.state.wait_for(|s| *s == target).await.is_ok()
    }
}

/// Outcome of a cancellable wait.
enum Wait {
    Elapsed,
    Cancelled,
}

pub struct RoundScheduler {
    store: Arc<dyn RoundStore>,
    hub: Arc<BroadcastHub>,
    clock: Arc<dyn Clock>,
    metrics: Arc<RoundMetrics>,
    config: RoundConfig,
    state: watch::Sender<SchedulerState>,
}

impl RoundScheduler {
    pub fn new(
        store: Arc<dyn RoundStore>,
        hub: Arc<BroadcastHub>,
        clock: Arc<dyn Clock>,
        metrics: Arc<RoundMetrics>,
        config: RoundConfig,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            store,
            hub,
            clock,
            metrics,
            config,
            state,
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            state: self.state.subscribe(),
        }
    }

    /// Run rounds until `shutdown` fires or storage stays unavailable.
    ///
    /// A round left open by a stop is picked up by the next start.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), SchedulerError> {
        self.set_state(SchedulerState::Running);
        info!(
            round_duration_secs = self.config.round_duration_secs,
            intermission_ms = self.config.intermission.as_millis() as u64,
            rule = ?self.config.winner_rule,
            "round scheduler started"
        );

        let mut round = self
            .with_retry("starting", |store, clock| store.open_or_current(clock.now()))
            .await?;
        self.announce(&round);

        loop {
            self.set_state(SchedulerState::WaitForDeadline);
            if let Wait::Cancelled = self.wait_for_deadline(&round, &mut shutdown).await {
                break;
            }

            self.set_state(SchedulerState::Closing);
            let (id, rule) = (round.id, self.config.winner_rule);
            let closed = self
                .with_retry("closing", move |store, clock| store.close(id, rule, clock.now()))
                .await?;
            self.metrics.rounds_closed.inc();
            info!(
                round_id = %closed.id,
                red = closed.red_votes,
                green = closed.green_votes,
                winner = ?closed.winner,
                "round closed"
            );
            self.hub.publish(HubEvent::round_closed(&closed));

            self.set_state(SchedulerState::Opening);
            if let Wait::Cancelled = self.pause(self.config.intermission, &mut shutdown).await {
                break;
            }
            round = self
                .with_retry("opening", |store, clock| store.open_or_current(clock.now()))
                .await?;
            self.announce(&round);
        }

        self.set_state(SchedulerState::Stopped);
        info!("round scheduler stopped");
        Ok(())
    }

    fn announce(&self, round: &Round) {
        let remaining = round.seconds_remaining(self.config.round_duration_secs, self.clock.now());
        info!(
            round_id = %round.id,
            opened_at = %round.opened_at,
            votes = round.total_votes(),
            seconds_remaining = remaining,
            "round open"
        );
        self.hub.publish(HubEvent::round_started(round, remaining));
    }

    async fn wait_for_deadline(
        &self,
        round: &Round,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Wait {
        loop {
            let remaining =
                round.seconds_remaining(self.config.round_duration_secs, self.clock.now());
            if remaining == 0 {
                return Wait::Elapsed;
            }
            let nap = self.config.poll_interval.min(Duration::from_secs(remaining));
            if let Wait::Cancelled = self.pause(nap, shutdown).await {
                return Wait::Cancelled;
            }
        }
    }

    async fn pause(&self, duration: Duration, shutdown: &mut broadcast::Receiver<()>) -> Wait {
        tokio::select! {
            // A dropped controller counts as a stop request.
            _ = shutdown.recv() => Wait::Cancelled,
            _ = tokio::time::sleep(duration) => Wait::Elapsed,
        }
    }

    /// Retry a storage step with exponential backoff.
    ///
    /// Each attempt runs on the blocking pool and reads the clock there, so a
    /// slow commit never holds up other tasks on the runtime. Stop requests
    /// are not observed here; a phase either completes or escalates.
    async fn with_retry<T, F>(&self, phase: &'static str, op: F) -> Result<T, SchedulerError>
    where
        T: Send + 'static,
        F: Fn(&dyn RoundStore, &dyn Clock) -> Result<T, StoreError> + Clone + Send + 'static,
    {
        let mut backoff = self.config.scheduler_backoff;
        let mut failures = 0u32;
        loop {
            let store = Arc::clone(&self.store);
            let clock = Arc::clone(&self.clock);
            let step = op.clone();
            let outcome = tokio::task::spawn_blocking(move || step(store.as_ref(), clock.as_ref()))
                .await
                .unwrap_or_else(|e| {
                    Err(StoreError::StorageUnavailable(format!("{phase} task failed: {e}")))
                });
            match outcome {
                Ok(value) => {
                    if failures > 0 {
                        info!(phase, failures, "storage recovered");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    failures += 1;
                    self.metrics.scheduler_failures.inc();
                    if failures >= self.config.scheduler_max_failures.max(1) {
                        error!(phase, failures, error = %e, "giving up on round lifecycle");
                        self.set_state(SchedulerState::Stopped);
                        return Err(SchedulerError::Fatal {
                            phase,
                            attempts: failures,
                            source: e,
                        });
                    }
                    warn!(
                        phase,
                        attempt = failures,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "storage step failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.config.scheduler_backoff_max);
                }
            }
        }
    }

    fn set_state(&self, state: SchedulerState) {
        debug!(state = state.as_str(), "scheduler state");
        self.state.send_replace(state);
    }
}
