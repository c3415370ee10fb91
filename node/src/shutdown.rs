//! Stop coordination for the ballot node.
//!
//! The first trigger wins: it records why the node is stopping and wakes
//! every subscriber (the round scheduler and the HTTP server). Later triggers
//! are ignored, so a signal arriving while the scheduler is already winding
//! down does not change the recorded reason.

use std::fmt;
use std::sync::OnceLock;

use tokio::signal;
use tokio::sync::broadcast;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
    /// Asked for by the embedding program or a test.
    Requested,
    /// The round scheduler exited on its own.
    SchedulerStopped,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
            Self::Requested => "requested",
            Self::SchedulerStopped => "scheduler stopped",
        })
    }
}

pub struct ShutdownController {
    tx: broadcast::Sender<()>,
    reason: OnceLock<ShutdownReason>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            reason: OnceLock::new(),
        }
    }

    /// A receiver woken by the first trigger. Dropping the controller also
    /// wakes it, with an error.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Start stopping the node. Returns `false` if a stop was already under way.
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        if self.reason.set(reason).is_err() {
            tracing::debug!(%reason, "shutdown already triggered");
            return false;
        }
        tracing::info!(%reason, "shutting down");
        let _ = self.tx.send(());
        true
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.get().copied()
    }

    /// Trigger on the first SIGINT or SIGTERM.
    ///
    /// A signal whose handler cannot be installed is logged and never fires.
    pub async fn wait_for_signal(&self) {
        let interrupt = async {
            match signal::ctrl_c().await {
                Ok(()) => ShutdownReason::Interrupt,
                Err(e) => {
                    tracing::warn!(error = %e, "SIGINT handler unavailable");
                    std::future::pending().await
                }
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    ShutdownReason::Terminate
                }
                Err(e) => {
                    tracing::warn!(error = %e, "SIGTERM handler unavailable");
                    std::future::pending().await
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<ShutdownReason>();

        let reason = tokio::select! {
            reason = interrupt => reason,
            reason = terminate => reason,
        };
        self.trigger(reason);
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}
