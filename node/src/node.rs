//! The ballot node: wires storage, the scheduler and the HTTP API together.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use ballot_rounds::{RoundMetrics, RoundScheduler, RuntimeClock, SchedulerHandle, VoteAggregator};
use ballot_rpc::{build_router, RpcState};
use ballot_store::RoundStore;
use ballot_store_lmdb::LmdbEnvironment;
use ballot_types::Clock;
use ballot_websocket::BroadcastHub;
use tokio::net::TcpListener;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::shutdown::{ShutdownController, ShutdownReason};

/// Timeout for the HTTP server to drain once the scheduler has stopped.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct BallotNode {
    config: NodeConfig,
    /// `None` when running over an injected store.
    env: Option<LmdbEnvironment>,
    hub: Arc<BroadcastHub>,
    metrics: Arc<RoundMetrics>,
    aggregator: Arc<VoteAggregator>,
    scheduler: RoundScheduler,
    scheduler_handle: SchedulerHandle,
    shutdown: Arc<ShutdownController>,
}

impl BallotNode {
    /// Validate `config` and open the LMDB environment under `data_dir`.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;
        let env = LmdbEnvironment::open(&config.data_dir, config.lmdb_map_size())?;
        let store: Arc<dyn RoundStore> = Arc::new(env.round_store());
        let mut node = Self::with_store(config, store, Arc::new(RuntimeClock::new()))?;
        node.env = Some(env);
        Ok(node)
    }

    /// Build a node over an existing store and clock.
    pub fn with_store(
        config: NodeConfig,
        store: Arc<dyn RoundStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let rounds = config.round_config();
        let hub = Arc::new(BroadcastHub::new(config.subscriber_buffer));
        let metrics = Arc::new(RoundMetrics::new()?);
        let aggregator = Arc::new(VoteAggregator::new(
            store.clone(),
            hub.clone(),
            clock.clone(),
            metrics.clone(),
            rounds.clone(),
        ));
        let scheduler = RoundScheduler::new(store, hub.clone(), clock, metrics.clone(), rounds);
        let scheduler_handle = scheduler.handle();

        Ok(Self {
            config,
            env: None,
            hub,
            metrics,
            aggregator,
            scheduler,
            scheduler_handle,
            shutdown: Arc::new(ShutdownController::new()),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        self.shutdown.clone()
    }

    pub fn scheduler(&self) -> SchedulerHandle {
        self.scheduler_handle.clone()
    }

    /// The HTTP API backed by this node's aggregator and hub.
    pub fn router(&self) -> Router {
        build_router(Arc::new(RpcState {
            aggregator: self.aggregator.clone(),
            hub: self.hub.clone(),
            metrics: self.metrics.clone(),
            scheduler: self.scheduler_handle.clone(),
            send_timeout: self.config.send_timeout(),
        }))
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(self) -> Result<(), NodeError> {
        let listener = TcpListener::bind(self.config.http_addr()).await?;
        self.serve(listener).await
    }

    /// Run the scheduler and serve HTTP on `listener`.
    ///
    /// Returns once the scheduler stops: cleanly after a shutdown signal, or
    /// with [`NodeError::Scheduler`] when storage stayed unavailable. Either
    /// way the HTTP server is shut down too.
    pub async fn serve(self, listener: TcpListener) -> Result<(), NodeError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            %addr,
            data_dir = %self.config.data_dir.display(),
            round_duration_secs = self.config.round_duration_secs,
            intermission_secs = self.config.intermission_secs,
            "ballot node starting"
        );

        let router = self.router();
        let mut http_shutdown = self.shutdown.subscribe();
        let http = tokio::spawn(
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = http_shutdown.recv().await;
                })
                .into_future(),
        );

        let scheduler = tokio::spawn(self.scheduler.run(self.shutdown.subscribe()));
        let outcome = match scheduler.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "round scheduler failed, stopping node");
                Err(NodeError::Scheduler(e))
            }
            Err(e) => Err(NodeError::Task(e.to_string())),
        };

        self.shutdown.trigger(ShutdownReason::SchedulerStopped);
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, http).await {
            Ok(Ok(Ok(()))) => tracing::info!("HTTP server stopped"),
            Ok(Ok(Err(e))) => tracing::warn!(error = %e, "HTTP server exited with error"),
            Ok(Err(e)) => tracing::warn!(error = %e, "HTTP server task failed"),
            Err(_) => tracing::warn!(
                "shutdown timeout ({:?}), open connections dropped",
                SHUTDOWN_TIMEOUT
            ),
        }

        if let Some(env) = &self.env {
            match env.env().force_sync() {
                Ok(()) => tracing::info!("LMDB flushed to disk"),
                Err(e) => tracing::warn!("LMDB force_sync failed: {e}"),
            }
        }

        tracing::info!(reason = ?self.shutdown.reason(), "ballot node stopped");
        outcome
    }
}
