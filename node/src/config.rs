//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ballot_rounds::RoundConfig;
use ballot_types::WinnerRule;

use crate::{LogFormat, NodeError};

/// Configuration for a ballot node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Directory holding the LMDB environment.
    pub data_dir: PathBuf,

    /// Address the HTTP API binds to.
    pub http_host: String,

    pub http_port: u16,

    /// Length of each voting round.
    pub round_duration_secs: u64,

    /// Pause between a close and the next open.
    pub intermission_secs: u64,

    /// Refuse votes once this few seconds remain (0 disables).
    pub voting_cutoff_secs: u64,

    /// How often the scheduler re-checks the deadline.
    pub poll_interval_ms: u64,

    /// Tie-breaking rule applied when a round closes.
    pub tie_policy: WinnerRule,

    /// Attempts a vote gets when rounds keep closing under it.
    pub vote_retry_attempts: u32,

    /// Consecutive storage failures before the scheduler stops the node.
    pub scheduler_max_failures: u32,

    pub scheduler_backoff_ms: u64,

    pub scheduler_backoff_max_ms: u64,

    /// Events buffered per WebSocket observer before it is evicted.
    pub subscriber_buffer: usize,

    /// Bound on a single WebSocket write.
    pub subscriber_send_timeout_ms: u64,

    pub lmdb_map_size_mb: usize,

    /// Log format: "human" or "json".
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./ballot_data"),
            http_host: "0.0.0.0".to_string(),
            http_port: 8000,
            round_duration_secs: 60,
            intermission_secs: 2,
            voting_cutoff_secs: 0,
            poll_interval_ms: 1_000,
            tie_policy: WinnerRule::StrictMajority,
            vote_retry_attempts: 3,
            scheduler_max_failures: 5,
            scheduler_backoff_ms: 500,
            scheduler_backoff_max_ms: 10_000,
            subscriber_buffer: 64,
            subscriber_send_timeout_ms: 5_000,
            lmdb_map_size_mb: 64,
            log_format: LogFormat::Human,
            log_level: "info".to_string(),
        }
    }
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Reject settings the round lifecycle cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        let positive = [
            ("round_duration_secs", self.round_duration_secs),
            ("intermission_secs", self.intermission_secs),
            ("poll_interval_ms", self.poll_interval_ms),
            ("vote_retry_attempts", u64::from(self.vote_retry_attempts)),
            ("scheduler_max_failures", u64::from(self.scheduler_max_failures)),
            ("scheduler_backoff_ms", self.scheduler_backoff_ms),
            ("subscriber_buffer", self.subscriber_buffer as u64),
            ("subscriber_send_timeout_ms", self.subscriber_send_timeout_ms),
            ("lmdb_map_size_mb", self.lmdb_map_size_mb as u64),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(NodeError::Config(format!("{name} must be greater than zero")));
        }
        if self.voting_cutoff_secs >= self.round_duration_secs {
            return Err(NodeError::Config(format!(
                "voting_cutoff_secs ({}) must be shorter than round_duration_secs ({})",
                self.voting_cutoff_secs, self.round_duration_secs
            )));
        }
        if self.scheduler_backoff_max_ms < self.scheduler_backoff_ms {
            return Err(NodeError::Config(
                "scheduler_backoff_max_ms must not be below scheduler_backoff_ms".to_string(),
            ));
        }
        if self.http_host.trim().is_empty() {
            return Err(NodeError::Config("http_host must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    pub fn lmdb_map_size(&self) -> usize {
        self.lmdb_map_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.subscriber_send_timeout_ms)
    }

    /// Timing and retry settings for the aggregator and the scheduler.
    pub fn round_config(&self) -> RoundConfig {
        RoundConfig {
            round_duration_secs: self.round_duration_secs,
            intermission: Duration::from_secs(self.intermission_secs),
            voting_cutoff_secs: self.voting_cutoff_secs,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            winner_rule: self.tie_policy,
            vote_retry_attempts: self.vote_retry_attempts,
            scheduler_max_failures: self.scheduler_max_failures,
            scheduler_backoff: Duration::from_millis(self.scheduler_backoff_ms),
            scheduler_backoff_max: Duration::from_millis(self.scheduler_backoff_max_ms),
        }
    }
}
