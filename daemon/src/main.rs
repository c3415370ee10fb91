//! Ballot daemon: entry point for running a ballot node.

use anyhow::Context;
use ballot_node::{init_logging, BallotNode, LogFormat, NodeConfig};
use ballot_types::WinnerRule;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ballot-daemon", version, about = "Timed RED/GREEN voting rounds")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "BALLOT_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for the LMDB round store.
    #[arg(long, env = "BALLOT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Address the HTTP API binds to.
    #[arg(long, env = "BALLOT_HTTP_HOST")]
    http_host: Option<String>,

    #[arg(long, env = "BALLOT_HTTP_PORT")]
    http_port: Option<u16>,

    /// Length of each voting round, in seconds.
    #[arg(long, env = "BALLOT_ROUND_DURATION_SECS")]
    round_duration_secs: Option<u64>,

    /// Pause between rounds, in seconds.
    #[arg(long, env = "BALLOT_INTERMISSION_SECS")]
    intermission_secs: Option<u64>,

    /// Refuse votes once this few seconds remain (0 disables).
    #[arg(long, env = "BALLOT_VOTING_CUTOFF_SECS")]
    voting_cutoff_secs: Option<u64>,

    /// How ties are decided when a round closes.
    #[arg(long, value_enum, env = "BALLOT_TIE_POLICY")]
    tie_policy: Option<TiePolicy>,

    /// Log format.
    #[arg(long, value_enum, env = "BALLOT_LOG_FORMAT")]
    log_format: Option<LogFormatArg>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "BALLOT_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the node until SIGINT/SIGTERM.
    Run,
    /// Print the effective configuration as TOML and exit.
    PrintConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum TiePolicy {
    StrictMajority,
    GreenWinsTies,
}

impl From<TiePolicy> for WinnerRule {
    fn from(policy: TiePolicy) -> Self {
        match policy {
            TiePolicy::StrictMajority => WinnerRule::StrictMajority,
            TiePolicy::GreenWinsTies => WinnerRule::GreenWinsTies,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Human,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(format: LogFormatArg) -> Self {
        match format {
            LogFormatArg::Human => LogFormat::Human,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

impl Cli {
    /// Defaults, then the config file, then flags and `BALLOT_*` env vars.
    fn resolve_config(&self) -> anyhow::Result<NodeConfig> {
        let base = match &self.config {
            Some(path) => NodeConfig::from_toml_file(path)
                .with_context(|| format!("loading config file {}", path.display()))?,
            None => NodeConfig::default(),
        };

        let config = NodeConfig {
            data_dir: self.data_dir.clone().unwrap_or(base.data_dir),
            http_host: self.http_host.clone().unwrap_or(base.http_host),
            http_port: self.http_port.unwrap_or(base.http_port),
            round_duration_secs: self.round_duration_secs.unwrap_or(base.round_duration_secs),
            intermission_secs: self.intermission_secs.unwrap_or(base.intermission_secs),
            voting_cutoff_secs: self.voting_cutoff_secs.unwrap_or(base.voting_cutoff_secs),
            tie_policy: self.tie_policy.map(Into::into).unwrap_or(base.tie_policy),
            log_format: self.log_format.map(Into::into).unwrap_or(base.log_format),
            log_level: self.log_level.clone().unwrap_or(base.log_level),
            ..base
        };
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    match cli.command {
        Command::PrintConfig => {
            print!("{}", config.to_toml_string()?);
        }
        Command::Run => {
            init_logging(config.log_format, &config.log_level)?;
            if let Some(path) = &cli.config {
                tracing::info!(path = %path.display(), "loaded config file");
            }
            tracing::info!(
                "Starting ballot node on {} (rounds of {}s, {}s intermission, {:?})",
                config.http_addr(),
                config.round_duration_secs,
                config.intermission_secs,
                config.tie_policy,
            );

            let node = BallotNode::new(config).context("opening node")?;
            let shutdown = node.shutdown_controller();
            tokio::spawn(async move { shutdown.wait_for_signal().await });

            node.run().await.context("ballot node stopped with an error")?;
            tracing::info!("ballot daemon exited cleanly");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "ballot-daemon",
            "--http-port",
            "9100",
            "--round-duration-secs",
            "30",
            "--tie-policy",
            "green-wins-ties",
            "run",
        ])
        .unwrap();
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.http_port, 9100);
        assert_eq!(config.round_duration_secs, 30);
        assert_eq!(config.tie_policy, WinnerRule::GreenWinsTies);
        assert_eq!(config.intermission_secs, 2);
    }

    #[test]
    fn invalid_combination_is_rejected() {
        let cli = Cli::try_parse_from([
            "ballot-daemon",
            "--round-duration-secs",
            "10",
            "--voting-cutoff-secs",
            "10",
            "print-config",
        ])
        .unwrap();
        assert!(cli.resolve_config().is_err());
    }
}
