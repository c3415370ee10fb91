//! Ballot node: runs timed RED/GREEN voting rounds.
//!
//! The node is the central coordinator that:
//! - Opens the LMDB round store
//! - Runs the round scheduler (close at deadline, intermission, reopen)
//! - Serves the HTTP API and the live WebSocket stream
//! - Stops everything together on SIGINT/SIGTERM or a fatal scheduler error

pub mod config;
pub mod error;
pub mod logging;
pub mod node;
pub mod shutdown;

pub use config::NodeConfig;
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use node::BallotNode;
pub use shutdown::{ShutdownController, ShutdownReason};
