//! HTTP API for the ballot node.
//!
//! Provides endpoints for:
//! - Casting a vote and reading the open round
//! - The live event stream (WebSocket)
//! - Closed-round history
//! - Health and Prometheus metrics

pub mod error;
pub mod handlers;
pub mod pagination;
pub mod server;

pub use error::RpcError;
pub use handlers::{HistoryEntry, VoteRequest};
pub use server::{build_router, RpcState};
