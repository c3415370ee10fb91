//! Live fan-out of round events to connected observers.
//!
//! - [`BroadcastHub`] keeps the subscriber set and delivers every published
//!   event to each subscriber's bounded queue without ever waiting on one.
//! - [`server`] attaches the hub to an axum WebSocket route; each connection
//!   is one subscription.

pub mod events;
pub mod hub;
pub mod server;

pub use events::{ClientMessage, HubEvent, ServerMessage};
pub use hub::{BroadcastHub, DeliveryFailure, SubscriberId, Subscription};
pub use server::{router, SnapshotSource, WsState};
