//! Reconnecting WebSocket transport used by the trade feeds
//!
//! [`WsClient`] owns one connection at a time and hands text frames to the
//! caller over a channel. Connection loss is retried on the schedule in
//! [`BackoffPolicy`]; the transitions themselves live in [`ReconnectMachine`].

mod client;
mod reconnect;
mod types;

pub use client::WsClient;
pub use reconnect::{BackoffPolicy, ConnectionEvent, ConnectionState, ReconnectMachine};
pub use types::{WsConfig, WsError, WsMessage};
