//! Trade feed module
//!
//! Live trade ticks from Binance WebSocket streams, one subscription per
//! symbol. Ticks that arrive while a subscription is down are lost for good;
//! there is no gap filling after a reconnect.

mod binance;
mod health;
mod listener;
mod types;

pub use binance::{BinanceFeed, BINANCE_WS_URL};
pub use health::{ConnectivityStatus, FeedHealth, SymbolHealth};
pub use listener::{FeedListener, ListenerHandle};
pub use types::{normalize_symbol, FeedEvent, FeedStatus, ParseError, Tick};

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Trait for trade feed implementations
#[async_trait]
pub trait TradeFeed: Send + Sync {
    /// Symbol this feed subscribes to
    fn symbol(&self) -> &str;

    /// Subscribe to trade events
    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<FeedEvent>>;
}

/// Destination for ticks coming off a feed
#[async_trait]
pub trait TickSink: Send + Sync {
    async fn record(&self, tick: Tick) -> anyhow::Result<()>;
}
