//! Binance WebSocket trade feed implementation

use super::types::{FeedEvent, FeedStatus, ParseError, Tick};
use super::TradeFeed;
use crate::ws::{WsClient, WsConfig, WsMessage};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use tokio::sync::mpsc;

/// Binance USD-M futures WebSocket base URL
pub const BINANCE_WS_URL: &str = "wss://fstream.binance.com/ws";

/// Binance trade message structure
#[derive(Debug, Deserialize)]
struct BinanceTradeMessage {
    /// Event type; absent on control frames such as subscription acks
    #[serde(rename = "e", default)]
    event_type: String,
    /// Event time (milliseconds)
    #[serde(rename = "E")]
    event_time: Option<i64>,
    /// Symbol
    #[serde(rename = "s")]
    symbol: Option<String>,
    /// Price
    #[serde(rename = "p")]
    price: Option<String>,
    /// Quantity
    #[serde(rename = "q")]
    quantity: Option<String>,
    /// Trade time (milliseconds)
    #[serde(rename = "T")]
    trade_time: Option<i64>,
}

/// Binance WebSocket feed for a single `<symbol>@trade` stream
pub struct BinanceFeed {
    symbol: String,
    ws_config: WsConfig,
}

impl BinanceFeed {
    /// Create a new Binance feed for the given symbol on the default endpoint
    pub fn new(symbol: impl Into<String>) -> Self {
        Self::with_config(symbol, BINANCE_WS_URL, WsConfig::default())
    }

    /// Create a feed against `base_url` with explicit reconnect settings
    ///
    /// The URL inside `ws_config` is replaced by the trade stream URL.
    pub fn with_config(symbol: impl Into<String>, base_url: &str, ws_config: WsConfig) -> Self {
        let symbol = symbol.into().to_lowercase();
        let url = format!("{}/{}@trade", base_url.trim_end_matches('/'), symbol);
        Self {
            symbol,
            ws_config: WsConfig { url, ..ws_config },
        }
    }

    /// Stream URL
    pub fn url(&self) -> &str {
        &self.ws_config.url
    }

    /// Parse a Binance trade message
    ///
    /// Returns `Ok(None)` for well-formed events that are not trades.
    pub fn parse_message(msg: &str) -> Result<Option<Tick>, ParseError> {
        let trade: BinanceTradeMessage =
            serde_json::from_str(msg).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

        if trade.event_type != "trade" {
            return Ok(None);
        }

        let symbol = trade.symbol.ok_or(ParseError::MissingField("s"))?;
        let price = parse_number("price", trade.price.as_deref().ok_or(ParseError::MissingField("p"))?)?;
        let size = parse_number("quantity", trade.quantity.as_deref().ok_or(ParseError::MissingField("q"))?)?;

        if price <= 0.0 {
            return Err(ParseError::InvalidNumber {
                field: "price",
                value: price.to_string(),
            });
        }
        if size < 0.0 {
            return Err(ParseError::InvalidNumber {
                field: "quantity",
                value: size.to_string(),
            });
        }

        let millis = trade
            .trade_time
            .or(trade.event_time)
            .ok_or(ParseError::MissingField("T"))?;
        let timestamp = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or(ParseError::InvalidTimestamp(millis))?;

        Ok(Some(Tick::new(&symbol, price, size, timestamp)))
    }

    /// Translate raw socket messages into feed events
    async fn run_message_loop(
        symbol: String,
        mut ws_rx: mpsc::Receiver<WsMessage>,
        event_tx: mpsc::Sender<FeedEvent>,
    ) {
        while let Some(msg) = ws_rx.recv().await {
            let event = match msg {
                WsMessage::Text(text) => match Self::parse_message(&text) {
                    Ok(Some(tick)) => FeedEvent::Tick(tick),
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::warn!(symbol = %symbol, error = %e, "Dropping malformed message");
                        FeedEvent::Rejected(e)
                    }
                },
                WsMessage::Connected => {
                    tracing::info!(symbol = %symbol, "Binance feed subscribed");
                    FeedEvent::Status(FeedStatus::Subscribed)
                }
                WsMessage::Reconnecting { attempt, .. } => {
                    tracing::warn!(symbol = %symbol, attempt, "Binance feed disconnected, backing off");
                    FeedEvent::Status(FeedStatus::Disconnected)
                }
                WsMessage::Disconnected => {
                    tracing::warn!(symbol = %symbol, "Binance feed stopped");
                    let _ = event_tx.send(FeedEvent::Status(FeedStatus::Disconnected)).await;
                    break;
                }
            };

            if event_tx.send(event).await.is_err() {
                tracing::debug!(symbol = %symbol, "Event receiver dropped, stopping feed");
                break;
            }
        }
    }
}

fn parse_number(field: &'static str, raw: &str) -> Result<f64, ParseError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::InvalidNumber {
            field,
            value: raw.to_string(),
        })
}

#[async_trait]
impl TradeFeed for BinanceFeed {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<FeedEvent>> {
        let (event_tx, event_rx) = mpsc::channel(1024);

        tracing::info!(symbol = %self.symbol, url = %self.ws_config.url, "Subscribing to Binance feed");

        let client = WsClient::new(self.ws_config.clone());
        let ws_rx = client.connect();

        let symbol = self.symbol.clone();
        tokio::spawn(async move {
            Self::run_message_loop(symbol, ws_rx, event_tx).await;
        });

        Ok(event_rx)
    }
}
