//! Integration tests for the trade feed against a local WebSocket server

use futures_util::SinkExt;
use pairwatch::feed::{BinanceFeed, FeedEvent, FeedStatus, ParseError, TradeFeed};
use pairwatch::ws::WsConfig;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

fn quick_config() -> WsConfig {
    WsConfig::default()
        .max_reconnects(1)
        .initial_delay(Duration::from_millis(10))
        .max_delay(Duration::from_millis(20))
}

async fn collect(feed: &BinanceFeed) -> Vec<FeedEvent> {
    let mut rx = feed.subscribe().await.unwrap();
    let mut events = Vec::new();
    let drain = async {
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
    };
    tokio::time::timeout(Duration::from_secs(10), drain)
        .await
        .expect("feed did not stop");
    events
}

#[tokio::test]
async fn test_feed_streams_trades_from_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let frames = [
            r#"{"e":"trade","E":1704067200000,"s":"BTCUSDT","t":1,"p":"42500.50","q":"0.010","T":1704067200123}"#,
            r#"{"result":null,"id":1}"#,
            r#"{"e":"trade","E":1704067200500,"s":"BTCUSDT","t":2,"p":"abc","q":"0.5","T":1704067200456}"#,
            r#"{"e":"trade","E":1704067201000,"s":"BTCUSDT","t":3,"p":"42501.00","q":"0.200","T":1704067200999}"#,
        ];
        for frame in frames {
            ws.send(Message::Text(frame.to_string())).await.unwrap();
        }
        ws.close(None).await.unwrap();
        // Listener drops here, so the reconnect attempt is refused
    });

    let feed = BinanceFeed::with_config("BTCUSDT", &format!("ws://{}", addr), quick_config());
    let events = collect(&feed).await;
    server.await.unwrap();

    assert_eq!(events.first(), Some(&FeedEvent::Status(FeedStatus::Subscribed)));
    assert_eq!(events.last(), Some(&FeedEvent::Status(FeedStatus::Disconnected)));

    let ticks: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            FeedEvent::Tick(t) => Some(t),
            _ => None,
        })
        .collect();
    assert_eq!(ticks.len(), 2);
    assert_eq!(ticks[0].symbol, "BTCUSDT");
    assert_eq!(ticks[0].price, 42500.50);
    assert_eq!(ticks[1].size, 0.2);
    assert_eq!(ticks[1].timestamp.timestamp_millis(), 1704067200999);

    assert!(events.iter().any(|e| matches!(
        e,
        FeedEvent::Rejected(ParseError::InvalidNumber { field: "price", .. })
    )));
}

#[tokio::test]
async fn test_feed_gives_up_on_unreachable_server() {
    let feed = BinanceFeed::with_config("ethusdt", "ws://127.0.0.1:1", quick_config());
    let events = collect(&feed).await;

    assert!(!events.iter().any(|e| matches!(e, FeedEvent::Tick(_))));
    assert_eq!(events.last(), Some(&FeedEvent::Status(FeedStatus::Disconnected)));
}
