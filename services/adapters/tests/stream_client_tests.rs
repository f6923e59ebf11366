//! # Stream Client Integration Tests
//!
//! Drives a real [`StreamClient`] against a local mock venue:
//! - heartbeat timeout produces exactly one disconnect and one reconnect
//! - subscriptions are restored verbatim on every new session
//! - malformed frames are dropped without interrupting delivery
//! - manual disconnect and dispose never trigger a reconnect

mod common;

use adapter_service::{AdapterError, ConnectionConfig, ReconnectPolicy, StreamClient};
use common::{eventually, kline_frame, MockVenueServer};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio_test::assert_ok;
use types::{ConnectionState, Timeframe, Topic};

fn fast_config(url: String, reconnect_delay: Duration) -> ConnectionConfig {
    ConnectionConfig {
        url,
        connect_timeout: Duration::from_secs(2),
        ping_interval: Duration::from_millis(100),
        pong_timeout: Duration::from_millis(300),
        channel_capacity: 64,
        reconnect: ReconnectPolicy::Fixed {
            delay: reconnect_delay,
            max_attempts: None,
        },
    }
}

async fn connected_client(server: &MockVenueServer, reconnect_delay: Duration) -> StreamClient {
    let client = StreamClient::new(fast_config(server.url(), reconnect_delay));
    assert_ok!(client.connect().await);
    assert_eq!(client.state(), ConnectionState::Connected);
    client
}

#[tokio::test]
async fn test_kline_delivered_to_exact_topic() {
    let server = MockVenueServer::start().await;
    let client = connected_client(&server, Duration::from_millis(200)).await;

    let topic = Topic::kline(Timeframe::M5, "BTCUSDT");
    let mut rx = client.messages_for(topic.clone());
    assert_ok!(client.subscribe(topic.clone()));
    assert!(eventually(Duration::from_secs(2), || server.subscribed_on(0).contains("kline.5.BTCUSDT")).await);

    server.push(kline_frame("kline.5.BTCUSDT", 1_700_000_100_000, 100.0, false));
    let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("kline within deadline")
        .expect("channel open");
    assert_eq!(msg.topic, "kline.5.BTCUSDT");
    let candles = codec::parse_candles(&msg.data).unwrap();
    assert_eq!(candles[0].close, 100.0);

    client.dispose().await;
}

#[tokio::test]
async fn test_prefix_receiver_sees_all_kline_symbols() {
    let server = MockVenueServer::start().await;
    let client = connected_client(&server, Duration::from_millis(200)).await;

    let mut all = client.messages_for("kline.5");
    let mut btc = client.messages_for("kline.5.BTCUSDT");
    assert_ok!(client.subscribe("kline.5.BTCUSDT"));
    assert_ok!(client.subscribe("kline.5.ETHUSDT"));

    server.push(kline_frame("kline.5.ETHUSDT", 1_700_000_100_000, 2000.0, false));
    server.push(kline_frame("kline.5.BTCUSDT", 1_700_000_100_000, 40000.0, false));

    let first = tokio::time::timeout(Duration::from_secs(2), all.recv()).await.unwrap().unwrap();
    assert_eq!(first.topic, "kline.5.ETHUSDT");
    // The exact route wins for BTC, so the prefix receiver sees only ETH
    let exact = tokio::time::timeout(Duration::from_secs(2), btc.recv()).await.unwrap().unwrap();
    assert_eq!(exact.topic, "kline.5.BTCUSDT");

    client.dispose().await;
}

#[tokio::test]
async fn test_subscribe_is_idempotent() {
    let server = MockVenueServer::start().await;
    let client = connected_client(&server, Duration::from_millis(200)).await;

    assert_ok!(client.subscribe("tickers.BTCUSDT"));
    assert_ok!(client.subscribe("tickers.BTCUSDT"));
    assert!(eventually(Duration::from_secs(2), || server.count_op("subscribe") >= 1).await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(server.frames_on(0, "subscribe").len(), 1);
    assert_eq!(client.active_topics(), vec![Topic::from("tickers.BTCUSDT")]);

    client.dispose().await;
}

#[tokio::test]
async fn test_heartbeat_timeout_disconnects_once_and_reconnects_once() {
    let server = MockVenueServer::start().await;
    server.set_respond_to_pings(false);
    let client = connected_client(&server, Duration::from_secs(1)).await;

    // First ping at 100ms, deadline at 400ms
    assert_ok!(
        client
            .wait_for_state(ConnectionState::Disconnected, Duration::from_secs(2))
            .await
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    let stats = client.stats();
    assert_eq!(stats.heartbeat_timeouts, 1);
    assert_eq!(stats.disconnects, 1);
    assert_eq!(stats.reconnects_scheduled, 1);
    assert_eq!(stats.sessions_opened, 1);
    let reason = client.last_error().unwrap_or_default();
    assert!(reason.contains("Heartbeat timeout"), "{}", reason);

    server.set_respond_to_pings(true);
    assert!(eventually(Duration::from_secs(3), || client.stats().sessions_opened == 2).await);
    assert_ok!(
        client
            .wait_for_state(ConnectionState::Connected, Duration::from_secs(1))
            .await
    );

    // Answered pings keep the new session alive past the pong deadline
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(client.is_connected());
    assert_eq!(client.stats().heartbeat_timeouts, 1);
    assert_eq!(client.stats().disconnects, 1);

    client.dispose().await;
}

#[tokio::test]
async fn test_answered_pings_keep_connection_alive() {
    let server = MockVenueServer::start().await;
    let client = connected_client(&server, Duration::from_millis(200)).await;

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert!(client.is_connected());
    assert_eq!(client.stats().heartbeat_timeouts, 0);
    assert!(server.count_op("ping") >= 3);
    assert!(client.liveness().last_pong_received_ms.is_some());

    client.dispose().await;
}

#[tokio::test]
async fn test_resubscribes_exact_topic_set_after_drop() {
    let server = MockVenueServer::start().await;
    let client = connected_client(&server, Duration::from_millis(200)).await;

    let topics = [
        "kline.5.BTCUSDT",
        "kline.240.BTCUSDT",
        "tickers.BTCUSDT",
        "kline.5.ETHUSDT",
    ];
    for t in topics {
        assert_ok!(client.subscribe(t));
    }
    client.unsubscribe(&Topic::from("kline.5.ETHUSDT"));
    let expected: BTreeSet<String> = topics[..3].iter().map(|s| s.to_string()).collect();
    assert!(eventually(Duration::from_secs(2), || server.subscribed_on(0) == expected).await);

    server.drop_all();
    assert!(eventually(Duration::from_secs(3), || server.connection_count() == 2).await);
    assert!(eventually(Duration::from_secs(2), || server.subscribed_on(1) == expected).await);
    assert!(client.is_connected());
    assert_eq!(client.stats().disconnects, 1);

    client.dispose().await;
}

#[tokio::test]
async fn test_malformed_frames_dropped_and_stream_continues() {
    let server = MockVenueServer::start().await;
    let client = connected_client(&server, Duration::from_millis(200)).await;

    let mut rx = client.messages_for("kline.5.BTCUSDT");
    assert_ok!(client.subscribe("kline.5.BTCUSDT"));

    server.push("{this is not json");
    server.push(r#"{"topic":"kline.5.BTCUSDT"}"#);
    server.push(kline_frame("kline.5.BTCUSDT", 1_700_000_100_000, 101.5, true));

    let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    let candles = codec::parse_candles(&msg.data).unwrap();
    assert_eq!(candles[0].close, 101.5);
    assert!(candles[0].confirmed);

    assert_eq!(client.stats().malformed_dropped, 2);
    assert!(client.is_connected());
    assert_eq!(client.stats().disconnects, 0);

    client.dispose().await;
}

#[tokio::test]
async fn test_manual_disconnect_does_not_reconnect() {
    let server = MockVenueServer::start().await;
    let client = connected_client(&server, Duration::from_millis(100)).await;
    assert_ok!(client.subscribe("kline.5.BTCUSDT"));

    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(server.connection_count(), 1);
    assert_eq!(client.stats().reconnects_scheduled, 0);
    assert!(matches!(
        client.subscribe("tickers.BTCUSDT"),
        Err(AdapterError::NotConnected)
    ));

    // A later connect restores the kept subscription set
    assert_ok!(client.connect().await);
    assert!(eventually(Duration::from_secs(2), || server.subscribed_on(1).contains("kline.5.BTCUSDT")).await);

    client.dispose().await;
}

#[tokio::test]
async fn test_dispose_unsubscribes_and_closes_receivers() {
    let server = MockVenueServer::start().await;
    let client = connected_client(&server, Duration::from_millis(100)).await;

    let mut rx = client.messages_for("kline.5.BTCUSDT");
    assert_ok!(client.subscribe("kline.5.BTCUSDT"));
    assert_ok!(client.subscribe("tickers.BTCUSDT"));

    client.dispose().await;
    client.dispose().await;

    assert!(rx.recv().await.is_none());
    assert!(client.active_topics().is_empty());
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(eventually(Duration::from_secs(2), || server.subscribed_on(0).is_empty()).await);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.connection_count(), 1);
    assert!(matches!(client.connect().await, Err(AdapterError::Disposed)));
}

#[tokio::test]
async fn test_first_attempt_failure_reported_then_retried() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut cfg = fast_config(format!("ws://127.0.0.1:{}", port), Duration::from_millis(50));
    cfg.reconnect = ReconnectPolicy::Fixed {
        delay: Duration::from_millis(50),
        max_attempts: Some(2),
    };
    let client = StreamClient::new(cfg);

    assert!(matches!(
        client.connect().await,
        Err(AdapterError::ConnectionFailed { .. })
    ));
    assert!(eventually(Duration::from_secs(2), || client.stats().reconnects_scheduled == 2).await);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(client.stats().reconnects_scheduled, 2);
    assert_eq!(client.stats().sessions_opened, 0);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(client.last_error().is_some());

    client.dispose().await;
}

#[tokio::test]
async fn test_wait_for_state_times_out_then_succeeds() {
    let server = MockVenueServer::start().await;
    let client = StreamClient::new(fast_config(server.url(), Duration::from_secs(1)));

    assert!(matches!(
        client
            .wait_for_state(ConnectionState::Connected, Duration::from_millis(100))
            .await,
        Err(AdapterError::ConnectionTimeout { .. })
    ));

    assert_ok!(client.connect().await);
    assert_ok!(
        client
            .wait_for_state(ConnectionState::Connected, Duration::from_millis(100))
            .await
    );
    assert!(client.last_error().is_none());

    client.dispose().await;
}
