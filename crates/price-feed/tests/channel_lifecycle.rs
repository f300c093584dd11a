//! Integration tests: delta channel against local WebSocket endpoints

mod common;

use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

use tracker_core::{DeltaEvent, GeneratorConfig};
use tracker_price_feed::{ChannelState, DeltaChannel, EchoServer, RandomDeltaGenerator, ReceiveOnly};

use common::{
    closing_server, context, feed_config, instrument, pinging_server, scripted_server, silent_server,
    wait_until,
};

const WAIT: Duration = Duration::from_secs(5);

fn fast_generator() -> Arc<RandomDeltaGenerator> {
    Arc::new(
        RandomDeltaGenerator::new(GeneratorConfig {
            period_ms: 20,
            jitter_ms: 5,
            max_delta: 20.0,
            seed: Some(1),
        })
        .unwrap(),
    )
}

#[tokio::test]
async fn test_generated_deltas_round_trip_through_echo() {
    let server = EchoServer::bind("127.0.0.1:0").await.unwrap();
    let (ctx, mut events) = context(feed_config(server.url()), fast_generator(), 1);
    let health = Arc::clone(&ctx.health);

    let mut channel = DeltaChannel::open(instrument("AAPL", 190.0), ctx);
    assert!(wait_until(WAIT, || channel.state() == ChannelState::Connected).await);
    assert_eq!(health.current().connected, 1);

    for _ in 0..3 {
        let event = tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap();
        assert_eq!(event.symbol.as_str(), "AAPL");
        assert!((-20.0..=20.0).contains(&event.delta_price));
    }

    channel.close().await;
    assert_eq!(channel.state(), ChannelState::Disconnected);
    assert_eq!(health.current().connected, 0);

    server.shutdown().await;
}

#[tokio::test]
async fn test_malformed_payloads_are_dropped() {
    let addr = scripted_server(vec![
        Message::Text("not json".into()),
        Message::Text(r#"{"symbol":"AAPL"}"#.into()),
        Message::Text(r#"{"delta_price":"1"}"#.into()),
        Message::Binary(vec![0xff, 0xfe]),
        Message::Text(r#"{"symbol":"AAPL","delta_price":7.5}"#.into()),
        Message::Binary(br#"{"symbol":"AAPL","delta_price":-2}"#.to_vec()),
    ])
    .await;
    let (ctx, mut events) = context(feed_config(format!("ws://{addr}")), Arc::new(ReceiveOnly), 1);

    let mut channel = DeltaChannel::open(instrument("AAPL", 190.0), ctx);

    let first = tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert_eq!(first, DeltaEvent::new("AAPL", 7.5));
    let second = tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert_eq!(second, DeltaEvent::new("AAPL", -2.0));

    // Garbage did not take the connection down
    assert_eq!(channel.state(), ChannelState::Connected);
    channel.close().await;
}

#[tokio::test]
async fn test_connect_timeout_marks_errored() {
    let addr = silent_server().await;
    let mut config = feed_config(format!("ws://{addr}"));
    config.connect_timeout_ms = 150;
    let (ctx, _events) = context(config, Arc::new(ReceiveOnly), 1);
    let health = Arc::clone(&ctx.health);

    let mut channel = DeltaChannel::open(instrument("AAPL", 190.0), ctx);
    assert!(wait_until(WAIT, || channel.state() == ChannelState::Errored).await);
    assert_eq!(health.current().connected, 0);
    assert!(!health.current().is_healthy());

    // Errored channels still close cleanly
    channel.close().await;
    assert_eq!(channel.state(), ChannelState::Errored);
}

#[tokio::test]
async fn test_refused_connection_marks_errored() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let (ctx, _events) = context(feed_config(format!("ws://{addr}")), Arc::new(ReceiveOnly), 1);

    let channel = DeltaChannel::open(instrument("AAPL", 190.0), ctx);
    assert!(wait_until(WAIT, || channel.state() == ChannelState::Errored).await);
}

#[tokio::test]
async fn test_close_while_connecting_cancels() {
    let addr = silent_server().await;
    let (ctx, _events) = context(feed_config(format!("ws://{addr}")), Arc::new(ReceiveOnly), 1);

    let mut channel = DeltaChannel::open(instrument("AAPL", 190.0), ctx);
    assert!(wait_until(WAIT, || channel.state() == ChannelState::Connecting).await);

    channel.close().await;
    assert_eq!(channel.state(), ChannelState::Cancelled);
    assert!(!channel.is_open());
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let server = EchoServer::bind("127.0.0.1:0").await.unwrap();
    let (ctx, _events) = context(feed_config(server.url()), fast_generator(), 1);
    let health = Arc::clone(&ctx.health);

    let mut channel = DeltaChannel::open(instrument("AAPL", 190.0), ctx);
    assert!(wait_until(WAIT, || channel.state() == ChannelState::Connected).await);

    channel.close().await;
    channel.close().await;
    channel.close().await;

    assert_eq!(channel.state(), ChannelState::Disconnected);
    assert_eq!(health.current().connected, 0);
    assert!(wait_until(WAIT, || server.active_connections() == 0).await);

    server.shutdown().await;
}

#[tokio::test]
async fn test_reconnect_uses_fresh_connection() {
    let server = EchoServer::bind("127.0.0.1:0").await.unwrap();
    let (ctx, mut events) = context(feed_config(server.url()), fast_generator(), 1);
    let health = Arc::clone(&ctx.health);

    let mut channel = DeltaChannel::open(instrument("MSFT", 410.0), ctx);
    assert!(wait_until(WAIT, || channel.state() == ChannelState::Connected).await);
    channel.close().await;

    // Nothing arrives while closed
    while events.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(events.try_recv().is_err());

    channel.reconnect().await;
    assert_eq!(channel.generation(), 2);
    assert!(wait_until(WAIT, || channel.state() == ChannelState::Connected).await);
    assert_eq!(health.current().connected, 1);

    let event = tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert_eq!(event.symbol.as_str(), "MSFT");

    channel.close().await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_remote_close_reports_disconnect() {
    let addr = closing_server().await;
    let (ctx, _events) = context(feed_config(format!("ws://{addr}")), Arc::new(ReceiveOnly), 1);
    let health = Arc::clone(&ctx.health);

    let mut channel = DeltaChannel::open(instrument("AAPL", 190.0), ctx);
    assert!(wait_until(WAIT, || channel.state() == ChannelState::Connected).await);
    assert!(wait_until(WAIT, || channel.state() == ChannelState::Disconnected).await);
    assert_eq!(health.current().connected, 0);

    // No automatic retry
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(channel.state(), ChannelState::Disconnected);

    channel.reconnect().await;
    assert!(wait_until(WAIT, || channel.state() == ChannelState::Connected).await);
    channel.close().await;
}

#[tokio::test]
async fn test_ping_answered_once() {
    let (addr, pongs) = pinging_server(Duration::from_millis(300)).await;
    let (ctx, _events) = context(feed_config(format!("ws://{addr}")), Arc::new(ReceiveOnly), 1);

    let mut channel = DeltaChannel::open(instrument("AAPL", 190.0), ctx);
    let pongs = tokio::time::timeout(WAIT, pongs).await.unwrap().unwrap();
    assert_eq!(pongs, 1);
    assert_eq!(channel.state(), ChannelState::Connected);

    channel.close().await;
}
