//! Integration tests for the connection manager against a local
//! websocket listener.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use voice_intake_config::ReconnectConfig;
use voice_intake_transport::{
    ClientMessage, ConnectionManager, ConnectionState, LinkEvent, ReconnectPolicy, ServerEvent,
    TransportError,
};

fn setup_msg() -> ClientMessage {
    ClientMessage::Setup {
        model: "test-model".into(),
        voice: "test-voice".into(),
        instructions: "collect the intake".into(),
    }
}

fn policy() -> ReconnectPolicy {
    ReconnectPolicy::new(&ReconnectConfig {
        max_attempts: 3,
        base_delay_ms: 10,
        max_delay_ms: 50,
    })
}

/// One-shot server: accepts a connection, asserts the setup message,
/// sends one event, then closes.
async fn serve_once(listener: TcpListener) {
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = accept_async(stream).await.unwrap();

    let first = ws.next().await.unwrap().unwrap();
    let text = first.into_text().unwrap();
    let setup: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(setup["type"], "setup");
    assert_eq!(setup["model"], "test-model");

    ws.send(Message::Text(
        r#"{"type":"text","text":"hello caller"}"#.to_string(),
    ))
    .await
    .unwrap();
    ws.close(None).await.ok();
}

#[tokio::test]
async fn connect_receives_events_and_reports_drop() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(serve_once(listener));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let manager = ConnectionManager::new(
        format!("ws://{addr}"),
        Duration::from_secs(5),
        policy(),
        tx,
    );

    manager.connect(setup_msg()).await.unwrap();
    assert_eq!(manager.state(), ConnectionState::Connected);

    // First the relayed event, then the drop notification
    match rx.recv().await.unwrap() {
        LinkEvent::Inbound(ServerEvent::Text { text }) => assert_eq!(text, "hello caller"),
        other => panic!("unexpected event {other:?}"),
    }
    match rx.recv().await.unwrap() {
        LinkEvent::Closed { manual } => assert!(!manual),
        other => panic!("unexpected event {other:?}"),
    }

    server.await.unwrap();
}

#[tokio::test]
async fn reconnects_after_server_drop() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Serve two sessions back to back
    let server = tokio::spawn(async move {
        for _ in 0..2 {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let _setup = ws.next().await.unwrap().unwrap();
            ws.close(None).await.ok();
        }
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let manager = ConnectionManager::new(
        format!("ws://{addr}"),
        Duration::from_secs(5),
        policy(),
        tx,
    );

    manager.connect(setup_msg()).await.unwrap();
    loop {
        if let LinkEvent::Closed { manual: false } = rx.recv().await.unwrap() {
            break;
        }
    }

    let delay = manager.next_retry_delay().expect("budget not exhausted");
    assert_eq!(manager.state(), ConnectionState::Reconnecting);
    tokio::time::sleep(delay).await;

    manager.connect(setup_msg()).await.unwrap();
    assert_eq!(manager.state(), ConnectionState::Connected);
    // Successful connect resets the attempt counter
    assert_eq!(manager.attempts(), 0);

    server.await.unwrap();
}

#[tokio::test]
async fn retry_budget_exhaustion_enters_failed() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let manager = ConnectionManager::new(
        "ws://127.0.0.1:1".to_string(),
        Duration::from_millis(100),
        policy(),
        tx,
    );

    assert!(manager.next_retry_delay().is_some());
    assert!(manager.next_retry_delay().is_some());
    assert!(manager.next_retry_delay().is_some());
    assert!(manager.next_retry_delay().is_none());
    assert_eq!(manager.state(), ConnectionState::Failed);
}

#[tokio::test]
async fn stuck_handshake_times_out() {
    // Raw TCP listener that never completes the websocket handshake
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hold = tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    let (tx, _rx) = mpsc::unbounded_channel();
    let manager = ConnectionManager::new(
        format!("ws://{addr}"),
        Duration::from_millis(200),
        policy(),
        tx,
    );

    let err = manager.connect(setup_msg()).await.unwrap_err();
    assert!(matches!(err, TransportError::ConnectTimeout(_)));
    assert_eq!(manager.state(), ConnectionState::Disconnected);

    hold.abort();
}

#[tokio::test]
async fn manual_disconnect_is_idempotent() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        // Hold the session open until the client goes away
        while ws.next().await.is_some() {}
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let manager = ConnectionManager::new(
        format!("ws://{addr}"),
        Duration::from_secs(5),
        policy(),
        tx,
    );
    manager.connect(setup_msg()).await.unwrap();

    manager.disconnect();
    manager.disconnect();
    manager.disconnect();

    assert_eq!(manager.state(), ConnectionState::Disconnected);
    match rx.recv().await.unwrap() {
        LinkEvent::Closed { manual } => assert!(manual),
        other => panic!("unexpected event {other:?}"),
    }
    // Exactly one close event despite three calls
    assert!(rx.try_recv().is_err());

    server.abort();
    let _ = server.await;
}

#[tokio::test]
async fn send_without_link_errors() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let manager = ConnectionManager::new(
        "ws://127.0.0.1:1".to_string(),
        Duration::from_millis(100),
        ReconnectPolicy::default(),
        tx,
    );
    let err = manager
        .send(ClientMessage::Text { text: "hi".into() })
        .unwrap_err();
    assert!(matches!(err, TransportError::NotConnected));
}
