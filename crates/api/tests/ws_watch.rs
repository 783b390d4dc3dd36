//! Integration tests for the live watch socket at
//! `/api/v1/ws/generations/{id}`, served over a real TCP listener.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use adreel_api::notifications::StatusNotifier;
use adreel_core::generation::{GenerationRequest, UNKNOWN_GENERATION_MESSAGE};
use adreel_core::types::GenerationId;
use common::{build_test_app, TestApp};
use futures::StreamExt;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

fn request() -> GenerationRequest {
    GenerationRequest {
        prompt: "Sparkling yuzu soda".into(),
        aspect_ratio: "portrait".into(),
        length: 12,
        voice: "emma".into(),
        image_url: None,
    }
}

async fn serve(app: &TestApp) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, id: GenerationId) -> WsClient {
    let url = format!("ws://{addr}/api/v1/ws/generations/{id}");
    let (socket, _) = connect_async(url).await.expect("WebSocket handshake failed");
    socket
}

/// Next text frame as JSON, skipping control frames.
async fn next_json(socket: &mut WsClient) -> Value {
    loop {
        let msg = timeout(FRAME_TIMEOUT, socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket ended before a text frame")
            .expect("socket error");
        if msg.is_text() {
            return serde_json::from_str(msg.to_text().unwrap()).unwrap();
        }
        assert!(msg.is_ping() || msg.is_pong(), "unexpected frame: {msg:?}");
    }
}

/// The server closes the socket after a terminal message.
async fn expect_close(socket: &mut WsClient) {
    loop {
        let next = timeout(FRAME_TIMEOUT, socket.next())
            .await
            .expect("timed out waiting for close");
        match next {
            None | Some(Ok(Message::Close(_))) | Some(Err(_)) => return,
            Some(Ok(msg)) if msg.is_ping() || msg.is_pong() => continue,
            Some(Ok(msg)) => panic!("expected close, got {msg:?}"),
        }
    }
}

async fn wait_until_released(notifier: &StatusNotifier) {
    timeout(FRAME_TIMEOUT, async {
        while notifier.active_count().await > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("status subscription still registered");
}

#[tokio::test]
async fn streams_progress_then_completion_and_closes() {
    let app = build_test_app();
    let addr = serve(&app).await;
    let record = app.lifecycle.create(request()).await.unwrap();
    let mut socket = connect(addr, record.id).await;

    let first = next_json(&mut socket).await;
    assert_eq!(first["type"], "generation_progress");
    assert_eq!(first["generation_id"], record.id.to_string());
    let percent = first["percent"].as_f64().unwrap();
    assert!(percent > 0.0 && percent < 100.0);
    assert!(first["phase"].is_string());
    assert!(first["elapsed"].is_string());

    app.lifecycle
        .mark_completed(record.id, "https://cdn.example.com/yuzu.mp4")
        .await
        .unwrap();

    let terminal = loop {
        let msg = next_json(&mut socket).await;
        if msg["type"] != "generation_progress" {
            break msg;
        }
    };
    assert_eq!(terminal["type"], "generation_completed");
    assert_eq!(terminal["video_url"], "https://cdn.example.com/yuzu.mp4");
    assert_eq!(terminal["percent"], 100.0);

    expect_close(&mut socket).await;
    wait_until_released(&app.notifier).await;
}

#[tokio::test]
async fn failure_is_reported_with_stored_message() {
    let app = build_test_app();
    let addr = serve(&app).await;
    let record = app.lifecycle.create(request()).await.unwrap();
    let mut socket = connect(addr, record.id).await;

    next_json(&mut socket).await;
    app.lifecycle
        .mark_failed(record.id, "Voiceover service unavailable")
        .await
        .unwrap();

    let terminal = loop {
        let msg = next_json(&mut socket).await;
        if msg["type"] != "generation_progress" {
            break msg;
        }
    };
    assert_eq!(terminal["type"], "generation_failed");
    assert_eq!(terminal["error"], "Voiceover service unavailable");
    expect_close(&mut socket).await;
}

#[tokio::test]
async fn unknown_generation_fails_immediately() {
    let app = build_test_app();
    let addr = serve(&app).await;
    let mut socket = connect(addr, GenerationId::now_v7()).await;

    let msg = next_json(&mut socket).await;
    assert_eq!(msg["type"], "generation_failed");
    assert_eq!(msg["error"], UNKNOWN_GENERATION_MESSAGE);

    expect_close(&mut socket).await;
    wait_until_released(&app.notifier).await;
}

#[tokio::test]
async fn already_completed_generation_sends_only_the_outcome() {
    let app = build_test_app();
    let addr = serve(&app).await;
    let record = app.lifecycle.create(request()).await.unwrap();
    app.lifecycle
        .mark_completed(record.id, "https://cdn.example.com/done.mp4")
        .await
        .unwrap();

    let mut socket = connect(addr, record.id).await;

    let msg = next_json(&mut socket).await;
    assert_eq!(msg["type"], "generation_completed");
    assert_eq!(msg["percent"], 100.0);
    expect_close(&mut socket).await;
}

#[tokio::test]
async fn client_disconnect_stops_ticker_and_releases_subscription() {
    let app = build_test_app();
    let addr = serve(&app).await;
    let record = app.lifecycle.create(request()).await.unwrap();
    let mut socket = connect(addr, record.id).await;

    // A progress frame means the session is subscribed and ticking.
    next_json(&mut socket).await;
    assert_eq!(app.notifier.active_count().await, 1);

    socket.close(None).await.unwrap();
    drop(socket);

    wait_until_released(&app.notifier).await;

    // A later outcome reaches no one and still applies.
    let (outcome, _) = app
        .lifecycle
        .mark_completed(record.id, "https://cdn.example.com/late.mp4")
        .await
        .unwrap();
    assert_eq!(outcome, adreel_core::generation::TransitionOutcome::Applied);
    assert_eq!(app.notifier.active_count().await, 0);
}
