use std::sync::Arc;

use adreel_core::types::GenerationId;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::engine::{WatchMessage, WatchSession};
use crate::state::AppState;

/// GET /api/v1/ws/generations/{id}
///
/// Upgrades to a WebSocket that streams progress for one generation until
/// it reaches a terminal state.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(generation_id): Path<GenerationId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, generation_id))
}

/// Manage a single watch connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Spawns the watch session and a relay that serialises its messages
///      and closes the socket once the session ends.
///   4. Processes inbound frames on the current task until the client
///      leaves, then cancels the session.
async fn handle_socket(socket: WebSocket, state: AppState, generation_id: GenerationId) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let ws_manager = state.ws_manager;

    let mut rx = ws_manager.add(conn_id.clone(), generation_id).await;
    let watchers = ws_manager.watcher_count(generation_id).await;
    tracing::info!(
        conn_id = %conn_id,
        generation_id = %generation_id,
        watchers,
        "WebSocket connected",
    );

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    // Watch session plus relay into the connection channel.
    let cancel = CancellationToken::new();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<WatchMessage>();
    let notifier = Arc::clone(&state.notifier);
    let session = WatchSession {
        generation_id,
        lifecycle: state.lifecycle,
        notifier: state.notifier,
        tick: state.config.progress_tick,
    };
    let session_conn_id = conn_id.clone();
    let session_cancel = cancel.clone();
    let session_task = tokio::spawn(async move {
        session.run(&session_conn_id, out_tx, session_cancel).await
    });

    let relay_manager = Arc::clone(&ws_manager);
    let relay_conn_id = conn_id.clone();
    let relay_task = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let text = message.to_json().to_string();
            if !relay_manager
                .send_to(&relay_conn_id, Message::Text(text.into()))
                .await
            {
                return;
            }
        }
        // Session finished on its own: close from our side.
        relay_manager
            .send_to(&relay_conn_id, Message::Close(None))
            .await;
    });

    // Receiver loop: the client only sends pongs and close frames.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Stops the ticker and releases the subscription in one step.
    cancel.cancel();
    match session_task.await {
        Ok(end) => tracing::debug!(conn_id = %conn_id, ?end, "Watch session finished"),
        Err(e) => {
            tracing::error!(conn_id = %conn_id, error = %e, "Watch session task failed");
            // The session never reached its own unsubscribe.
            let released = notifier.detach(&conn_id).await;
            tracing::debug!(conn_id = %conn_id, released, "Released orphaned subscriptions");
        }
    }

    ws_manager.remove(&conn_id).await;
    relay_task.abort();
    send_task.abort();
    tracing::info!(conn_id = %conn_id, generation_id = %generation_id, "WebSocket disconnected");
}
