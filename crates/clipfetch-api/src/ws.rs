//! WebSocket download with live tool output.
//!
//! The client sends one download request as JSON. Every stdout line of the
//! tool is relayed as a `progress` message when it is a progress line and as
//! a `log` message otherwise. The exchange ends with `done` or `error`.
//! Closing the socket early kills the tool process.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::interval;
use tracing::{debug, info, warn};

use clipfetch_media::parse_progress_line;
use clipfetch_models::WsMessage;

use crate::metrics;
use crate::services::DownloadRequest;
use crate::state::AppState;

/// Global counter for active WebSocket connections.
static ACTIVE_WS_CONNECTIONS: AtomicI64 = AtomicI64::new(0);

const WS_ENDPOINT: &str = "download";
const WS_SEND_BUFFER_SIZE: usize = 32;
const WS_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const WS_CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Send a WebSocket message with backpressure handling.
async fn send_ws_message(tx: &mpsc::Sender<Message>, msg: WsMessage) -> bool {
    let message_type = msg.message_type();
    let json = match serde_json::to_string(&msg) {
        Ok(j) => j,
        Err(_) => return false,
    };

    let sent = match tx.try_send(Message::Text(json)) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(message)) => {
            debug!("WebSocket send buffer full, applying backpressure");
            tx.send(message).await.is_ok()
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    };

    if sent {
        metrics::record_ws_message_sent(WS_ENDPOINT, message_type.as_str());
    }
    sent
}

/// Convert one tool output line into the message relayed to the client.
fn line_message(line: &str) -> WsMessage {
    match parse_progress_line(line) {
        Some(progress) => WsMessage::progress(progress.percent_u8()),
        None => WsMessage::log(line),
    }
}

/// WebSocket download endpoint.
pub async fn ws_download(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let count = ACTIVE_WS_CONNECTIONS.fetch_add(1, Ordering::SeqCst) + 1;
    metrics::set_ws_active_connections(count);
    metrics::record_ws_connection(WS_ENDPOINT);

    ws.on_upgrade(|socket| async move {
        handle_download_socket(socket, state).await;
        let count = ACTIVE_WS_CONNECTIONS.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_ws_active_connections(count);
    })
}

/// Handle one download over a socket.
async fn handle_download_socket(socket: WebSocket, state: AppState) {
    let (ws_sender, receiver) = socket.split();
    run_download_session(ws_sender, receiver, state).await;
}

/// Run the request/report exchange over a split socket.
async fn run_download_session<S, R>(ws_sender: S, mut receiver: R, state: AppState)
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Send,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin + Send + 'static,
{
    // Bounded channel for backpressure
    let (tx, mut rx) = mpsc::channel::<Message>(WS_SEND_BUFFER_SIZE);

    let send_task = tokio::spawn(async move {
        let mut ws_sender = ws_sender;
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let request: DownloadRequest =
        match tokio::time::timeout(WS_CLIENT_TIMEOUT, receiver.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                metrics::record_ws_message_received(WS_ENDPOINT);
                match serde_json::from_str(&text) {
                    Ok(req) => req,
                    Err(e) => {
                        send_ws_message(&tx, WsMessage::error(format!("Invalid request: {}", e))).await;
                        drop(tx);
                        let _ = send_task.await;
                        return;
                    }
                }
            }
            Ok(_) | Err(_) => {
                send_ws_message(
                    &tx,
                    WsMessage::error("Expected JSON message or connection timeout"),
                )
                .await;
                drop(tx);
                let _ = send_task.await;
                return;
            }
        };

    info!(url = %request.url, "WebSocket download started");

    // Client disconnect cancels the tool run
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let watch_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => metrics::record_ws_message_received(WS_ENDPOINT),
            }
        }
        debug!("WebSocket client went away");
        let _ = cancel_tx.send(true);
    });

    // Lines arrive from the tool's reader task; relay them in order
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    let relay_tx = tx.clone();
    let relay_task = tokio::spawn(async move {
        let mut heartbeat = interval(WS_HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                line = line_rx.recv() => match line {
                    Some(line) => {
                        if !send_ws_message(&relay_tx, line_message(&line)).await {
                            break;
                        }
                    }
                    None => break,
                },
                _ = heartbeat.tick() => {
                    if relay_tx.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let result = state
        .clips
        .download(&request, Some(cancel_rx), move |line| {
            let _ = line_tx.send(line.to_string());
        })
        .await;

    // The line sender is dropped with the finished run, so the relay drains
    let _ = relay_task.await;

    let final_message = match result {
        Ok(outcome) => {
            info!(job_id = %outcome.job_id, "WebSocket download finished");
            WsMessage::done(outcome.job_id.to_string(), outcome.download_url)
        }
        Err(e) => {
            warn!("WebSocket download failed: {}", e);
            WsMessage::error(e.client_message())
        }
    };
    send_ws_message(&tx, final_message).await;

    watch_task.abort();
    drop(tx);
    let _ = send_task.await;
}
