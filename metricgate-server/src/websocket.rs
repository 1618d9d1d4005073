//! WebSocket streaming endpoint
//!
//! The shared key is checked before the upgrade so a bad key is answered with
//! a plain `401` and no socket is opened. Once upgraded, each text frame is
//! handed to the ingestion service; rejected frames get a NACK right away and
//! accepted frames are ACKed when their batch reaches the sink.

use axum::{
    extract::{
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Response},
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use metricgate_core::NackFrame;
use metricgate_pipeline::{ConnectionHandle, IngestService};
use metricgate_web::{ApiKey, WebError};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Close code sent when the gateway is going away
const CLOSE_GOING_AWAY: u16 = 1001;

/// Upgrade handler for `/ws` and the dedicated stream listener
pub async fn stream_handler(ws: WebSocketUpgrade, State(state): State<AppState>, key: ApiKey) -> Response {
    if state.is_shutting_down() {
        return WebError::from(metricgate_core::RejectionReason::Overloaded).into_response();
    }

    let handle = match state.ingest.on_connect(key.as_deref()) {
        Ok(handle) => handle,
        Err(reason) => {
            debug!("Refusing stream connection: {}", reason);
            return WebError::from(reason).into_response();
        }
    };

    ws.max_message_size(state.max_frame_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state, handle))
}

async fn handle_socket(socket: WebSocket, state: AppState, mut handle: ConnectionHandle) {
    let connection = handle.id();
    info!("Stream connection {} opened", connection);

    let (mut sender, mut receiver) = socket.split();
    let mut shutdown = state.shutdown_receiver();
    let Some(mut acks) = handle.take_ack_receiver() else {
        warn!("Stream connection {} has no ACK channel", connection);
        state.ingest.on_close(handle);
        return;
    };

    while !*shutdown.borrow_and_update() {
        tokio::select! {
            msg = receiver.next() => {
                let payload = match msg {
                    Some(Ok(Message::Text(text))) => text.as_str().as_bytes().to_vec(),
                    Some(Ok(Message::Binary(data))) => data.to_vec(),
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Stream connection {} closed by client", connection);
                        break;
                    }
                    Some(Err(e)) => {
                        debug!("Stream connection {} read error: {}", connection, e);
                        break;
                    }
                };

                if let Err(reason) = state.ingest.on_message(&mut handle, &payload).await {
                    let nack = NackFrame::new(IngestService::peek_seq(&payload), &reason);
                    if send_json(&mut sender, &nack).await.is_err() {
                        break;
                    }
                }
            }
            ack = acks.recv() => {
                match ack {
                    Some(ack) => {
                        if send_json(&mut sender, &ack).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = shutdown.changed() => {
                let close = CloseFrame {
                    code: CLOSE_GOING_AWAY,
                    reason: Utf8Bytes::from_static("gateway shutting down"),
                };
                let _ = sender.send(Message::Close(Some(close))).await;
                break;
            }
        }
    }

    handle.begin_close();
    state.ingest.on_close(handle);
    info!("Stream connection {} closed", connection);
}

async fn send_json<T: Serialize>(sender: &mut SplitSink<WebSocket, Message>, frame: &T) -> Result<(), axum::Error> {
    match serde_json::to_string(frame) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!("Failed to serialize outgoing frame: {}", e);
            Ok(())
        }
    }
}
