//! WebSocket handler for spoken conversations
//!
//! Each binary message from the client is one utterance as a WAV file.
//! The server answers with JSON text events for chat updates and binary
//! messages carrying 16-bit little-endian PCM frames. The conversation is
//! carried from one turn to the next for the life of the socket.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{Sink, SinkExt, StreamExt};
use serde::Deserialize;

use super::{ApiState, WireEvent, limit_turn};
use crate::audio::decode_wav;
use crate::services::ChatMessage;
use crate::turn::TurnEvent;

/// Incoming text message from client
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsIncoming {
    /// Forget the conversation so far
    Reset,
    /// Ping to keep connection alive
    Ping,
}

/// Build WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new().route("/ws", get(ws_upgrade)).with_state(state)
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut history: Vec<ChatMessage> = Vec::new();

    tracing::debug!("websocket connected");

    while let Some(message) = receiver.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, "websocket receive failed");
                break;
            }
        };

        match handle_message(&state, message, &mut history, &mut sender).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Close) => break,
            Err(e) => {
                tracing::debug!(error = %e, "websocket send failed");
                break;
            }
        }
    }

    tracing::debug!(messages = history.len(), "websocket disconnected");
}

/// Whether the socket should keep reading
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

/// Handle one client message, updating the socket's conversation
async fn handle_message<S>(
    state: &ApiState,
    message: Message,
    history: &mut Vec<ChatMessage>,
    sender: &mut S,
) -> Result<Flow, axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    match message {
        Message::Binary(data) => run_turn(state, &data, history, sender).await?,
        Message::Text(text) => match serde_json::from_str::<WsIncoming>(text.as_str()) {
            Ok(WsIncoming::Ping) => send_event(sender, &WireEvent::Pong).await?,
            Ok(WsIncoming::Reset) => {
                tracing::debug!(dropped = history.len(), "conversation reset");
                history.clear();
            }
            Err(e) => send_event(sender, &WireEvent::error("bad_request", e.to_string())).await?,
        },
        Message::Close(_) => return Ok(Flow::Close),
        Message::Ping(_) | Message::Pong(_) => {}
    }

    Ok(Flow::Continue)
}

/// Run one turn and forward its events to the socket
async fn run_turn<S>(
    state: &ApiState,
    wav: &[u8],
    history: &mut Vec<ChatMessage>,
    sender: &mut S,
) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let audio = match decode_wav(wav) {
        Ok(audio) => audio,
        Err(e) => {
            tracing::warn!(error = %e, "rejected utterance");
            return send_event(sender, &WireEvent::error("bad_audio", e.to_string())).await;
        }
    };

    let Some(permit) = state.try_reserve_turn() else {
        return send_event(sender, &WireEvent::error("busy", "too many turns in progress")).await;
    };

    let events = match state.pipeline.run(&audio, Some(history.clone())) {
        Ok(events) => events,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode utterance");
            return send_event(sender, &WireEvent::error("encoding_failed", e.to_string())).await;
        }
    };

    let mut events = std::pin::pin!(limit_turn(events, permit, state.time_limit));
    while let Some(event) = events.next().await {
        match event {
            TurnEvent::Chat(messages) => {
                history.clone_from(&messages);
                send_event(sender, &WireEvent::Chat { messages }).await?;
            }
            TurnEvent::Audio(frame) => {
                sender.send(Message::Binary(frame.to_le_bytes().into())).await?;
            }
        }
    }

    Ok(())
}

async fn send_event<S>(sender: &mut S, event: &WireEvent) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let json = serde_json::to_string(event).map_err(axum::Error::new)?;
    sender.send(Message::Text(json.into())).await
}
