//! JSON events sent to clients

use base64::Engine;
use serde::Serialize;

use crate::services::ChatMessage;
use crate::turn::TurnEvent;

/// Outgoing event, one JSON object per message or NDJSON line
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    /// Conversation so far
    Chat { messages: Vec<ChatMessage> },
    /// Speech frame as base64 little-endian 16-bit PCM
    Audio {
        sample_rate: u32,
        samples: usize,
        pcm: String,
    },
    /// Error occurred
    Error { code: String, message: String },
    /// Pong response
    Pong,
}

impl WireEvent {
    /// Build an error event
    #[must_use]
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<TurnEvent> for WireEvent {
    fn from(event: TurnEvent) -> Self {
        match event {
            TurnEvent::Chat(messages) => Self::Chat { messages },
            TurnEvent::Audio(frame) => Self::Audio {
                sample_rate: frame.sample_rate,
                samples: frame.samples.len(),
                pcm: base64::engine::general_purpose::STANDARD.encode(frame.to_le_bytes()),
            },
        }
    }
}
