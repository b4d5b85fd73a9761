//! Hosted speech and language services
//!
//! The turn pipeline only talks to these traits. [`OpenAiClient`] is the
//! production implementation; tests substitute stubs.

mod openai;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::audio::WavContainer;

pub use openai::{DEFAULT_INSTRUCTIONS, OpenAiClient, OpenAiSettings};

/// Audio bytes streamed back from a synthesis request
pub type SpeechStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Speech-to-text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a WAV utterance to plain text
    async fn transcribe(&self, audio: &WavContainer) -> Result<String>;
}

/// Reply generation from a conversation
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Produce the assistant's next reply
    async fn generate(&self, instructions: &str, messages: &[ChatMessage]) -> Result<String>;
}

/// Streaming text-to-speech
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Start synthesizing `text`, returning the audio byte stream
    ///
    /// Dropping the stream abandons the request and closes the connection.
    async fn synthesize_stream(&self, text: &str, instructions: &str) -> Result<SpeechStream>;
}
