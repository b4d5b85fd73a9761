//! voxchat - Voice chat assistant
//!
//! This library provides the pieces of a spoken conversation loop:
//! - WAV encoding of captured utterances
//! - Re-chunking of streamed speech into playback frames
//! - A turn pipeline over hosted STT, LLM and TTS services
//! - An HTTP/WebSocket transport for browser clients
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Transport (api)                     │
//! │        /api/turn (NDJSON)   │   /ws (WebSocket)      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Turn pipeline                        │
//! │   WAV encode → STT → LLM → TTS → re-chunk            │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │               Hosted services                        │
//! │   transcriptions  │  responses  │  speech            │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod services;
pub mod turn;

pub use audio::{AudioBuffer, PlaybackFrame, Samples};
pub use config::Config;
pub use error::{Error, Result};
pub use services::{ChatMessage, OpenAiClient, Role};
pub use turn::{TurnEvent, TurnPipeline, TurnStream};
