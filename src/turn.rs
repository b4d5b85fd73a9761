//! Conversation turn pipeline
//!
//! One turn takes a captured utterance through transcription, reply
//! generation and speech synthesis. Progress comes back as a lazy stream of
//! [`TurnEvent`]s: chat updates whenever the conversation changes, and audio
//! frames as speech arrives. Nothing runs until the stream is polled, and
//! dropping the stream abandons the turn.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures::{Stream, StreamExt};

use crate::Result;
use crate::audio::{
    AudioBuffer, PlaybackFrame, RechunkPolicy, WavContainer, encode_wav, rechunk_stream,
};
use crate::services::{
    ChatMessage, DEFAULT_INSTRUCTIONS, OpenAiClient, ResponseGenerator, SpeechSynthesizer,
    Transcriber,
};

/// User entry recorded when the utterance could not be processed
pub const FALLBACK_USER_MESSAGE: &str = "Audio input received";

/// Assistant entry recorded when the utterance could not be processed
pub const FALLBACK_ASSISTANT_MESSAGE: &str =
    "I'm sorry, I encountered an error processing your request. Please try again.";

/// Output of a running turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// The conversation so far, to be rendered
    Chat(Vec<ChatMessage>),
    /// A frame of synthesized speech
    Audio(PlaybackFrame),
}

/// Lazy sequence of events for one turn
pub type TurnStream = Pin<Box<dyn Stream<Item = TurnEvent> + Send>>;

/// Sequences the hosted services for each conversation turn
#[derive(Clone)]
pub struct TurnPipeline {
    transcriber: Arc<dyn Transcriber>,
    generator: Arc<dyn ResponseGenerator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    instructions: Arc<str>,
    policy: RechunkPolicy,
}

impl TurnPipeline {
    /// Create a pipeline from individual services
    #[must_use]
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        generator: Arc<dyn ResponseGenerator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            transcriber,
            generator,
            synthesizer,
            instructions: Arc::from(DEFAULT_INSTRUCTIONS),
            policy: RechunkPolicy::default(),
        }
    }

    /// Create a pipeline backed entirely by one `OpenAI` client
    #[must_use]
    pub fn from_openai(client: Arc<OpenAiClient>) -> Self {
        Self::new(client.clone(), client.clone(), client)
    }

    /// Override the assistant instructions
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Arc::from(instructions.into());
        self
    }

    /// Override the playback buffering policy
    #[must_use]
    pub const fn with_rechunk_policy(mut self, policy: RechunkPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Instructions sent to the language and speech models
    #[must_use]
    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Start a turn for one utterance
    ///
    /// `history` is the conversation carried in from earlier turns; the new
    /// entries are appended to it. Service failures never end the stream
    /// with an error: a failed transcription or reply produces a fallback
    /// exchange, and a failed synthesis only cuts the audio short.
    ///
    /// # Errors
    ///
    /// Returns error if the utterance cannot be encoded as WAV
    pub fn run(
        &self,
        audio: &AudioBuffer,
        history: Option<Vec<ChatMessage>>,
    ) -> Result<TurnStream> {
        let started = Instant::now();
        let wav = encode_wav(audio)?;
        let pipeline = self.clone();

        let events = async_stream::stream! {
            let mut chat = history.unwrap_or_default();

            let reply = match pipeline.transcribe(&wav, started).await {
                Ok(transcript) => {
                    chat.push(ChatMessage::user(transcript));
                    yield TurnEvent::Chat(chat.clone());
                    pipeline.generate(&chat).await
                }
                Err(e) => Err(e),
            };

            let reply = match reply {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::error!(error = %e, "transcription or response failed");
                    chat.push(ChatMessage::user(FALLBACK_USER_MESSAGE));
                    chat.push(ChatMessage::assistant(FALLBACK_ASSISTANT_MESSAGE));
                    yield TurnEvent::Chat(chat);
                    return;
                }
            };

            chat.push(ChatMessage::assistant(reply.clone()));

            let tts_started = Instant::now();
            match pipeline.synthesizer.synthesize_stream(&reply, &pipeline.instructions).await {
                Ok(bytes) => {
                    let mut frames = std::pin::pin!(rechunk_stream(bytes, pipeline.policy));
                    while let Some(frame) = frames.next().await {
                        match frame {
                            Ok(frame) => {
                                yield TurnEvent::Audio(frame);
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "speech stream failed");
                                break;
                            }
                        }
                    }
                }
                Err(e) => tracing::error!(error = %e, "speech synthesis failed"),
            }

            tracing::info!(elapsed_ms = elapsed_ms(tts_started), "speech streaming finished");
            tracing::info!(elapsed_ms = elapsed_ms(started), "turn complete");

            yield TurnEvent::Chat(chat);
        };

        Ok(Box::pin(events))
    }

    async fn transcribe(&self, wav: &WavContainer, started: Instant) -> Result<String> {
        let text = self.transcriber.transcribe(wav).await?;
        tracing::info!(elapsed_ms = elapsed_ms(started), transcript = %text, "transcription finished");
        Ok(text)
    }

    async fn generate(&self, chat: &[ChatMessage]) -> Result<String> {
        let started = Instant::now();
        let reply = self.generator.generate(&self.instructions, chat).await?;
        tracing::info!(elapsed_ms = elapsed_ms(started), "response generated");
        Ok(reply)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
