//! Shared test utilities

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

use voxchat::audio::WavContainer;
use voxchat::services::{ResponseGenerator, SpeechStream, SpeechSynthesizer, Transcriber};
use voxchat::{ChatMessage, Error, Result, TurnEvent, TurnPipeline, TurnStream};

/// One step of a stubbed speech stream
#[derive(Clone)]
pub enum Chunk {
    Data(Vec<u8>),
    Fail,
}

/// In-memory stand-ins for the hosted services
#[derive(Default)]
pub struct StubServices {
    transcript: Option<String>,
    reply: Option<String>,
    speech: Vec<Chunk>,
    synthesis_fails: bool,
    pub transcribe_calls: AtomicUsize,
    pub generate_calls: AtomicUsize,
    pub synthesize_calls: AtomicUsize,
    pub last_wav: Mutex<Option<Vec<u8>>>,
    pub last_messages: Mutex<Vec<ChatMessage>>,
    pub last_speech_text: Mutex<Option<String>>,
    /// Instructions seen by generation, then synthesis
    pub instructions_seen: Mutex<Vec<String>>,
    /// Set once the speech stream handed out has been dropped
    pub speech_dropped: Arc<AtomicBool>,
}

impl StubServices {
    /// Services that succeed with fixed text and no speech
    #[must_use]
    pub fn new(transcript: &str, reply: &str) -> Self {
        Self {
            transcript: Some(transcript.to_string()),
            reply: Some(reply.to_string()),
            ..Self::default()
        }
    }

    /// Services whose transcription always fails
    #[must_use]
    pub fn failing_transcription() -> Self {
        Self {
            reply: Some("unused".to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_failing_generation(mut self) -> Self {
        self.reply = None;
        self
    }

    #[must_use]
    pub fn with_failing_synthesis(mut self) -> Self {
        self.synthesis_fails = true;
        self
    }

    #[must_use]
    pub fn with_speech(mut self, chunks: Vec<Chunk>) -> Self {
        self.speech = chunks;
        self
    }

    /// Build a pipeline that uses these stubs for every service
    #[must_use]
    pub fn pipeline(self: &Arc<Self>) -> TurnPipeline {
        TurnPipeline::new(self.clone(), self.clone(), self.clone())
    }
}

#[async_trait]
impl Transcriber for StubServices {
    async fn transcribe(&self, audio: &WavContainer) -> Result<String> {
        self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_wav.lock().unwrap() = Some(audio.as_bytes().to_vec());
        self.transcript
            .clone()
            .ok_or_else(|| Error::Stt("service unavailable".to_string()))
    }
}

#[async_trait]
impl ResponseGenerator for StubServices {
    async fn generate(&self, instructions: &str, messages: &[ChatMessage]) -> Result<String> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.instructions_seen
            .lock()
            .unwrap()
            .push(instructions.to_string());
        *self.last_messages.lock().unwrap() = messages.to_vec();
        self.reply
            .clone()
            .ok_or_else(|| Error::Llm("model overloaded".to_string()))
    }
}

/// Flags the stream as dropped when it goes away
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SpeechSynthesizer for StubServices {
    async fn synthesize_stream(&self, text: &str, instructions: &str) -> Result<SpeechStream> {
        self.synthesize_calls.fetch_add(1, Ordering::SeqCst);
        self.instructions_seen
            .lock()
            .unwrap()
            .push(instructions.to_string());
        *self.last_speech_text.lock().unwrap() = Some(text.to_string());

        if self.synthesis_fails {
            return Err(Error::Tts("voice not found".to_string()));
        }

        let flag = DropFlag(self.speech_dropped.clone());
        let chunks = futures::stream::iter(self.speech.clone()).map(move |chunk| {
            let _held = &flag;
            match chunk {
                Chunk::Data(bytes) => Ok(Bytes::from(bytes)),
                Chunk::Fail => Err(Error::Tts("connection reset".to_string())),
            }
        });
        Ok(Box::pin(chunks))
    }
}

/// Drain a turn into a vector
pub async fn collect(events: TurnStream) -> Vec<TurnEvent> {
    events.collect().await
}

/// Chat updates in order
#[must_use]
pub fn chats(events: &[TurnEvent]) -> Vec<&Vec<ChatMessage>> {
    events
        .iter()
        .filter_map(|e| match e {
            TurnEvent::Chat(messages) => Some(messages),
            TurnEvent::Audio(_) => None,
        })
        .collect()
}

/// Audio frame sizes in bytes, in order
#[must_use]
pub fn frame_sizes(events: &[TurnEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|e| match e {
            TurnEvent::Audio(frame) => Some(frame.byte_len()),
            TurnEvent::Chat(_) => None,
        })
        .collect()
}

/// Encode mono 16-bit samples as a WAV file
#[must_use]
pub fn wav_file(sample_rate: u32, samples: &[i16]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("wav writer");
        for &s in samples {
            writer.write_sample(s).expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }
    cursor.into_inner()
}
