//! `OpenAI` speech-to-text, responses and text-to-speech client

use async_trait::async_trait;
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{ChatMessage, ResponseGenerator, SpeechStream, SpeechSynthesizer, Transcriber};
use crate::audio::WavContainer;
use crate::{Error, Result};

/// Default system instructions for the assistant
pub const DEFAULT_INSTRUCTIONS: &str = "\
You are a helpful AI assistant with a cheerful and friendly personality. \
Always respond in a warm, upbeat tone while keeping your answers simple and easy to understand. \
Use encouraging language and be genuinely enthusiastic about helping.

Guidelines:
- Keep responses concise and straightforward
- Use positive, uplifting language
- Sound genuinely excited to help
- always aware with conversation history
";

/// Models and endpoint used by [`OpenAiClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiSettings {
    /// API base URL, without trailing slash
    pub base_url: String,
    /// Transcription model (e.g. "whisper-1")
    pub stt_model: String,
    /// Responses model (e.g. "gpt-5")
    pub llm_model: String,
    /// Reasoning effort hint; empty to omit
    pub reasoning_effort: String,
    /// Speech model (e.g. "gpt-4o-mini-tts")
    pub tts_model: String,
    /// Voice identifier (e.g. "sage")
    pub voice: String,
    /// Audio container requested from the speech endpoint
    pub response_format: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            stt_model: "whisper-1".to_string(),
            llm_model: "gpt-5".to_string(),
            reasoning_effort: "low".to_string(),
            tts_model: "gpt-4o-mini-tts".to_string(),
            voice: "sage".to_string(),
            response_format: "wav".to_string(),
        }
    }
}

/// Client for the hosted `OpenAI` audio and responses APIs
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: SecretString,
    settings: OpenAiSettings,
}

impl OpenAiClient {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: SecretString, settings: OpenAiSettings) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            settings,
        })
    }

    /// Active settings
    #[must_use]
    pub const fn settings(&self) -> &OpenAiSettings {
        &self.settings
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.settings.base_url.trim_end_matches('/'))
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key.expose_secret())
    }
}

/// Response from the transcription API
#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[async_trait]
impl Transcriber for OpenAiClient {
    async fn transcribe(&self, audio: &WavContainer) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.as_bytes().to_vec())
                    .file_name(audio.name())
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.settings.stt_model.clone());

        let response = self
            .client
            .post(self.url("audio/transcriptions"))
            .header("Authorization", self.bearer())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "transcription request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(Error::Stt(format!("transcription API error {status}: {body}")));
        }

        let result: TranscriptionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse transcription response");
            e
        })?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<Reasoning<'a>>,
    instructions: &'a str,
    input: &'a [ChatMessage],
}

#[derive(Serialize)]
struct Reasoning<'a> {
    effort: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl ResponsesResponse {
    /// Concatenated text of all message outputs
    fn into_text(self) -> String {
        if let Some(text) = self.output_text {
            return text;
        }

        self.output
            .into_iter()
            .filter(|item| item.kind == "message")
            .flat_map(|item| item.content)
            .filter(|part| part.kind == "output_text")
            .filter_map(|part| part.text)
            .collect()
    }
}

#[async_trait]
impl ResponseGenerator for OpenAiClient {
    async fn generate(&self, instructions: &str, messages: &[ChatMessage]) -> Result<String> {
        tracing::debug!(
            model = %self.settings.llm_model,
            messages = messages.len(),
            "requesting response"
        );

        let effort = self.settings.reasoning_effort.as_str();
        let request = ResponsesRequest {
            model: &self.settings.llm_model,
            reasoning: (!effort.is_empty()).then_some(Reasoning { effort }),
            instructions,
            input: messages,
        };

        let response = self
            .client
            .post(self.url("responses"))
            .header("Authorization", self.bearer())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("responses API error {status}: {body}")));
        }

        let result: ResponsesResponse = response.json().await?;
        let text = result.into_text();
        if text.is_empty() {
            return Err(Error::Llm("response contained no text output".to_string()));
        }

        Ok(text)
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiClient {
    async fn synthesize_stream(&self, text: &str, instructions: &str) -> Result<SpeechStream> {
        #[derive(Serialize)]
        struct SpeechRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            instructions: &'a str,
            response_format: &'a str,
        }

        let request = SpeechRequest {
            model: &self.settings.tts_model,
            input: text,
            voice: &self.settings.voice,
            instructions,
            response_format: &self.settings.response_format,
        };

        let response = self
            .client
            .post(self.url("audio/speech"))
            .header("Authorization", self.bearer())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("speech API error {status}: {body}")));
        }

        Ok(Box::pin(response.bytes_stream().map(|chunk| chunk.map_err(Error::from))))
    }
}
