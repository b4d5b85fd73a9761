//! Turn endpoint: one utterance in, NDJSON event stream out

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::{ApiState, WireEvent, limit_turn};
use crate::audio::AudioBuffer;
use crate::services::ChatMessage;

/// Build voice router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/turn", post(turn))
        .with_state(state)
}

/// Samples as sent by the client
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RequestSamples {
    Int16(Vec<i16>),
    Float32(Vec<f32>),
}

/// Turn request
#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub sample_rate: i64,
    pub samples: RequestSamples,
    /// Conversation from earlier turns
    #[serde(default)]
    pub history: Option<Vec<ChatMessage>>,
}

impl RequestSamples {
    fn into_audio(self, sample_rate: i64) -> AudioBuffer {
        match self {
            Self::Int16(s) => AudioBuffer::from_i16(sample_rate, s),
            Self::Float32(s) => AudioBuffer::from_f32(sample_rate, s),
        }
    }
}

/// Run one turn and stream its events as newline-delimited JSON
async fn turn(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<TurnRequest>,
) -> Result<Response, TurnError> {
    let permit = state.try_reserve_turn().ok_or(TurnError::Busy)?;

    let TurnRequest {
        sample_rate,
        samples,
        history,
    } = request;
    let audio = samples.into_audio(sample_rate);
    tracing::debug!(
        sample_rate = audio.sample_rate,
        samples = audio.samples.len(),
        "turn requested"
    );

    let events = state
        .pipeline
        .run(&audio, history)
        .map_err(|e| {
            tracing::error!(error = %e, "failed to encode utterance");
            TurnError::EncodingFailed(e.to_string())
        })?;

    let lines = limit_turn(events, permit, state.time_limit).filter_map(|event| async move {
        ndjson_line(&WireEvent::from(event)).map(Ok::<_, Infallible>)
    });

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(lines),
    )
        .into_response())
}

/// Serialize one value as a newline-terminated JSON line
///
/// Values that fail to serialize are logged and skipped.
fn ndjson_line<T: Serialize>(value: &T) -> Option<Bytes> {
    match serde_json::to_vec(value) {
        Ok(mut line) => {
            line.push(b'\n');
            Some(Bytes::from(line))
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize turn event, skipping");
            None
        }
    }
}

/// Turn API errors
#[derive(Debug)]
pub enum TurnError {
    Busy,
    EncodingFailed(String),
}

impl IntoResponse for TurnError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::Busy => (
                StatusCode::SERVICE_UNAVAILABLE,
                "busy",
                "too many turns in progress".to_string(),
            ),
            Self::EncodingFailed(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "encoding_failed", msg),
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}
