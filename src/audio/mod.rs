//! Audio shaping for the voice pipeline
//!
//! Microphone samples go out as a WAV container (see [`wav`]); synthesized
//! speech comes back as a byte stream that [`rechunk`] turns into fixed-size
//! playback frames.

pub mod rechunk;
pub mod wav;

pub use rechunk::{RechunkPolicy, Rechunker, rechunk_stream};
pub use wav::{WavContainer, decode_wav, encode_wav};

/// Sample rate used when the captured rate is unusable (16kHz for speech)
pub const DEFAULT_INPUT_SAMPLE_RATE: u32 = 16000;

/// Sample rate of synthesized speech frames
pub const OUTPUT_SAMPLE_RATE: u32 = 24000;

/// Raw samples as delivered by the capture side
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    /// Signed 16-bit PCM
    Int16(Vec<i16>),
    /// 32-bit float PCM
    Float32(Vec<f32>),
}

impl Samples {
    /// Number of samples
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int16(s) => s.len(),
            Self::Float32(s) => s.len(),
        }
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cast to 16-bit integers
    ///
    /// Floats are cast as-is (truncated toward zero, saturating), not rescaled.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_i16(&self) -> Vec<i16> {
        match self {
            Self::Int16(s) => s.clone(),
            Self::Float32(s) => s.iter().map(|&v| v as i16).collect(),
        }
    }
}

/// One captured utterance: a sample rate and mono samples
///
/// The rate is signed so that bogus rates from the capture side can be
/// represented; the encoder substitutes [`DEFAULT_INPUT_SAMPLE_RATE`].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: i64,
    pub samples: Samples,
}

impl AudioBuffer {
    /// Create a buffer of 16-bit samples
    #[must_use]
    pub const fn from_i16(sample_rate: i64, samples: Vec<i16>) -> Self {
        Self {
            sample_rate,
            samples: Samples::Int16(samples),
        }
    }

    /// Create a buffer of float samples
    #[must_use]
    pub const fn from_f32(sample_rate: i64, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            samples: Samples::Float32(samples),
        }
    }
}

/// A single-channel block of playback samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackFrame {
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

impl PlaybackFrame {
    /// Build a frame from little-endian 16-bit sample bytes
    ///
    /// `bytes` must have even length; a trailing odd byte is ignored.
    #[must_use]
    pub fn from_le_bytes(sample_rate: u32, bytes: &[u8]) -> Self {
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self {
            sample_rate,
            samples,
        }
    }

    /// Frame shape as (channels, samples)
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (1, self.samples.len())
    }

    /// Size of the frame in bytes
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.samples.len() * 2
    }

    /// Serialize back to little-endian bytes
    #[must_use]
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}
