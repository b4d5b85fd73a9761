//! WAV container encoding and decoding

use std::io::{Cursor, Read, Seek, SeekFrom};

use super::{AudioBuffer, DEFAULT_INPUT_SAMPLE_RATE};
use crate::{Error, Result};

/// File name reported to transcription APIs
pub const WAV_FILE_NAME: &str = "audio.wav";

/// An in-memory WAV file, positioned at its start
#[derive(Debug, Clone)]
pub struct WavContainer {
    name: &'static str,
    sample_rate: u32,
    cursor: Cursor<Vec<u8>>,
}

impl WavContainer {
    fn new(sample_rate: u32, bytes: Vec<u8>) -> Self {
        Self {
            name: WAV_FILE_NAME,
            sample_rate,
            cursor: Cursor::new(bytes),
        }
    }

    /// File name for multipart uploads
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Sample rate written into the header
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Entire container, header included
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.cursor.get_ref()
    }

    /// Consume the container and return its bytes
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.cursor.into_inner()
    }

    /// Total size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }
}

impl Read for WavContainer {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for WavContainer {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.cursor.seek(pos)
    }
}

/// Encode an utterance as a mono 16-bit WAV file
///
/// A non-positive sample rate is replaced with 16kHz. If writing fails for
/// the chosen rate, writing is retried once at 16kHz; a second failure is
/// returned to the caller.
///
/// # Errors
///
/// Returns error if the fallback write also fails
pub fn encode_wav(buffer: &AudioBuffer) -> Result<WavContainer> {
    let mut sample_rate = buffer.sample_rate;
    if sample_rate <= 0 {
        tracing::warn!(
            sample_rate,
            fallback = DEFAULT_INPUT_SAMPLE_RATE,
            "invalid sample rate, using default"
        );
        sample_rate = i64::from(DEFAULT_INPUT_SAMPLE_RATE);
    }

    let samples = buffer.samples.to_i16();

    match write_wav(sample_rate, &samples) {
        Ok(container) => Ok(container),
        Err(e) => {
            tracing::error!(error = %e, sample_rate, "wav write failed, retrying at default rate");
            write_wav(i64::from(DEFAULT_INPUT_SAMPLE_RATE), &samples)
        }
    }
}

fn write_wav(sample_rate: i64, samples: &[i16]) -> Result<WavContainer> {
    let sample_rate = u32::try_from(sample_rate)
        .ok()
        // byte rate (rate * 2 for mono 16-bit) must also fit the header field
        .filter(|rate| rate.checked_mul(2).is_some())
        .ok_or_else(|| Error::Audio(format!("sample rate {sample_rate} out of range")))?;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }

    Ok(WavContainer::new(sample_rate, cursor.into_inner()))
}

/// Decode an uploaded WAV file into an utterance
///
/// Accepts 16-bit integer or 32-bit float PCM. Only the first channel of
/// multi-channel input is kept.
///
/// # Errors
///
/// Returns error if the data is not a WAV file or uses another sample format
pub fn decode_wav(data: &[u8]) -> Result<AudioBuffer> {
    let mut reader = hound::WavReader::new(Cursor::new(data))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    tracing::debug!(
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        bits = spec.bits_per_sample,
        "decoding wav upload"
    );

    let sample_rate = i64::from(spec.sample_rate);
    match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => {
            let samples = reader
                .samples::<i16>()
                .step_by(channels)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(AudioBuffer::from_i16(sample_rate, samples))
        }
        (hound::SampleFormat::Float, 32) => {
            let samples = reader
                .samples::<f32>()
                .step_by(channels)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(AudioBuffer::from_f32(sample_rate, samples))
        }
        (format, bits) => Err(Error::Audio(format!(
            "unsupported wav format: {format:?} {bits}-bit"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Samples;

    fn header_rate(bytes: &[u8]) -> u32 {
        u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]])
    }

    #[test]
    fn test_encode_header_layout() {
        let container = encode_wav(&AudioBuffer::from_i16(16000, vec![0; 320])).unwrap();
        let bytes = container.as_bytes();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(bytes.len(), 44 + 640);
        // mono, 16-bit
        assert_eq!(u16::from_le_bytes([bytes[22], bytes[23]]), 1);
        assert_eq!(u16::from_le_bytes([bytes[34], bytes[35]]), 16);
        assert_eq!(header_rate(bytes), 16000);
        assert_eq!(container.name(), "audio.wav");
    }

    #[test]
    fn test_non_positive_rate_uses_default() {
        for rate in [0, -1, -44100, i64::MIN] {
            let container = encode_wav(&AudioBuffer::from_i16(rate, vec![1, 2, 3])).unwrap();
            assert_eq!(container.sample_rate(), 16000);
            assert_eq!(header_rate(container.as_bytes()), 16000);
        }
    }

    #[test]
    fn test_valid_rate_preserved() {
        for rate in [8000, 22050, 44100, 48000] {
            let container = encode_wav(&AudioBuffer::from_i16(rate, vec![7; 10])).unwrap();
            let reader = hound::WavReader::new(Cursor::new(container.into_bytes())).unwrap();
            let spec = reader.spec();
            assert_eq!(i64::from(spec.sample_rate), rate);
            assert_eq!(spec.channels, 1);
            assert_eq!(spec.bits_per_sample, 16);
        }
    }

    #[test]
    fn test_unrepresentable_rate_retries_at_default() {
        let rate = i64::from(u32::MAX) + 1;
        let container = encode_wav(&AudioBuffer::from_i16(rate, vec![5; 4])).unwrap();
        assert_eq!(container.sample_rate(), 16000);
    }

    #[test]
    fn test_byte_rate_overflow_retries_at_default() {
        for rate in [3_000_000_000, i64::from(u32::MAX), i64::from(u32::MAX / 2) + 1] {
            let container = encode_wav(&AudioBuffer::from_i16(rate, vec![1, 2])).unwrap();
            assert_eq!(container.sample_rate(), 16000);

            let reader = hound::WavReader::new(Cursor::new(container.into_bytes())).unwrap();
            assert_eq!(reader.spec().sample_rate, 16000);
            assert_eq!(reader.len(), 2);
        }
    }

    #[test]
    fn test_largest_byte_rate_is_written() {
        let rate = i64::from(u32::MAX / 2);
        let container = encode_wav(&AudioBuffer::from_i16(rate, vec![1, 2])).unwrap();
        assert_eq!(i64::from(container.sample_rate()), rate);
    }

    #[test]
    fn test_container_starts_at_beginning() {
        let mut container = encode_wav(&AudioBuffer::from_i16(16000, vec![0; 4])).unwrap();
        let mut magic = [0u8; 4];
        container.read_exact(&mut magic).unwrap();
        assert_eq!(&magic, b"RIFF");

        container.seek(SeekFrom::Start(0)).unwrap();
        let mut all = Vec::new();
        container.read_to_end(&mut all).unwrap();
        assert_eq!(all.len(), 44 + 8);
    }

    #[test]
    fn test_float_samples_are_cast() {
        let container =
            encode_wav(&AudioBuffer::from_f32(16000, vec![0.5, 100.9, -2.2])).unwrap();
        let mut reader = hound::WavReader::new(Cursor::new(container.into_bytes())).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 100, -2]);
    }

    #[test]
    fn test_decode_takes_first_channel() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in [1i16, -1, 2, -2, 3, -3] {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }

        let buffer = decode_wav(cursor.get_ref()).unwrap();
        assert_eq!(buffer.sample_rate, 48000);
        assert_eq!(buffer.samples, Samples::Int16(vec![1, 2, 3]));
    }

    #[test]
    fn test_decode_float_wav() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            writer.write_sample(0.25f32).unwrap();
            writer.finalize().unwrap();
        }

        let buffer = decode_wav(cursor.get_ref()).unwrap();
        assert_eq!(buffer.samples, Samples::Float32(vec![0.25]));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_wav(b"definitely not a wav file").is_err());
    }
}
