//! Re-chunking of streamed speech audio into playback frames
//!
//! TTS APIs deliver audio in whatever chunk sizes the network produces. The
//! [`Rechunker`] holds bytes back until a smooth start is possible, then cuts
//! the stream into fixed-size frames that never split a 16-bit sample.

use bytes::BytesMut;
use futures::{Stream, StreamExt};

use super::{OUTPUT_SAMPLE_RATE, PlaybackFrame};
use crate::Result;

/// Bytes per emitted frame in steady state (1024 samples)
pub const FRAME_BYTES: usize = 2048;

/// Bytes to accumulate before the first frame during startup
pub const STARTUP_BYTES: usize = 8192;

/// Number of upstream chunks covered by the startup window
pub const STARTUP_CHUNKS: usize = 3;

/// Buffering parameters for a [`Rechunker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RechunkPolicy {
    /// Target frame size in bytes (at least 2)
    pub frame_bytes: usize,
    /// Hold output until this many bytes are buffered...
    pub startup_bytes: usize,
    /// ...or this many non-empty chunks have arrived
    pub startup_chunks: usize,
    /// Sample rate tagged on every frame
    pub sample_rate: u32,
}

impl Default for RechunkPolicy {
    fn default() -> Self {
        Self {
            frame_bytes: FRAME_BYTES,
            startup_bytes: STARTUP_BYTES,
            startup_chunks: STARTUP_CHUNKS,
            sample_rate: OUTPUT_SAMPLE_RATE,
        }
    }
}

/// Incremental byte-to-frame converter for one synthesis stream
#[derive(Debug)]
pub struct Rechunker {
    policy: RechunkPolicy,
    buffer: BytesMut,
    chunks_seen: usize,
}

impl Default for Rechunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Rechunker {
    /// Create a rechunker with the default policy
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(RechunkPolicy::default())
    }

    /// Create a rechunker with a custom policy
    #[must_use]
    pub fn with_policy(mut policy: RechunkPolicy) -> Self {
        // a one-byte frame can never hold a whole sample
        policy.frame_bytes = policy.frame_bytes.max(2);
        Self {
            policy,
            buffer: BytesMut::with_capacity(policy.startup_bytes.max(policy.frame_bytes)),
            chunks_seen: 0,
        }
    }

    /// Active policy
    #[must_use]
    pub const fn policy(&self) -> &RechunkPolicy {
        &self.policy
    }

    /// Non-empty chunks received so far
    #[must_use]
    pub const fn chunks_seen(&self) -> usize {
        self.chunks_seen
    }

    /// Bytes buffered but not yet emitted
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Feed one upstream chunk, returning any frames that are now ready
    ///
    /// Empty chunks are ignored and do not count toward the startup window.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<PlaybackFrame> {
        if chunk.is_empty() {
            return Vec::new();
        }

        self.buffer.extend_from_slice(chunk);
        self.chunks_seen += 1;

        if self.chunks_seen <= self.policy.startup_chunks
            && self.buffer.len() < self.policy.startup_bytes
        {
            return Vec::new();
        }

        let mut frames = Vec::new();
        while self.buffer.len() >= self.policy.frame_bytes {
            // an odd frame size leaves its last byte at the front of the buffer
            let take = self.policy.frame_bytes - self.policy.frame_bytes % 2;
            let slice = self.buffer.split_to(take);
            frames.push(PlaybackFrame::from_le_bytes(self.policy.sample_rate, &slice));
        }
        frames
    }

    /// Flush whatever is left once the upstream stream has ended
    ///
    /// Returns `None` if fewer than 2 bytes remain. A trailing odd byte is
    /// dropped.
    #[must_use]
    pub fn finish(self) -> Option<PlaybackFrame> {
        let len = self.buffer.len();
        if len < 2 {
            if len == 1 {
                tracing::debug!("dropping single trailing byte at end of stream");
            }
            return None;
        }

        if len % 2 != 0 {
            tracing::debug!(pending = len, "dropping odd trailing byte at end of stream");
        }

        let even = len - len % 2;
        Some(PlaybackFrame::from_le_bytes(
            self.policy.sample_rate,
            &self.buffer[..even],
        ))
    }
}

/// Adapt a stream of byte chunks into a stream of playback frames
///
/// The returned stream ends after the final drained frame. An upstream error
/// is passed through as the last item.
pub fn rechunk_stream<S, B>(
    upstream: S,
    policy: RechunkPolicy,
) -> impl Stream<Item = Result<PlaybackFrame>>
where
    S: Stream<Item = Result<B>>,
    B: AsRef<[u8]>,
{
    async_stream::try_stream! {
        let mut rechunker = Rechunker::with_policy(policy);
        let mut upstream = std::pin::pin!(upstream);
        let mut frames_out = 0usize;

        while let Some(chunk) = upstream.next().await {
            let chunk = chunk?;
            for frame in rechunker.push(chunk.as_ref()) {
                frames_out += 1;
                yield frame;
            }
        }

        let chunks_in = rechunker.chunks_seen();
        let frame_bytes = rechunker.policy().frame_bytes;
        if let Some(frame) = rechunker.finish() {
            frames_out += 1;
            yield frame;
        }

        tracing::debug!(chunks_in, frames_out, frame_bytes, "speech stream drained");
    }
}
