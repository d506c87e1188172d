use base64::Engine;
use tracing::debug;

use super::backend::AudioFrame;
use super::convert::samples_to_pcm_bytes;

/// Chunk configuration
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Audio per chunk in milliseconds (default: 1000)
    pub chunk_duration_ms: u64,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_duration_ms: 1000,
        }
    }
}

/// Groups captured frames into fixed-duration chunks for the `audio_chunk` envelope
///
/// Each chunk is the base64 encoding of little-endian 16-bit PCM.
pub struct ChunkEncoder {
    config: ChunkConfig,
    pending: Vec<i16>,
    pending_ms: u64,
    chunks_emitted: usize,
}

impl ChunkEncoder {
    pub fn new(config: ChunkConfig) -> Self {
        Self {
            config,
            pending: Vec::new(),
            pending_ms: 0,
            chunks_emitted: 0,
        }
    }

    /// Add a frame, returning a chunk once enough audio has accumulated
    pub fn push(&mut self, frame: &AudioFrame) -> Option<String> {
        self.pending.extend_from_slice(&frame.samples);
        self.pending_ms += frame.duration_ms();

        if self.pending_ms >= self.config.chunk_duration_ms {
            self.take_chunk()
        } else {
            None
        }
    }

    /// Emit whatever audio is buffered, if any
    pub fn flush(&mut self) -> Option<String> {
        self.take_chunk()
    }

    /// Drop buffered audio without emitting it
    pub fn reset(&mut self) {
        self.pending.clear();
        self.pending_ms = 0;
    }

    pub fn chunks_emitted(&self) -> usize {
        self.chunks_emitted
    }

    fn take_chunk(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }

        let bytes = samples_to_pcm_bytes(&self.pending);
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);

        debug!(
            "Chunk {} ready: {}ms, {} bytes",
            self.chunks_emitted,
            self.pending_ms,
            bytes.len()
        );

        self.chunks_emitted += 1;
        self.reset();

        Some(encoded)
    }
}
