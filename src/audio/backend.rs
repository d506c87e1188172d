use tokio::sync::mpsc;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    pub fn duration_ms(&self) -> u64 {
        let per_second = self.sample_rate as u64 * self.channels.max(1) as u64;
        if per_second == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / per_second
    }
}

/// Configuration for audio capture
#[derive(Debug, Clone)]
pub struct AudioCaptureConfig {
    /// Target sample rate (will downsample if needed)
    pub target_sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub target_channels: u16,
    /// Frame size in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
    /// Deliver frames at the pace they would be spoken
    pub realtime: bool,
}

impl Default for AudioCaptureConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000, // 16kHz for speech-to-text
            target_channels: 1,        // Mono
            buffer_duration_ms: 100,   // 100ms frames
            realtime: true,
        }
    }
}

/// Errors raised by capture and playback
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("Invalid audio payload: {0}")]
    InvalidPayload(String),
    #[error("Failed to decode audio: {0}")]
    Decode(String),
    #[error("Audio I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio capture trait
///
/// Implementations:
/// - File: read a WAV file as if it were the microphone (testing/batch calls)
#[async_trait::async_trait]
pub trait AudioCapture: Send + Sync {
    /// Start capturing audio
    ///
    /// Resolves once capture has begun, with a channel receiver that will
    /// receive audio frames, or fails with a permission/device error.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, AudioError>;

    /// Stop capturing audio. Safe to call when not capturing.
    fn stop(&mut self);

    /// Check if capture is currently running
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Response audio output
///
/// `play_audio` never blocks on playback: clips are queued and played one
/// after another.
pub trait AudioOutput: Send + Sync {
    /// Queue a base64-encoded audio clip for playback
    fn play_audio(&self, base64_data: &str) -> Result<(), AudioError>;

    /// Whether a clip is currently playing
    fn is_playing(&self) -> bool;

    /// Most recent playback error
    fn last_error(&self) -> Option<String>;

    /// Stream of errors raised after a clip was queued
    ///
    /// Handed out once; later calls return `None`.
    fn subscribe_errors(&self) -> Option<mpsc::UnboundedReceiver<String>> {
        None
    }
}

impl<T: AudioOutput + ?Sized> AudioOutput for std::sync::Arc<T> {
    fn play_audio(&self, base64_data: &str) -> Result<(), AudioError> {
        (**self).play_audio(base64_data)
    }

    fn is_playing(&self) -> bool {
        (**self).is_playing()
    }

    fn last_error(&self) -> Option<String> {
        (**self).last_error()
    }

    fn subscribe_errors(&self) -> Option<mpsc::UnboundedReceiver<String>> {
        (**self).subscribe_errors()
    }
}
