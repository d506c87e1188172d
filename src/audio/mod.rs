pub mod backend;
pub mod chunk;
pub mod convert;
pub mod file;
pub mod playback;

pub use backend::{AudioCapture, AudioCaptureConfig, AudioError, AudioFrame, AudioOutput};
pub use chunk::{ChunkConfig, ChunkEncoder};
pub use file::{AudioFile, FileCapture};
pub use playback::{decode_clip, AudioPlayer, DecodedClip, PlaybackSink, WavFileSink};
