pub mod audio;
pub mod config;
pub mod http;
pub mod session;
pub mod transport;

pub use audio::{
    AudioCapture, AudioCaptureConfig, AudioError, AudioFile, AudioFrame, AudioOutput, AudioPlayer,
    ChunkConfig, ChunkEncoder, FileCapture, PlaybackSink, WavFileSink,
};
pub use config::Config;
pub use http::{create_router, AppState, EchoPipeline, VoicePipeline};
pub use session::{
    CallCommand, CallDriver, CallError, CallListener, CallSession, CallStats, CallStatus,
    ConversationMessage, Role, SessionConfig,
};
pub use transport::{ClientMessage, Delivered, ServerMessage, Transport, TransportError, WsTransport};
