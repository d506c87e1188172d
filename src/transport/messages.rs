use serde::{Deserialize, Serialize};

/// Envelope sent from the client to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask the backend to open a call session
    StartCall,
    /// Hang up the current call
    EndCall,
    /// One chunk of captured audio
    AudioChunk {
        /// Base64-encoded 16-bit little-endian PCM
        data: String,
    },
}

impl ClientMessage {
    /// Wire name of the envelope type, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::StartCall => "start_call",
            ClientMessage::EndCall => "end_call",
            ClientMessage::AudioChunk { .. } => "audio_chunk",
        }
    }
}

/// Envelope sent from the backend to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    CallStarted {
        session_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        /// Base64-encoded audio file (WAV, MP3, ...)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio_data: Option<String>,
    },
    AiResponse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transcript: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio_data: Option<String>,
        /// Confidence score (0.0 to 1.0), if available
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f32>,
    },
    CallEnded {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl ServerMessage {
    /// Wire name of the envelope type, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::CallStarted { .. } => "call_started",
            ServerMessage::AiResponse { .. } => "ai_response",
            ServerMessage::CallEnded { .. } => "call_ended",
            ServerMessage::Error { .. } => "error",
        }
    }
}

/// An inbound envelope stamped with its arrival sequence number
///
/// Sequence numbers are monotonic per connection, so a consumer can tell two
/// identical envelopes apart and process each exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivered {
    pub seq: u64,
    pub message: ServerMessage,
}
