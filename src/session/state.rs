use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Welcome text used when `call_started` carries no message
pub const DEFAULT_WELCOME: &str = "Hello! I'm your AI assistant. How can I help you today?";

/// Goodbye text used when `call_ended` carries no message
pub const DEFAULT_GOODBYE: &str = "Thank you for calling. Have a great day!";

/// Error text used when an `error` envelope carries no message
pub const DEFAULT_ERROR: &str = "An unknown error occurred";

/// Call lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CallStatus {
    /// No call in progress
    #[default]
    #[serde(rename = "disconnected")]
    Idle,
    /// `start_call` sent (or about to be), waiting for `call_started`
    #[serde(rename = "connecting")]
    Connecting,
    /// Server confirmed the call
    #[serde(rename = "connected")]
    Active,
}

/// Who said a conversation line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One line of the call transcript, in display order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// RFC 3339 timestamp of when the line was added
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>, confidence: Option<f32>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now().to_rfc3339(),
            confidence: confidence.map(|c| c.clamp(0.0, 1.0)),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, None)
    }
}

/// The two independent error slots surfaced to the UI
///
/// Neither source clears the other; both may be set at once.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallErrors {
    pub transport: Option<String>,
    pub audio: Option<String>,
}

impl CallErrors {
    pub fn is_empty(&self) -> bool {
        self.transport.is_none() && self.audio.is_none()
    }
}
