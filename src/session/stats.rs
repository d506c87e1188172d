use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::ConversationMessage;

/// Statistics about a call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallStats {
    /// Server-issued session id while the call is active
    pub session_id: Option<String>,

    /// When the call started
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Number of audio chunks sent
    pub chunks_sent: usize,

    /// Number of `ai_response` envelopes received
    pub responses_received: usize,

    /// Final conversation transcript
    pub messages: Vec<ConversationMessage>,
}
