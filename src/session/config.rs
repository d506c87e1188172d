use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for driving one call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Audio per `audio_chunk` envelope
    /// Default: 1000ms
    pub chunk_duration: Duration,

    /// How long to keep listening for responses after capture runs out
    /// before hanging up automatically
    pub hangup_grace: Duration,

    /// How long to wait for `call_ended` after hanging up locally
    pub end_ack_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_duration: Duration::from_millis(1000),
            hangup_grace: Duration::from_secs(3),
            end_ack_timeout: Duration::from_secs(2),
        }
    }
}
