use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::audio::AudioCaptureConfig;
use crate::session::SessionConfig;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub client: ClientConfig,
    pub audio: AudioConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "voice-call".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base WebSocket URL; the client id is appended as the last path segment
    pub server_url: String,
    /// Client id used in the socket path (random when unset)
    pub client_id: Option<String>,
    pub hangup_grace_ms: u64,
    pub end_ack_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8000/ws".to_string(),
            client_id: None,
            hangup_grace_ms: 3000,
            end_ack_timeout_ms: 2000,
        }
    }
}

impl ClientConfig {
    /// Full socket URL for this client
    pub fn call_url(&self) -> String {
        let client_id = self
            .client_id
            .clone()
            .unwrap_or_else(|| format!("client-{}", uuid::Uuid::new_v4()));
        format!("{}/{}", self.server_url.trim_end_matches('/'), client_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_duration_ms: u64,
    pub chunk_duration_ms: u64,
    /// Pace file capture and playback in real time
    pub realtime: bool,
    /// Where response clips are written
    pub playback_path: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            buffer_duration_ms: 100,
            chunk_duration_ms: 1000,
            realtime: true,
            playback_path: "recordings/responses".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Transcriptions below this confidence get a clarification prompt
    pub min_confidence: f32,
    pub greeting: String,
    pub farewell: String,
    /// Echo pipeline plays the caller's audio back
    pub echo_audio: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8000,
            min_confidence: 0.7,
            greeting: "Hello! I'm your AI assistant. How can I help you today?".to_string(),
            farewell: "Thank you for calling. Have a great day!".to_string(),
            echo_audio: true,
        }
    }
}

impl Config {
    /// Load from a config file (extension optional) with
    /// `VOICE_CALL__SECTION__KEY` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("VOICE_CALL").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn capture_config(&self) -> AudioCaptureConfig {
        AudioCaptureConfig {
            target_sample_rate: self.audio.sample_rate,
            target_channels: self.audio.channels,
            buffer_duration_ms: self.audio.buffer_duration_ms,
            realtime: self.audio.realtime,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            chunk_duration: Duration::from_millis(self.audio.chunk_duration_ms),
            hangup_grace: Duration::from_millis(self.client.hangup_grace_ms),
            end_ack_timeout: Duration::from_millis(self.client.end_ack_timeout_ms),
        }
    }
}
