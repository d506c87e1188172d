//! Voice pipeline behind the call endpoint
//!
//! Audio chunk → speech-to-text → response → text-to-speech. Vendor
//! integrations plug in through [`VoicePipeline`]; [`EchoPipeline`] is the
//! offline implementation used for local runs and tests.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Cursor;
use tracing::{info, warn};

/// Conversation entries kept per session
pub const MAX_HISTORY: usize = 20;

/// Prompt sent back when the transcription is not trustworthy
pub const CLARIFICATION: &str =
    "I'm sorry, I didn't catch that clearly. Could you please repeat your question?";

/// Sent when the pipeline fails outright
pub const APOLOGY: &str =
    "I'm sorry, I encountered a technical issue. Please try again or speak with a human agent.";

/// Result of processing one audio chunk
#[derive(Debug, Clone, Default)]
pub struct VoiceResponse {
    /// Text to show in the conversation, if any
    pub transcript: Option<String>,
    /// Encoded audio file to play back, if any
    pub audio: Option<Vec<u8>>,
    /// Transcription confidence (0.0 to 1.0)
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub role: &'static str,
    pub content: String,
}

/// Per-call context carried between chunks
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub history: Vec<HistoryEntry>,
    pub interactions: usize,
}

impl SessionContext {
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            started_at: Utc::now(),
            history: Vec::new(),
            interactions: 0,
        }
    }

    /// Record one exchange, keeping only the newest entries
    pub fn record(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.history.push(HistoryEntry {
            role: "user",
            content: user.into(),
        });
        self.history.push(HistoryEntry {
            role: "assistant",
            content: assistant.into(),
        });

        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }

        self.interactions += 1;
    }
}

#[async_trait::async_trait]
pub trait VoicePipeline: Send + Sync {
    /// Process 16-bit mono PCM captured by the client
    async fn process_audio_chunk(
        &self,
        pcm: &[i16],
        context: &mut SessionContext,
    ) -> Result<VoiceResponse>;

    async fn health_check(&self) -> bool;

    fn name(&self) -> &str;
}

/// Run the pipeline and apply the confidence threshold
///
/// Low-confidence transcriptions are replaced by a clarification prompt;
/// pipeline failures become an apology.
pub async fn respond(
    pipeline: &dyn VoicePipeline,
    pcm: &[i16],
    context: &mut SessionContext,
    min_confidence: f32,
) -> VoiceResponse {
    match pipeline.process_audio_chunk(pcm, context).await {
        Ok(response) if response.transcript.is_some() && response.confidence < min_confidence => {
            warn!(
                "Low confidence transcription ({:.2}) for session {}",
                response.confidence, context.session_id
            );
            VoiceResponse {
                transcript: Some(CLARIFICATION.to_string()),
                audio: None,
                confidence: response.confidence,
            }
        }
        Ok(response) => response,
        Err(e) => {
            warn!("Voice pipeline failed for session {}: {:#}", context.session_id, e);
            VoiceResponse {
                transcript: Some(APOLOGY.to_string()),
                audio: None,
                confidence: 0.0,
            }
        }
    }
}

/// Offline pipeline that describes what it heard and plays it back
///
/// Confidence is derived from the chunk's RMS level; silent chunks produce
/// neither a transcript nor audio.
pub struct EchoPipeline {
    sample_rate: u32,
    silence_rms: f32,
    echo_audio: bool,
}

impl EchoPipeline {
    pub fn new(sample_rate: u32, echo_audio: bool) -> Self {
        Self {
            sample_rate,
            silence_rms: 100.0,
            echo_audio,
        }
    }
}

impl Default for EchoPipeline {
    fn default() -> Self {
        Self::new(16000, true)
    }
}

#[async_trait::async_trait]
impl VoicePipeline for EchoPipeline {
    async fn process_audio_chunk(
        &self,
        pcm: &[i16],
        context: &mut SessionContext,
    ) -> Result<VoiceResponse> {
        let rms = rms_level(pcm);
        if rms < self.silence_rms {
            return Ok(VoiceResponse::default());
        }

        let seconds = pcm.len() as f64 / self.sample_rate as f64;
        let transcript = format!("I heard {:.1} seconds of audio.", seconds);
        let confidence = (rms / 3000.0).min(1.0);

        let audio = if self.echo_audio {
            Some(encode_wav(pcm, self.sample_rate)?)
        } else {
            None
        };

        context.record(format!("<{:.1}s of audio>", seconds), transcript.clone());

        info!(
            "Echoed {:.1}s for session {} (confidence {:.2})",
            seconds, context.session_id, confidence
        );

        Ok(VoiceResponse {
            transcript: Some(transcript),
            audio,
            confidence,
        })
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "echo"
    }
}

fn rms_level(pcm: &[i16]) -> f32 {
    if pcm.is_empty() {
        return 0.0;
    }
    let sum: f64 = pcm.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / pcm.len() as f64).sqrt() as f32
}

/// Encode mono PCM as an in-memory WAV file
pub fn encode_wav(pcm: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut bytes = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)
            .context("Failed to create WAV writer")?;
        for &sample in pcm {
            writer
                .write_sample(sample)
                .context("Failed to write sample to WAV")?;
        }
        writer.finalize().context("Failed to finalize WAV")?;
    }

    Ok(bytes)
}
