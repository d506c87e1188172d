use anyhow::{Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::backend::{AudioCapture, AudioCaptureConfig, AudioError, AudioFrame};
use super::convert::to_target_format;

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }
}

/// Capture backend that plays a WAV file in place of a microphone
pub struct FileCapture {
    path: PathBuf,
    config: AudioCaptureConfig,
    capturing: Arc<AtomicBool>,
}

impl FileCapture {
    pub fn new(path: impl Into<PathBuf>, config: AudioCaptureConfig) -> Self {
        Self {
            path: path.into(),
            config,
            capturing: Arc::new(AtomicBool::new(false)),
        }
    }

    fn load(&self) -> Result<AudioFile, AudioError> {
        if let Err(e) = std::fs::metadata(&self.path) {
            return Err(match e.kind() {
                std::io::ErrorKind::PermissionDenied => {
                    AudioError::PermissionDenied(self.path.display().to_string())
                }
                _ => AudioError::DeviceUnavailable(format!("{}: {}", self.path.display(), e)),
            });
        }

        AudioFile::open(&self.path).map_err(|e| AudioError::DeviceUnavailable(format!("{:#}", e)))
    }
}

#[async_trait::async_trait]
impl AudioCapture for FileCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, AudioError> {
        if self.capturing.load(Ordering::SeqCst) {
            // Restarting replaces the previous stream
            self.stop();
        }

        let audio = self.load()?;

        let channels = audio.channels.max(1);
        let samples_per_frame = (audio.sample_rate as u64 * self.config.buffer_duration_ms / 1000)
            .max(1) as usize
            * channels as usize;

        let (tx, rx) = mpsc::channel(100);

        // Each stream gets its own flag so a stop/start cycle cannot revive an old task
        let capturing = Arc::new(AtomicBool::new(true));
        self.capturing = Arc::clone(&capturing);

        let config = self.config.clone();
        let name = self.path.display().to_string();

        tokio::spawn(async move {
            let frame_duration = Duration::from_millis(config.buffer_duration_ms);
            let mut timestamp_ms = 0u64;

            for samples in audio.samples.chunks(samples_per_frame) {
                if !capturing.load(Ordering::SeqCst) {
                    break;
                }

                let frame = AudioFrame {
                    samples: samples.to_vec(),
                    sample_rate: audio.sample_rate,
                    channels,
                    timestamp_ms,
                };
                timestamp_ms += frame.duration_ms();

                let frame = to_target_format(frame, config.target_sample_rate, config.target_channels);

                if tx.send(frame).await.is_err() {
                    break;
                }

                if config.realtime {
                    tokio::time::sleep(frame_duration).await;
                }
            }

            capturing.store(false, Ordering::SeqCst);
            debug!("File capture finished: {} ({}ms)", name, timestamp_ms);
        });

        info!("File capture started: {}", self.path.display());

        Ok(rx)
    }

    fn stop(&mut self) {
        if self.capturing.swap(false, Ordering::SeqCst) {
            info!("File capture stopped: {}", self.path.display());
        }
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "file"
    }
}
