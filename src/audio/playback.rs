use anyhow::{Context, Result};
use base64::Engine;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::backend::{AudioError, AudioOutput};

/// A response clip decoded to interleaved 16-bit PCM
#[derive(Debug, Clone)]
pub struct DecodedClip {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedClip {
    pub fn duration(&self) -> Duration {
        let per_second = self.sample_rate as u64 * self.channels.max(1) as u64;
        if per_second == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.samples.len() as u64 * 1000 / per_second)
    }
}

/// Decode an encoded audio file (WAV, MP3, OGG, ...) into PCM
pub fn decode_clip(bytes: Vec<u8>) -> Result<DecodedClip, AudioError> {
    let stream = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::Decode(format!("unrecognized format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::Decode("no audio track".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::Decode(format!("unsupported codec: {}", e)))?;

    let mut clip = DecodedClip {
        samples: Vec::new(),
        sample_rate: codec_params.sample_rate.unwrap_or(16000),
        channels: codec_params.channels.map(|c| c.count() as u16).unwrap_or(1),
    };

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(AudioError::Decode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                clip.sample_rate = spec.rate;
                clip.channels = spec.channels.count() as u16;

                let mut buffer = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                clip.samples.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet: {}", e);
            }
            Err(e) => return Err(AudioError::Decode(e.to_string())),
        }
    }

    Ok(clip)
}

/// Destination for decoded response audio
#[async_trait::async_trait]
pub trait PlaybackSink: Send {
    /// Play one clip, returning when it has finished
    async fn play(&mut self, clip: DecodedClip) -> Result<()>;

    fn name(&self) -> &str;
}

/// Sink that writes each clip to `response-NNN.wav`
///
/// With `realtime` set, `play` also waits for the clip's duration so the
/// queue behaves like a speaker.
pub struct WavFileSink {
    output_dir: PathBuf,
    realtime: bool,
    clip_index: usize,
}

impl WavFileSink {
    pub fn new(output_dir: impl Into<PathBuf>, realtime: bool) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir).context("Failed to create playback directory")?;

        info!("Response audio will be written to {}", output_dir.display());

        Ok(Self {
            output_dir,
            realtime,
            clip_index: 0,
        })
    }

    pub fn clips_written(&self) -> usize {
        self.clip_index
    }
}

#[async_trait::async_trait]
impl PlaybackSink for WavFileSink {
    async fn play(&mut self, clip: DecodedClip) -> Result<()> {
        let path = self
            .output_dir
            .join(format!("response-{:03}.wav", self.clip_index));

        let spec = hound::WavSpec {
            channels: clip.channels,
            sample_rate: clip.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", path))?;
        for &sample in &clip.samples {
            writer
                .write_sample(sample)
                .context("Failed to write sample to WAV")?;
        }
        writer.finalize().context("Failed to finalize WAV file")?;

        self.clip_index += 1;

        let duration = clip.duration();
        info!(
            "Playing response clip {} ({:.1}s) -> {}",
            self.clip_index - 1,
            duration.as_secs_f64(),
            path.display()
        );

        if self.realtime {
            tokio::time::sleep(duration).await;
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}

/// Serialized playback queue
///
/// Clips are decoded and handed to the sink strictly one at a time in the
/// order they were queued, so responses never overlap. Failures inside the
/// playback task are published on the stream from
/// [`AudioOutput::subscribe_errors`].
pub struct AudioPlayer {
    queue: mpsc::UnboundedSender<Vec<u8>>,
    playing: Arc<AtomicBool>,
    pending: Arc<AtomicUsize>,
    idle: Arc<Notify>,
    last_error: Arc<Mutex<Option<String>>>,
    errors: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    handle: JoinHandle<()>,
}

impl AudioPlayer {
    pub fn new(mut sink: Box<dyn PlaybackSink>) -> Self {
        let (queue, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (error_tx, error_rx) = mpsc::unbounded_channel::<String>();
        let playing = Arc::new(AtomicBool::new(false));
        let pending = Arc::new(AtomicUsize::new(0));
        let idle = Arc::new(Notify::new());
        let last_error = Arc::new(Mutex::new(None));

        let task_playing = Arc::clone(&playing);
        let task_pending = Arc::clone(&pending);
        let task_idle = Arc::clone(&idle);
        let task_error = Arc::clone(&last_error);

        let handle = tokio::spawn(async move {
            debug!("Playback task started ({})", sink.name());

            while let Some(bytes) = rx.recv().await {
                task_playing.store(true, Ordering::SeqCst);

                let result = match decode_clip(bytes) {
                    Ok(clip) => sink.play(clip).await.map_err(|e| format!("{:#}", e)),
                    Err(e) => Err(e.to_string()),
                };

                if let Err(message) = result {
                    error!("Playback failed: {}", message);
                    if let Ok(mut slot) = task_error.lock() {
                        *slot = Some(message.clone());
                    }
                    // Nobody may be listening
                    let _ = error_tx.send(message);
                }

                task_playing.store(false, Ordering::SeqCst);
                if task_pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                    task_idle.notify_waiters();
                }
            }

            debug!("Playback task stopped");
        });

        Self {
            queue,
            playing,
            pending,
            idle,
            last_error,
            errors: Mutex::new(Some(error_rx)),
            handle,
        }
    }

    /// Clips queued or playing
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Wait until every queued clip has finished playing
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.pending() == 0 || self.handle.is_finished() {
                return;
            }
            notified.await;
        }
    }

    fn record_error(&self, message: String) {
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = Some(message);
        }
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl AudioOutput for AudioPlayer {
    fn play_audio(&self, base64_data: &str) -> Result<(), AudioError> {
        let bytes = match base64::engine::general_purpose::STANDARD.decode(base64_data) {
            Ok(bytes) => bytes,
            Err(e) => {
                let err = AudioError::InvalidPayload(e.to_string());
                self.record_error(err.to_string());
                return Err(err);
            }
        };

        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.queue.send(bytes).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            let err = AudioError::DeviceUnavailable("playback stopped".to_string());
            self.record_error(err.to_string());
            return Err(err);
        }

        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|slot| slot.clone())
    }

    fn subscribe_errors(&self) -> Option<mpsc::UnboundedReceiver<String>> {
        self.errors.lock().ok().and_then(|mut slot| slot.take())
    }
}
