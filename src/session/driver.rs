use std::collections::VecDeque;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio::time::{sleep, Sleep};
use tracing::{debug, info, warn};

use super::call::{CallError, CallSession};
use super::config::SessionConfig;
use super::state::CallStatus;
use crate::audio::{AudioFrame, ChunkConfig, ChunkEncoder};
use crate::transport::{Delivered, ServerMessage};

/// User actions delivered to a running call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallCommand {
    EndCall,
    ToggleRecording,
}

/// Runs one call to completion
///
/// Inbound envelopes, capture frames, commands, and timers are handled one
/// at a time from a single loop, which is the only place the session is
/// mutated.
pub struct CallDriver {
    session: CallSession,
    inbound: mpsc::Receiver<Delivered>,
    commands: mpsc::Receiver<CallCommand>,
    encoder: ChunkEncoder,
    /// Chunks encoded before the server confirmed the call
    backlog: VecDeque<String>,
    config: SessionConfig,
}

impl CallDriver {
    pub fn new(
        session: CallSession,
        inbound: mpsc::Receiver<Delivered>,
        commands: mpsc::Receiver<CallCommand>,
        config: SessionConfig,
    ) -> Self {
        let encoder = ChunkEncoder::new(ChunkConfig {
            chunk_duration_ms: config.chunk_duration.as_millis() as u64,
        });

        Self {
            session,
            inbound,
            commands,
            encoder,
            backlog: VecDeque::new(),
            config,
        }
    }

    /// Place the call and process events until it is over
    ///
    /// Returns the session so its final conversation and stats can be read.
    pub async fn run(mut self) -> Result<CallSession, CallError> {
        let mut frames = Some(self.session.start_call().await?);
        let mut playback_errors = self.session.take_playback_errors();
        let mut capture_done = false;
        let mut hanging_up = false;
        let mut commands_open = true;
        let mut hangup_timer: Option<Pin<Box<Sleep>>> = None;
        let mut ack_timer: Option<Pin<Box<Sleep>>> = None;

        loop {
            tokio::select! {
                delivered = self.inbound.recv() => {
                    let Some(delivered) = delivered else {
                        warn!("Call server connection closed");
                        if self.session.status() != CallStatus::Idle {
                            self.session.end_call();
                        }
                        break;
                    };

                    let terminal = matches!(
                        delivered.message,
                        ServerMessage::CallEnded { .. } | ServerMessage::Error { .. }
                    );

                    self.session.handle_message(delivered);

                    if terminal {
                        break;
                    }

                    if self.session.status() == CallStatus::Active {
                        self.drain_backlog();
                        if capture_done && hangup_timer.is_none() && !hanging_up {
                            hangup_timer = Some(Box::pin(sleep(self.config.hangup_grace)));
                        }
                    }
                }

                frame = next_frame(&mut frames) => {
                    match frame {
                        Some(frame) => self.on_frame(&frame),
                        None => {
                            frames = None;
                            capture_done = true;
                            if let Some(chunk) = self.encoder.flush() {
                                self.queue_chunk(chunk);
                            }
                            if self.session.status() == CallStatus::Active && !hanging_up {
                                info!("Capture finished, hanging up in {:?}", self.config.hangup_grace);
                                hangup_timer = Some(Box::pin(sleep(self.config.hangup_grace)));
                            }
                        }
                    }
                }

                command = self.commands.recv(), if commands_open => {
                    match command {
                        Some(CallCommand::EndCall) => {
                            frames = None;
                            hangup_timer = None;
                            hanging_up = true;
                            ack_timer = Some(Box::pin(sleep(self.config.end_ack_timeout)));
                            self.hang_up();
                            if !self.session.is_connected() {
                                break;
                            }
                        }
                        Some(CallCommand::ToggleRecording) => {
                            if !hanging_up {
                                // The user took over the mic; only a new end of capture hangs up
                                hangup_timer = None;
                                if let Some(chunk) = self.encoder.flush() {
                                    self.queue_chunk(chunk);
                                }
                                frames = self.session.toggle_recording().await;
                                capture_done = false;
                            }
                        }
                        None => commands_open = false,
                    }
                }

                error = next_error(&mut playback_errors) => {
                    match error {
                        Some(message) => self.session.report_playback_error(message),
                        None => playback_errors = None,
                    }
                }

                _ = expired(&mut hangup_timer) => {
                    frames = None;
                    hangup_timer = None;
                    hanging_up = true;
                    ack_timer = Some(Box::pin(sleep(self.config.end_ack_timeout)));
                    self.hang_up();
                    if !self.session.is_connected() {
                        break;
                    }
                }

                _ = expired(&mut ack_timer) => {
                    warn!("No call_ended within {:?}, giving up", self.config.end_ack_timeout);
                    break;
                }
            }
        }

        let stats = self.session.stats();
        info!(
            "Call finished: {} chunks sent, {} responses",
            stats.chunks_sent, stats.responses_received
        );

        Ok(self.session)
    }

    fn on_frame(&mut self, frame: &AudioFrame) {
        if let Some(chunk) = self.encoder.push(frame) {
            self.queue_chunk(chunk);
        }
    }

    fn queue_chunk(&mut self, chunk: String) {
        match self.session.status() {
            CallStatus::Active => {
                self.drain_backlog();
                self.session.send_audio_chunk(chunk);
            }
            CallStatus::Connecting => {
                debug!("Holding chunk until the call is confirmed");
                self.backlog.push_back(chunk);
            }
            CallStatus::Idle => debug!("Discarding chunk: call is not running"),
        }
    }

    fn drain_backlog(&mut self) {
        while let Some(chunk) = self.backlog.pop_front() {
            self.session.send_audio_chunk(chunk);
        }
    }

    fn hang_up(&mut self) {
        self.encoder.reset();
        self.backlog.clear();
        self.session.end_call();
    }
}

async fn next_frame(frames: &mut Option<mpsc::Receiver<AudioFrame>>) -> Option<AudioFrame> {
    match frames {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_error(errors: &mut Option<mpsc::UnboundedReceiver<String>>) -> Option<String> {
    match errors {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn expired(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => std::future::pending().await,
    }
}
