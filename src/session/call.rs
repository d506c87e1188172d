use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::events::CallListener;
use super::state::{
    CallErrors, CallStatus, ConversationMessage, Role, DEFAULT_ERROR, DEFAULT_GOODBYE,
    DEFAULT_WELCOME,
};
use super::stats::CallStats;
use crate::audio::{AudioCapture, AudioError, AudioFrame, AudioOutput};
use crate::transport::{ClientMessage, Delivered, ServerMessage, Transport, TransportError};

/// Errors raised by call actions
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("A call is already {0:?}")]
    AlreadyInCall(CallStatus),
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Client-side call session state machine
///
/// Owns the session id, status, conversation, and error slots. Every change
/// happens through `&mut self`, so transitions are applied one at a time by
/// whoever owns the session (normally a [`CallDriver`](super::CallDriver)).
pub struct CallSession {
    transport: Box<dyn Transport>,
    capture: Box<dyn AudioCapture>,
    output: Box<dyn AudioOutput>,
    listeners: Vec<Box<dyn CallListener>>,

    status: CallStatus,
    session_id: Option<String>,
    conversation: Vec<ConversationMessage>,

    /// Set when a chunk is sent, cleared by the next `ai_response`
    responding: bool,

    errors: CallErrors,

    /// Errors raised by the output after a clip was queued
    playback_errors: Option<mpsc::UnboundedReceiver<String>>,

    /// Set by a local hang-up until the next `start_call`; a late
    /// `call_started` must not revive the call
    hung_up: bool,

    /// Sequence number of the last envelope applied
    last_seq: Option<u64>,

    started_at: DateTime<Utc>,
    chunks_sent: usize,
    responses_received: usize,
}

impl CallSession {
    pub fn new(
        transport: Box<dyn Transport>,
        capture: Box<dyn AudioCapture>,
        output: Box<dyn AudioOutput>,
    ) -> Self {
        let playback_errors = output.subscribe_errors();

        Self {
            transport,
            capture,
            output,
            listeners: Vec::new(),
            status: CallStatus::Idle,
            session_id: None,
            conversation: Vec::new(),
            responding: false,
            errors: CallErrors::default(),
            playback_errors,
            hung_up: false,
            last_seq: None,
            started_at: Utc::now(),
            chunks_sent: 0,
            responses_received: 0,
        }
    }

    pub fn add_listener(&mut self, listener: Box<dyn CallListener>) {
        self.listeners.push(listener);
    }

    pub fn status(&self) -> CallStatus {
        self.status
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn conversation(&self) -> &[ConversationMessage] {
        &self.conversation
    }

    /// Whether a chunk was sent and its response has not arrived yet
    pub fn is_responding(&self) -> bool {
        self.responding
    }

    pub fn is_recording(&self) -> bool {
        self.capture.is_capturing()
    }

    pub fn is_playing(&self) -> bool {
        self.output.is_playing()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn errors(&self) -> &CallErrors {
        &self.errors
    }

    /// Start a call: begin capture, then send `start_call`
    ///
    /// Returns the capture frame stream. If capture cannot start, nothing is
    /// sent and the session returns to [`CallStatus::Idle`].
    pub async fn start_call(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CallError> {
        if self.status != CallStatus::Idle {
            warn!("Ignoring start call while {:?}", self.status);
            return Err(CallError::AlreadyInCall(self.status));
        }

        info!("Starting call (capture: {})", self.capture.name());
        self.status = CallStatus::Connecting;
        self.hung_up = false;

        let frames = match self.capture.start().await {
            Ok(frames) => frames,
            Err(e) => {
                self.status = CallStatus::Idle;
                self.report_audio_error(e.to_string());
                return Err(e.into());
            }
        };
        self.errors.audio = None;

        if let Err(e) = self.transport.send_message(&ClientMessage::StartCall) {
            self.capture.stop();
            self.status = CallStatus::Idle;
            self.report_transport_error(e.to_string());
            return Err(e.into());
        }

        self.started_at = Utc::now();
        self.chunks_sent = 0;
        self.responses_received = 0;

        Ok(frames)
    }

    /// Hang up without waiting for the server's acknowledgement
    pub fn end_call(&mut self) {
        info!("Ending call {}", self.session_id.as_deref().unwrap_or("<none>"));

        self.capture.stop();

        if let Err(e) = self.transport.send_message(&ClientMessage::EndCall) {
            self.report_transport_error(e.to_string());
        }

        self.status = CallStatus::Idle;
        self.session_id = None;
        self.responding = false;
        self.hung_up = true;
    }

    /// Send one chunk of captured audio
    ///
    /// Only sent while the call is active; returns whether an envelope went out.
    pub fn send_audio_chunk(&mut self, data: String) -> bool {
        if self.status != CallStatus::Active || self.session_id.is_none() {
            debug!("Dropping audio chunk: no active call");
            return false;
        }

        match self.transport.send_message(&ClientMessage::AudioChunk { data }) {
            Ok(()) => {
                self.chunks_sent += 1;
                self.responding = true;
                true
            }
            Err(e) => {
                self.report_transport_error(e.to_string());
                false
            }
        }
    }

    /// Stop capture if running, otherwise try to start it
    ///
    /// Returns the new frame stream when capture was started. Capture errors
    /// are reported but leave the call status alone.
    pub async fn toggle_recording(&mut self) -> Option<mpsc::Receiver<AudioFrame>> {
        if self.capture.is_capturing() {
            self.capture.stop();
            return None;
        }

        match self.capture.start().await {
            Ok(frames) => {
                self.errors.audio = None;
                Some(frames)
            }
            Err(e) => {
                self.report_audio_error(e.to_string());
                None
            }
        }
    }

    /// Apply one inbound envelope
    ///
    /// Envelopes whose sequence number is not newer than the last one applied
    /// are ignored; returns whether the envelope caused a transition.
    pub fn handle_message(&mut self, delivered: Delivered) -> bool {
        if let Some(last) = self.last_seq {
            if delivered.seq <= last {
                debug!("Skipping already-applied envelope seq={}", delivered.seq);
                return false;
            }
        }
        self.last_seq = Some(delivered.seq);

        debug!("Applying {} (seq={})", delivered.message.kind(), delivered.seq);

        match delivered.message {
            ServerMessage::CallStarted {
                session_id,
                message,
                audio_data,
            } => {
                if self.hung_up {
                    info!("Ignoring call_started for {}: call was hung up", session_id);
                    return false;
                }

                info!("Call started: {}", session_id);

                self.status = CallStatus::Active;
                self.session_id = Some(session_id.clone());
                self.responding = false;
                self.conversation.clear();
                self.push_message(ConversationMessage::assistant(
                    message.unwrap_or_else(|| DEFAULT_WELCOME.to_string()),
                ));

                if let Some(audio) = audio_data {
                    self.play(&audio);
                }

                for listener in &self.listeners {
                    listener.on_call_started(&session_id);
                }
            }

            ServerMessage::AiResponse {
                transcript,
                audio_data,
                confidence,
            } => {
                self.responding = false;
                self.responses_received += 1;

                if let Some(text) = transcript.filter(|t| !t.is_empty()) {
                    self.push_message(ConversationMessage::new(Role::Assistant, text, confidence));
                }

                if let Some(audio) = audio_data {
                    self.play(&audio);
                }
            }

            ServerMessage::CallEnded { message } => {
                info!("Call ended by server");

                self.close_locally();
                self.push_message(ConversationMessage::assistant(
                    message.unwrap_or_else(|| DEFAULT_GOODBYE.to_string()),
                ));

                for listener in &self.listeners {
                    listener.on_call_ended();
                }
            }

            ServerMessage::Error { message } => {
                let message = message.unwrap_or_else(|| DEFAULT_ERROR.to_string());
                warn!("Server reported error: {}", message);

                self.close_locally();
                self.report_transport_error(message);
            }
        }

        true
    }

    /// Hand the playback error stream to whoever drives the session
    ///
    /// Once taken, [`drain_playback_errors`](Self::drain_playback_errors)
    /// sees nothing and errors must be passed to
    /// [`report_playback_error`](Self::report_playback_error).
    pub fn take_playback_errors(&mut self) -> Option<mpsc::UnboundedReceiver<String>> {
        self.playback_errors.take()
    }

    /// Report every playback error raised since the last call
    pub fn drain_playback_errors(&mut self) -> usize {
        let mut drained = Vec::new();
        if let Some(errors) = self.playback_errors.as_mut() {
            while let Ok(message) = errors.try_recv() {
                drained.push(message);
            }
        }

        let count = drained.len();
        for message in drained {
            self.report_audio_error(message);
        }
        count
    }

    pub fn report_playback_error(&mut self, message: String) {
        self.report_audio_error(message);
    }

    pub fn stats(&self) -> CallStats {
        let duration = Utc::now().signed_duration_since(self.started_at);

        CallStats {
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            chunks_sent: self.chunks_sent,
            responses_received: self.responses_received,
            messages: self.conversation.clone(),
        }
    }

    fn close_locally(&mut self) {
        self.capture.stop();
        self.status = CallStatus::Idle;
        self.session_id = None;
        self.responding = false;
    }

    fn play(&mut self, audio: &str) {
        if let Err(e) = self.output.play_audio(audio) {
            self.report_audio_error(e.to_string());
        }
    }

    fn push_message(&mut self, message: ConversationMessage) {
        for listener in &self.listeners {
            listener.on_message(&message);
        }
        self.conversation.push(message);
    }

    fn report_audio_error(&mut self, message: String) {
        warn!("Audio error: {}", message);
        for listener in &self.listeners {
            listener.on_error(&message);
        }
        self.errors.audio = Some(message);
    }

    fn report_transport_error(&mut self, message: String) {
        warn!("Transport error: {}", message);
        for listener in &self.listeners {
            listener.on_error(&message);
        }
        self.errors.transport = Some(message);
    }
}
