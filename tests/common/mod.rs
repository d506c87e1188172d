// Test doubles for the transport, capture, and playback seams
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use voice_call::audio::{AudioCapture, AudioError, AudioFrame, AudioOutput};
use voice_call::session::{CallListener, ConversationMessage};
use voice_call::transport::{ClientMessage, Delivered, ServerMessage, Transport, TransportError};

/// Transport that records outbound envelopes
#[derive(Clone)]
pub struct MockTransport {
    pub sent: Arc<Mutex<Vec<ClientMessage>>>,
    pub connected: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn connected() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn disconnected() -> Self {
        let transport = Self::connected();
        transport.connected.store(false, Ordering::SeqCst);
        transport
    }

    pub fn sent(&self) -> Vec<ClientMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn chunks_sent(&self) -> usize {
        self.sent()
            .iter()
            .filter(|m| matches!(m, ClientMessage::AudioChunk { .. }))
            .count()
    }
}

impl Transport for MockTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send_message(&self, message: &ClientMessage) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn last_message(&self) -> Option<Delivered> {
        None
    }

    fn last_error(&self) -> Option<String> {
        None
    }
}

/// Capture whose frames are pushed by the test
///
/// The first `start` hands out the receiver paired with `frames`; later
/// starts get a fresh stream that stays open but silent.
#[derive(Clone)]
pub struct MockCapture {
    pub deny: Arc<AtomicBool>,
    pub capturing: Arc<AtomicBool>,
    pub starts: Arc<Mutex<usize>>,
    pending_rx: Arc<Mutex<Option<mpsc::Receiver<AudioFrame>>>>,
    later_tx: Arc<Mutex<Vec<mpsc::Sender<AudioFrame>>>>,
}

impl MockCapture {
    pub fn new() -> (Self, mpsc::Sender<AudioFrame>) {
        let (tx, rx) = mpsc::channel(100);
        let capture = Self {
            deny: Arc::new(AtomicBool::new(false)),
            capturing: Arc::new(AtomicBool::new(false)),
            starts: Arc::new(Mutex::new(0)),
            pending_rx: Arc::new(Mutex::new(Some(rx))),
            later_tx: Arc::new(Mutex::new(Vec::new())),
        };
        (capture, tx)
    }

    pub fn denied() -> Self {
        let (capture, _) = Self::new();
        capture.deny.store(true, Ordering::SeqCst);
        capture
    }

    pub fn starts(&self) -> usize {
        *self.starts.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl AudioCapture for MockCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, AudioError> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(AudioError::PermissionDenied("microphone".to_string()));
        }

        *self.starts.lock().unwrap() += 1;
        self.capturing.store(true, Ordering::SeqCst);

        if let Some(rx) = self.pending_rx.lock().unwrap().take() {
            return Ok(rx);
        }
        let (tx, rx) = mpsc::channel(1);
        self.later_tx.lock().unwrap().push(tx);
        Ok(rx)
    }

    fn stop(&mut self) {
        self.capturing.store(false, Ordering::SeqCst);
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Output that records what it was asked to play
#[derive(Clone, Default)]
pub struct MockOutput {
    pub played: Arc<Mutex<Vec<String>>>,
}

impl MockOutput {
    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }
}

impl AudioOutput for MockOutput {
    fn play_audio(&self, base64_data: &str) -> Result<(), AudioError> {
        self.played.lock().unwrap().push(base64_data.to_string());
        Ok(())
    }

    fn is_playing(&self) -> bool {
        false
    }

    fn last_error(&self) -> Option<String> {
        None
    }
}

/// Listener that records every hook invocation
#[derive(Clone, Default)]
pub struct RecordingListener {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl CallListener for RecordingListener {
    fn on_call_started(&self, session_id: &str) {
        self.events.lock().unwrap().push(format!("started:{}", session_id));
    }

    fn on_call_ended(&self) {
        self.events.lock().unwrap().push("ended".to_string());
    }

    fn on_error(&self, message: &str) {
        self.events.lock().unwrap().push(format!("error:{}", message));
    }

    fn on_message(&self, message: &ConversationMessage) {
        self.events.lock().unwrap().push(format!("message:{}", message.content));
    }
}

pub fn delivered(seq: u64, message: ServerMessage) -> Delivered {
    Delivered { seq, message }
}

pub fn call_started(session_id: &str) -> ServerMessage {
    ServerMessage::CallStarted {
        session_id: session_id.to_string(),
        message: None,
        audio_data: None,
    }
}

pub fn transcript(text: &str) -> ServerMessage {
    ServerMessage::AiResponse {
        transcript: Some(text.to_string()),
        audio_data: None,
        confidence: None,
    }
}

/// One second of 16kHz mono audio
pub fn one_second_frame(timestamp_ms: u64) -> AudioFrame {
    AudioFrame {
        samples: vec![1000i16; 16000],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms,
    }
}

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
