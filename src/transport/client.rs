use futures::stream::StreamExt;
use futures::SinkExt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::messages::{ClientMessage, Delivered, ServerMessage};
use super::{Transport, TransportError};

/// Capacity of the inbound dispatch queue
const INBOUND_QUEUE: usize = 100;

enum Outgoing {
    Text(String),
    Close,
}

/// State shared between the transport handle and its socket tasks
#[derive(Default)]
struct Shared {
    connected: AtomicBool,
    next_seq: AtomicU64,
    last_message: Mutex<Option<Delivered>>,
    last_error: Mutex<Option<String>>,
}

impl Shared {
    fn record_error(&self, message: String) {
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = Some(message);
        }
    }

    fn record_message(&self, delivered: &Delivered) {
        if let Ok(mut slot) = self.last_message.lock() {
            *slot = Some(delivered.clone());
        }
    }
}

/// WebSocket call transport
///
/// One reader task parses inbound frames into [`Delivered`] envelopes and
/// pushes them onto a queue; one writer task drains outbound envelopes onto
/// the socket.
pub struct WsTransport {
    url: String,
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<Outgoing>,
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<()>,
}

impl WsTransport {
    /// Connect to the call server
    ///
    /// Returns the transport and the queue on which inbound envelopes arrive.
    /// The queue closes when the socket does.
    pub async fn connect(url: &str) -> Result<(Self, mpsc::Receiver<Delivered>), TransportError> {
        info!("Connecting to call server at {}", url);

        let (stream, _) = connect_async(url)
            .await
            .map_err(|source| TransportError::Connect {
                url: url.to_string(),
                source,
            })?;

        info!("Connected to call server");

        let shared = Arc::new(Shared::default());
        shared.connected.store(true, Ordering::SeqCst);

        let (mut ws_tx, mut ws_rx) = stream.split();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();

        let reader_shared = Arc::clone(&shared);
        let reader_handle = tokio::spawn(async move {
            while let Some(frame) = ws_rx.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(frame)) => {
                        match frame {
                            Some(frame) => info!("Call server closed the socket: {} {}", frame.code, frame.reason),
                            None => info!("Call server closed the socket"),
                        }
                        break;
                    }
                    Ok(Message::Binary(bytes)) => {
                        warn!("Ignoring binary frame ({} bytes)", bytes.len());
                        continue;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        error!("WebSocket error: {}", e);
                        reader_shared.record_error(format!("WebSocket error: {}", e));
                        break;
                    }
                };

                let message = match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("Failed to parse server envelope: {}", e);
                        reader_shared.record_error(format!("Invalid envelope from server: {}", e));
                        continue;
                    }
                };

                let delivered = Delivered {
                    seq: reader_shared.next_seq.fetch_add(1, Ordering::SeqCst),
                    message,
                };

                debug!("Received {} (seq={})", delivered.message.kind(), delivered.seq);
                reader_shared.record_message(&delivered);

                if inbound_tx.send(delivered).await.is_err() {
                    debug!("Inbound queue dropped, stopping reader");
                    break;
                }
            }

            reader_shared.connected.store(false, Ordering::SeqCst);
            info!("Transport reader stopped");
        });

        let writer_shared = Arc::clone(&shared);
        let writer_handle = tokio::spawn(async move {
            while let Some(outgoing) = outbound_rx.recv().await {
                match outgoing {
                    Outgoing::Text(text) => {
                        if let Err(e) = ws_tx.send(Message::Text(text)).await {
                            error!("Failed to send envelope: {}", e);
                            writer_shared.record_error(format!("Failed to send envelope: {}", e));
                            writer_shared.connected.store(false, Ordering::SeqCst);
                            break;
                        }
                    }
                    Outgoing::Close => {
                        if let Err(e) = ws_tx.close().await {
                            warn!("Failed to close socket cleanly: {}", e);
                        }
                        break;
                    }
                }
            }
            debug!("Transport writer stopped");
        });

        Ok((
            Self {
                url: url.to_string(),
                shared,
                outbound: outbound_tx,
                reader_handle,
                writer_handle,
            },
            inbound_rx,
        ))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Close the socket and wait for the writer to finish
    pub async fn close(self) -> Result<(), TransportError> {
        info!("Closing call transport");

        self.shared.connected.store(false, Ordering::SeqCst);
        // The writer may already be gone if the socket failed
        let _ = self.outbound.send(Outgoing::Close);

        if let Err(e) = self.writer_handle.await {
            error!("Transport writer panicked: {}", e);
        }
        self.reader_handle.abort();

        Ok(())
    }
}

impl Transport for WsTransport {
    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn send_message(&self, message: &ClientMessage) -> Result<(), TransportError> {
        if !self.is_connected() {
            self.shared.record_error(TransportError::NotConnected.to_string());
            return Err(TransportError::NotConnected);
        }

        let text = serde_json::to_string(message)?;

        if self.outbound.send(Outgoing::Text(text)).is_err() {
            self.shared.connected.store(false, Ordering::SeqCst);
            self.shared.record_error(TransportError::NotConnected.to_string());
            return Err(TransportError::NotConnected);
        }

        debug!("Queued {} envelope", message.kind());

        Ok(())
    }

    fn last_message(&self) -> Option<Delivered> {
        self.shared.last_message.lock().ok().and_then(|slot| slot.clone())
    }

    fn last_error(&self) -> Option<String> {
        self.shared.last_error.lock().ok().and_then(|slot| slot.clone())
    }
}
