//! Call transport: the persistent socket between client and backend
//!
//! - `messages`: the JSON envelope types exchanged over the socket
//! - `client`: WebSocket implementation of [`Transport`]

pub mod client;
pub mod messages;

pub use client::WsTransport;
pub use messages::{ClientMessage, Delivered, ServerMessage};

/// Errors raised by a call transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Not connected to the call server")]
    NotConnected,
    #[error("Failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },
    #[error("Failed to serialize envelope: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Outbound side of a call transport, plus its observable state
///
/// Inbound envelopes are delivered through the queue handed out when the
/// transport is created; `last_message` only mirrors the newest one.
pub trait Transport: Send + Sync {
    /// Whether the socket is currently open
    fn is_connected(&self) -> bool;

    /// Serialize and transmit an envelope
    ///
    /// Fails fast with [`TransportError::NotConnected`] when the socket is down.
    fn send_message(&self, message: &ClientMessage) -> Result<(), TransportError>;

    /// Most recently received envelope
    fn last_message(&self) -> Option<Delivered>;

    /// Most recent transport-level error
    fn last_error(&self) -> Option<String>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn send_message(&self, message: &ClientMessage) -> Result<(), TransportError> {
        (**self).send_message(message)
    }

    fn last_message(&self) -> Option<Delivered> {
        (**self).last_message()
    }

    fn last_error(&self) -> Option<String> {
        (**self).last_error()
    }
}
