//! Call session management
//!
//! This module provides the `CallSession` state machine and the `CallDriver`
//! loop around it:
//! - Call lifecycle (idle → connecting → active → idle)
//! - Conversation history, append-only in arrival order
//! - Audio capture control and chunk streaming
//! - Playback of response audio
//! - Independent transport/audio error reporting

mod call;
mod config;
mod driver;
mod events;
mod state;
mod stats;

pub use call::{CallError, CallSession};
pub use config::SessionConfig;
pub use driver::{CallCommand, CallDriver};
pub use events::{CallListener, LogListener};
pub use state::{
    CallErrors, CallStatus, ConversationMessage, Role, DEFAULT_ERROR, DEFAULT_GOODBYE,
    DEFAULT_WELCOME,
};
pub use stats::CallStats;
