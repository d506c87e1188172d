use super::state::ConversationMessage;

/// Observer for call lifecycle events
///
/// Register with [`CallSession::add_listener`](super::CallSession::add_listener).
/// Every hook defaults to a no-op.
pub trait CallListener: Send {
    fn on_call_started(&self, _session_id: &str) {}

    fn on_call_ended(&self) {}

    /// Transport, audio, and server errors all arrive here
    fn on_error(&self, _message: &str) {}

    /// A line was appended to the conversation
    fn on_message(&self, _message: &ConversationMessage) {}
}

/// Listener that logs events through `tracing`
pub struct LogListener;

impl CallListener for LogListener {
    fn on_call_started(&self, session_id: &str) {
        tracing::info!("Call started: {}", session_id);
    }

    fn on_call_ended(&self) {
        tracing::info!("Call ended");
    }

    fn on_error(&self, message: &str) {
        tracing::error!("Call error: {}", message);
    }
}
