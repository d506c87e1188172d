use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::pipeline::VoicePipeline;
use crate::config::ServerConfig;

/// One connected caller
#[derive(Debug, Clone, Serialize)]
pub struct Connection {
    /// Distinguishes sockets that reuse the same client id
    pub socket_id: String,
    pub connected_at: DateTime<Utc>,
    /// Session id once the caller has started a call
    pub session_id: Option<String>,
}

/// Shared application state for HTTP and WebSocket handlers
#[derive(Clone)]
pub struct AppState {
    /// Active socket connections (client_id → connection)
    pub connections: Arc<RwLock<HashMap<String, Connection>>>,
    pub pipeline: Arc<dyn VoicePipeline>,
    pub settings: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(pipeline: Arc<dyn VoicePipeline>, settings: ServerConfig) -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            pipeline,
            settings: Arc::new(settings),
        }
    }
}
