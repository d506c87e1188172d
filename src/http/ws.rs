//! Call endpoint: one WebSocket per caller, speaking the envelope protocol.

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use base64::Engine;
use chrono::Utc;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use tracing::{debug, error, info, warn};

use super::pipeline::{respond, SessionContext};
use super::state::{AppState, Connection};
use crate::audio::convert::pcm_bytes_to_samples;
use crate::transport::{ClientMessage, ServerMessage};

/// GET /ws/:client_id
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, client_id, state))
}

async fn handle_socket(socket: WebSocket, client_id: String, state: AppState) {
    let socket_id = uuid::Uuid::new_v4().to_string();
    info!("Client {} connected (socket {})", client_id, socket_id);

    {
        let mut connections = state.connections.write().await;
        connections.insert(
            client_id.clone(),
            Connection {
                socket_id: socket_id.clone(),
                connected_at: Utc::now(),
                session_id: None,
            },
        );
    }

    let (mut socket_tx, mut socket_rx) = socket.split();
    let mut context: Option<SessionContext> = None;

    while let Some(frame) = socket_rx.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => {
                info!("Client {} disconnected", client_id);
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                warn!("Socket error for {}: {}", client_id, e);
                break;
            }
        };

        let (reply, hang_up) = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(message) => {
                handle_message(message, &client_id, &socket_id, &state, &mut context).await
            }
            Err(e) => {
                warn!("Invalid envelope from {}: {}", client_id, e);
                (
                    ServerMessage::Error {
                        message: Some(format!("Invalid message: {}", e)),
                    },
                    false,
                )
            }
        };

        if let Err(e) = send_msg(&mut socket_tx, &reply).await {
            error!("Failed to reply to {}: {:#}", client_id, e);
            break;
        }

        if hang_up {
            break;
        }
    }

    {
        let mut connections = state.connections.write().await;
        // A newer socket may have taken over this client id
        if connections.get(&client_id).is_some_and(|c| c.socket_id == socket_id) {
            connections.remove(&client_id);
        }
    }

    if let Some(context) = context {
        let duration = Utc::now().signed_duration_since(context.started_at);
        info!(
            "Session {} closed after {:.1}s ({} interactions)",
            context.session_id,
            duration.num_milliseconds() as f64 / 1000.0,
            context.interactions
        );
    }

    if let Err(e) = socket_tx.close().await {
        debug!("Socket for {} already closed: {}", client_id, e);
    }
}

/// Apply one client envelope, returning the reply and whether to hang up
async fn handle_message(
    message: ClientMessage,
    client_id: &str,
    socket_id: &str,
    state: &AppState,
    context: &mut Option<SessionContext>,
) -> (ServerMessage, bool) {
    match message {
        ClientMessage::StartCall => {
            let session_id = uuid::Uuid::new_v4().to_string();
            info!("Call started for {}: {}", client_id, session_id);

            if let Some(connection) = state
                .connections
                .write()
                .await
                .get_mut(client_id)
                .filter(|c| c.socket_id == socket_id)
            {
                connection.session_id = Some(session_id.clone());
            }
            *context = Some(SessionContext::new(session_id.clone()));

            (
                ServerMessage::CallStarted {
                    session_id,
                    message: Some(state.settings.greeting.clone()),
                    audio_data: None,
                },
                false,
            )
        }

        ClientMessage::AudioChunk { data } => {
            let Some(context) = context.as_mut() else {
                return (
                    ServerMessage::Error {
                        message: Some("No active call".to_string()),
                    },
                    false,
                );
            };

            let bytes = match base64::engine::general_purpose::STANDARD.decode(&data) {
                Ok(bytes) => bytes,
                Err(e) => {
                    return (
                        ServerMessage::Error {
                            message: Some(format!("Invalid audio chunk: {}", e)),
                        },
                        false,
                    )
                }
            };

            let pcm = pcm_bytes_to_samples(&bytes);
            debug!("Processing {} samples for session {}", pcm.len(), context.session_id);

            let response = respond(
                state.pipeline.as_ref(),
                &pcm,
                context,
                state.settings.min_confidence,
            )
            .await;

            (
                ServerMessage::AiResponse {
                    transcript: response.transcript,
                    audio_data: response
                        .audio
                        .map(|audio| base64::engine::general_purpose::STANDARD.encode(audio)),
                    confidence: Some(response.confidence),
                },
                false,
            )
        }

        ClientMessage::EndCall => {
            info!("Call ended by {}", client_id);
            (
                ServerMessage::CallEnded {
                    message: Some(state.settings.farewell.clone()),
                },
                true,
            )
        }
    }
}

async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, message: &ServerMessage) -> Result<()> {
    let text = serde_json::to_string(message).context("Failed to serialize envelope")?;
    sink.send(Message::Text(text))
        .await
        .context("Failed to send envelope")?;
    Ok(())
}
