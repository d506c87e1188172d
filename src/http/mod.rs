//! Reference call backend
//!
//! Serves the call protocol and a few monitoring endpoints:
//! - GET / - Service banner
//! - GET /health - Voice pipeline health
//! - GET /api/active-calls - Connected callers
//! - GET /ws/:client_id - Call socket (WebSocket upgrade)

mod handlers;
pub mod pipeline;
mod routes;
mod state;
mod ws;

pub use pipeline::{EchoPipeline, SessionContext, VoicePipeline, VoiceResponse};
pub use routes::create_router;
pub use state::{AppState, Connection};

use anyhow::{Context, Result};
use std::future::Future;
use tokio::net::TcpListener;
use tracing::info;

/// Serve the backend on an already-bound listener until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = listener.local_addr().context("Listener has no address")?;
    info!("Call server listening on {}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

    info!("Call server stopped");
    Ok(())
}
