use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};
use voice_call::session::{CallListener, ConversationMessage, LogListener};
use voice_call::{
    AppState, AudioPlayer, CallCommand, CallDriver, CallSession, Config, EchoPipeline,
    FileCapture, WavFileSink, WsTransport,
};

#[derive(Parser, Debug)]
#[command(name = "voice-call", version, about = "Voice call client and reference backend")]
struct Args {
    /// Config file (extension optional)
    #[arg(long, default_value = "config/voice-call")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the reference call backend
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Place a call, using a WAV file as the microphone
    Call {
        /// WAV file to stream
        #[arg(long)]
        input: PathBuf,

        /// Full socket URL (defaults to the configured server and client id)
        #[arg(long)]
        url: Option<String>,

        /// Directory for response audio
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Prints conversation lines as they arrive
struct ConsoleListener;

impl CallListener for ConsoleListener {
    fn on_message(&self, message: &ConversationMessage) {
        match message.confidence {
            Some(confidence) => println!("[{:?}] {} ({:.2})", message.role, message.content, confidence),
            None => println!("[{:?}] {}", message.role, message.content),
        }
    }

    fn on_error(&self, message: &str) {
        eprintln!("[error] {}", message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Serve { port } => serve(cfg, port).await,
        Command::Call { input, url, output } => call(cfg, input, url, output).await,
    }
}

async fn serve(cfg: Config, port: Option<u16>) -> Result<()> {
    let addr = format!("{}:{}", cfg.server.bind, port.unwrap_or(cfg.server.port));
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let pipeline = Arc::new(EchoPipeline::new(cfg.audio.sample_rate, cfg.server.echo_audio));
    let state = AppState::new(pipeline, cfg.server.clone());

    voice_call::http::serve(listener, state, shutdown_signal()).await
}

async fn call(
    cfg: Config,
    input: PathBuf,
    url: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let url = url.unwrap_or_else(|| cfg.client.call_url());
    let (transport, inbound) = WsTransport::connect(&url).await?;
    let transport = Arc::new(transport);

    let playback_dir = output.unwrap_or_else(|| PathBuf::from(&cfg.audio.playback_path));
    let player = Arc::new(AudioPlayer::new(Box::new(WavFileSink::new(
        playback_dir,
        cfg.audio.realtime,
    )?)));

    let capture = FileCapture::new(input, cfg.capture_config());

    let mut session = CallSession::new(
        Box::new(Arc::clone(&transport)),
        Box::new(capture),
        Box::new(Arc::clone(&player)),
    );
    session.add_listener(Box::new(LogListener));
    session.add_listener(Box::new(ConsoleListener));

    let (command_tx, command_rx) = mpsc::channel(8);
    tokio::spawn(async move {
        shutdown_signal().await;
        // The call may already be over
        let _ = command_tx.send(CallCommand::EndCall).await;
    });

    let driver = CallDriver::new(session, inbound, command_rx, cfg.session_config());
    let session = driver.run().await?;

    player.wait_idle().await;

    let stats = session.stats();
    info!(
        "Call summary: {:.1}s, {} chunks sent, {} responses, {} messages",
        stats.duration_secs,
        stats.chunks_sent,
        stats.responses_received,
        stats.messages.len()
    );

    let errors = session.errors();
    if let Some(e) = &errors.transport {
        error!("Last transport error: {}", e);
    }
    if let Some(e) = &errors.audio {
        error!("Last audio error: {}", e);
    }

    drop(session);
    if let Ok(transport) = Arc::try_unwrap(transport) {
        transport.close().await?;
    }

    Ok(())
}

/// Resolves on Ctrl+C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
