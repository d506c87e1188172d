// Tests for the call driver loop

mod common;

use anyhow::Result;
use common::{
    call_started, delivered, one_second_frame, transcript, wait_for, MockCapture, MockOutput,
    MockTransport, RecordingListener,
};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use voice_call::audio::{AudioOutput, AudioPlayer, WavFileSink};
use voice_call::session::{
    CallCommand, CallDriver, CallError, CallSession, CallStatus, SessionConfig, DEFAULT_GOODBYE,
    DEFAULT_WELCOME,
};
use voice_call::transport::{ClientMessage, Delivered, ServerMessage};

fn test_config() -> SessionConfig {
    SessionConfig {
        chunk_duration: Duration::from_millis(1000),
        hangup_grace: Duration::from_millis(100),
        end_ack_timeout: Duration::from_millis(200),
    }
}

struct Running {
    transport: MockTransport,
    capture: MockCapture,
    frames: mpsc::Sender<voice_call::AudioFrame>,
    inbound: mpsc::Sender<Delivered>,
    commands: mpsc::Sender<CallCommand>,
    handle: tokio::task::JoinHandle<Result<CallSession, CallError>>,
}

fn spawn_driver() -> Running {
    spawn_driver_with(Box::new(MockOutput::default()), None, test_config())
}

fn spawn_driver_with(
    output: Box<dyn AudioOutput>,
    listener: Option<RecordingListener>,
    config: SessionConfig,
) -> Running {
    let transport = MockTransport::connected();
    let (capture, frames) = MockCapture::new();
    let mut session = CallSession::new(
        Box::new(transport.clone()),
        Box::new(capture.clone()),
        output,
    );
    if let Some(listener) = listener {
        session.add_listener(Box::new(listener));
    }

    let (inbound, inbound_rx) = mpsc::channel(100);
    let (commands, commands_rx) = mpsc::channel(8);
    let driver = CallDriver::new(session, inbound_rx, commands_rx, config);
    let handle = tokio::spawn(driver.run());

    Running {
        transport,
        capture,
        frames,
        inbound,
        commands,
        handle,
    }
}

#[tokio::test]
async fn test_chunks_held_until_call_confirmed() -> Result<()> {
    let call = spawn_driver();

    let transport = call.transport.clone();
    assert!(wait_for(|| transport.sent() == vec![ClientMessage::StartCall]).await);

    call.frames.send(one_second_frame(0)).await?;
    call.frames.send(one_second_frame(1000)).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(call.transport.chunks_sent(), 0);

    call.inbound.send(delivered(0, call_started("s1"))).await?;
    let transport = call.transport.clone();
    assert!(wait_for(|| transport.chunks_sent() == 2).await);

    call.inbound.send(delivered(1, transcript("Hi"))).await?;
    call.inbound
        .send(delivered(2, ServerMessage::CallEnded { message: None }))
        .await?;

    let session = call.handle.await??;
    let contents: Vec<&str> = session
        .conversation()
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec![DEFAULT_WELCOME, "Hi", DEFAULT_GOODBYE]);
    assert_eq!(session.status(), CallStatus::Idle);
    assert!(session.session_id().is_none());
    assert_eq!(session.stats().chunks_sent, 2);

    Ok(())
}

#[tokio::test]
async fn test_end_call_command_stops_chunks() -> Result<()> {
    let call = spawn_driver();

    call.inbound.send(delivered(0, call_started("s1"))).await?;
    call.frames.send(one_second_frame(0)).await?;
    let transport = call.transport.clone();
    assert!(wait_for(|| transport.chunks_sent() == 1).await);

    call.commands.send(CallCommand::EndCall).await?;
    let transport = call.transport.clone();
    assert!(wait_for(|| transport.sent().last() == Some(&ClientMessage::EndCall)).await);

    // Capture is closed by now; the frame goes nowhere
    let _ = call.frames.send(one_second_frame(1000)).await;

    // No call_ended arrives, so the driver gives up after the ack timeout
    let session = call.handle.await??;

    assert_eq!(session.status(), CallStatus::Idle);
    assert_eq!(call.transport.chunks_sent(), 1);
    assert_eq!(call.transport.sent().last(), Some(&ClientMessage::EndCall));

    Ok(())
}

#[tokio::test]
async fn test_capture_end_hangs_up_after_grace() -> Result<()> {
    let call = spawn_driver();

    call.inbound.send(delivered(0, call_started("s1"))).await?;
    call.frames.send(one_second_frame(0)).await?;
    call.frames.send(one_second_frame(1000)).await?;
    drop(call.frames);

    let transport = call.transport.clone();
    assert!(wait_for(|| transport.sent().last() == Some(&ClientMessage::EndCall)).await);
    assert_eq!(call.transport.chunks_sent(), 2);

    call.inbound
        .send(delivered(1, ServerMessage::CallEnded { message: None }))
        .await?;

    let session = call.handle.await??;
    assert_eq!(
        session.conversation().last().map(|m| m.content.as_str()),
        Some(DEFAULT_GOODBYE)
    );

    Ok(())
}

#[tokio::test]
async fn test_server_error_finishes_driver() -> Result<()> {
    let call = spawn_driver();

    call.inbound.send(delivered(0, call_started("s1"))).await?;
    call.inbound
        .send(delivered(
            1,
            ServerMessage::Error {
                message: Some("Invalid audio chunk".to_string()),
            },
        ))
        .await?;

    let session = call.handle.await??;
    assert_eq!(session.status(), CallStatus::Idle);
    assert_eq!(
        session.errors().transport.as_deref(),
        Some("Invalid audio chunk")
    );

    Ok(())
}

#[tokio::test]
async fn test_closed_connection_finishes_driver() -> Result<()> {
    let call = spawn_driver();

    call.inbound.send(delivered(0, call_started("s1"))).await?;
    drop(call.inbound);

    let session = call.handle.await??;
    assert_eq!(session.status(), CallStatus::Idle);
    assert_eq!(call.transport.sent().last(), Some(&ClientMessage::EndCall));

    Ok(())
}

#[tokio::test]
async fn test_denied_capture_fails_run() {
    let transport = MockTransport::connected();
    let session = CallSession::new(
        Box::new(transport.clone()),
        Box::new(MockCapture::denied()),
        Box::new(MockOutput::default()),
    );
    let (_inbound, inbound_rx) = mpsc::channel(1);
    let (_commands, commands_rx) = mpsc::channel(1);

    let result = CallDriver::new(session, inbound_rx, commands_rx, test_config())
        .run()
        .await;

    assert!(matches!(result, Err(CallError::Audio(_))));
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_resumed_recording_cancels_pending_hangup() -> Result<()> {
    let config = SessionConfig {
        hangup_grace: Duration::from_millis(300),
        ..test_config()
    };
    let call = spawn_driver_with(Box::new(MockOutput::default()), None, config);

    call.inbound.send(delivered(0, call_started("s1"))).await?;
    // The first stream runs dry, which arms the hang-up
    drop(call.frames);
    tokio::time::sleep(Duration::from_millis(100)).await;

    call.capture.capturing.store(false, Ordering::SeqCst);
    call.commands.send(CallCommand::ToggleRecording).await?;
    let capture = call.capture.clone();
    assert!(wait_for(|| capture.starts() == 2).await);

    // Well past the grace period, still recording and no hang-up
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(call.transport.sent(), vec![ClientMessage::StartCall]);
    assert!(call.capture.capturing.load(Ordering::SeqCst));
    assert!(!call.handle.is_finished());

    call.commands.send(CallCommand::EndCall).await?;
    let session = call.handle.await??;
    assert_eq!(call.transport.sent().last(), Some(&ClientMessage::EndCall));
    assert_eq!(session.status(), CallStatus::Idle);

    Ok(())
}

#[tokio::test]
async fn test_toggle_off_stops_capture_without_hanging_up() -> Result<()> {
    let call = spawn_driver();

    call.inbound.send(delivered(0, call_started("s1"))).await?;
    call.frames.send(one_second_frame(0)).await?;
    let transport = call.transport.clone();
    assert!(wait_for(|| transport.chunks_sent() == 1).await);

    call.commands.send(CallCommand::ToggleRecording).await?;
    let capture = call.capture.clone();
    assert!(wait_for(|| !capture.capturing.load(Ordering::SeqCst)).await);

    // Frames after the mic was muted are not streamed
    let _ = call.frames.send(one_second_frame(1000)).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(call.transport.chunks_sent(), 1);
    assert!(!call.handle.is_finished());

    call.inbound
        .send(delivered(1, ServerMessage::CallEnded { message: None }))
        .await?;
    let session = call.handle.await??;
    assert_eq!(session.stats().chunks_sent, 1);

    Ok(())
}

#[tokio::test]
async fn test_late_playback_failure_reaches_error_slot() -> Result<()> {
    let dir = TempDir::new()?;
    let player = AudioPlayer::new(Box::new(WavFileSink::new(dir.path(), false)?));
    let listener = RecordingListener::default();
    let call = spawn_driver_with(Box::new(player), Some(listener.clone()), test_config());

    call.inbound.send(delivered(0, call_started("s1"))).await?;
    // Valid base64, but not an audio file
    call.inbound
        .send(delivered(
            1,
            ServerMessage::AiResponse {
                transcript: None,
                audio_data: Some("aGVsbG8gd29ybGQ=".to_string()),
                confidence: None,
            },
        ))
        .await?;

    let events = listener.clone();
    assert!(
        wait_for(|| events
            .events()
            .iter()
            .any(|e| e.starts_with("error:Failed to decode audio")))
        .await
    );

    call.inbound
        .send(delivered(2, ServerMessage::CallEnded { message: None }))
        .await?;
    let session = call.handle.await??;

    let errors = session.errors();
    assert!(errors
        .audio
        .as_deref()
        .is_some_and(|e| e.starts_with("Failed to decode audio")));
    assert!(errors.transport.is_none());

    Ok(())
}
