//! Integration tests for screen share sessions

mod mocks;

use klip_core::host::DisplayConstraints;
use klip_core::screen::{EndReason, ScreenShareEvent, ScreenShareSession};
use klip_core::KlipError;
use mocks::{init_tracing, MockHost};
use std::time::Duration;
use tokio::time::timeout;

async fn next_event(rx: &mut tokio::sync::broadcast::Receiver<ScreenShareEvent>) -> ScreenShareEvent {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("no screen share event within 1s")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_start_and_stop_report_events() {
    init_tracing();
    let host = MockHost::new();
    let share = ScreenShareSession::new(host.as_host(), DisplayConstraints::default());
    let mut events = share.subscribe();

    let stream = share.start().await.unwrap();
    assert!(share.is_active());
    assert!(stream.audio_track().is_some());
    assert_eq!(next_event(&mut events).await, ScreenShareEvent::Started(stream.handle()));

    assert!(share.stop());
    assert!(!share.is_active());
    assert_eq!(
        next_event(&mut events).await,
        ScreenShareEvent::Ended {
            handle: stream.handle(),
            reason: EndReason::Stopped,
        }
    );
    assert!(host.last_display_track().unwrap().was_stopped());

    // Second stop is a no-op and emits nothing
    assert!(!share.stop());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_display_audio_is_optional() {
    let host = MockHost::new();
    let share = ScreenShareSession::new(host.as_host(), DisplayConstraints { audio: false });
    let stream = share.start().await.unwrap();
    assert!(stream.audio_track().is_none());
}

#[tokio::test]
async fn test_cancelled_picker() {
    let host = MockHost::new();
    host.cancel_share_picker(true);
    let share = ScreenShareSession::new(host.as_host(), DisplayConstraints::default());

    let err = share.start().await.unwrap_err();
    assert!(matches!(err, KlipError::UserCancelled));
    assert!(err.is_silent());
    assert!(!share.is_active());
}

#[tokio::test]
async fn test_start_while_sharing_is_rejected() {
    let host = MockHost::new();
    let share = ScreenShareSession::new(host.as_host(), DisplayConstraints::default());
    share.start().await.unwrap();

    let err = share.start().await.unwrap_err();
    assert!(matches!(err, KlipError::SessionAlreadyRunning));
}

#[tokio::test]
async fn test_stop_discards_in_flight_share() {
    init_tracing();
    let host = MockHost::new();
    host.hold_share_picker();
    let share = ScreenShareSession::new(host.as_host(), DisplayConstraints::default());
    let mut events = share.subscribe();

    let pending = tokio::spawn({
        let share = share.clone();
        async move { share.start().await }
    });
    mocks::eventually(|| host.display_calls() == 1).await;

    // Nothing is running yet, but the pending grant must not survive
    assert!(!share.stop());
    host.release_share_picker();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(KlipError::Superseded)));
    assert!(host.last_display_track().unwrap().was_stopped());
    assert!(!share.is_active());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_out_of_band_end_is_detected() {
    let host = MockHost::new();
    let share = ScreenShareSession::new(host.as_host(), DisplayConstraints::default());
    let mut events = share.subscribe();
    let stream = share.start().await.unwrap();
    next_event(&mut events).await;

    host.last_display_track().unwrap().end_externally();

    assert_eq!(
        next_event(&mut events).await,
        ScreenShareEvent::Ended {
            handle: stream.handle(),
            reason: EndReason::External,
        }
    );
    assert!(!share.is_active());
    assert!(!share.stop());
}

#[tokio::test]
async fn test_stop_is_not_reported_as_external() {
    let host = MockHost::new();
    let share = ScreenShareSession::new(host.as_host(), DisplayConstraints::default());
    let mut events = share.subscribe();
    share.start().await.unwrap();
    next_event(&mut events).await;

    share.stop();
    match next_event(&mut events).await {
        ScreenShareEvent::Ended { reason, .. } => assert_eq!(reason, EndReason::Stopped),
        other => panic!("unexpected event {:?}", other),
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_share_can_restart_after_external_end() {
    let host = MockHost::new();
    let share = ScreenShareSession::new(host.as_host(), DisplayConstraints::default());
    share.start().await.unwrap();
    host.last_display_track().unwrap().end_externally();
    mocks::eventually(|| !share.is_active()).await;

    share.start().await.unwrap();
    assert!(share.is_active());
    assert!(share.video_track().is_some());
}
