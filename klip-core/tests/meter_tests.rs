//! Integration tests for the audio level meter

mod mocks;

use klip_core::audio::{level_from_spectrum, AudioLevelMeter};
use klip_core::types::TrackKind;
use klip_core::{KlipError, MediaTrack, TrackRef};
use mocks::{sine_samples, MockTrack};

fn mic(samples: Vec<f32>) -> std::sync::Arc<MockTrack> {
    let track = MockTrack::new(TrackKind::Audio, "mic-1", "Built-in Microphone");
    track.set_samples(samples);
    track
}

#[test]
fn test_level_is_always_in_range() {
    for spectrum in [vec![], vec![0u8; 128], vec![255u8; 128], vec![7u8; 3]] {
        let level = level_from_spectrum(&spectrum);
        assert!((0.0..=100.0).contains(&level), "level {} out of range", level);
    }
    assert_eq!(level_from_spectrum(&[0; 128]), 0.0);
    assert!((level_from_spectrum(&[255; 128]) - 100.0).abs() < 1e-4);
}

#[test]
fn test_video_track_is_rejected() {
    let mut meter = AudioLevelMeter::new();
    let camera: TrackRef = MockTrack::new(TrackKind::Video, "cam-1", "Front Camera");
    let err = meter.attach(camera).unwrap_err();
    assert!(matches!(err, KlipError::InvalidTrack(_)));
    assert!(!meter.is_attached());
}

#[test]
fn test_silence_reads_zero() {
    let mut meter = AudioLevelMeter::new();
    meter.attach(mic(vec![0.0; 256])).unwrap();
    for _ in 0..10 {
        assert_eq!(meter.tick(), 0.0);
    }
}

#[test]
fn test_disabled_mic_stays_at_zero_then_reacts_within_one_tick() {
    let track = mic(sine_samples(16, 256, 0.8));
    track.set_enabled(false);
    let mut meter = AudioLevelMeter::new();
    meter.attach(track.clone()).unwrap();

    for _ in 0..30 {
        assert_eq!(meter.tick(), 0.0);
    }

    track.set_enabled(true);
    let level = meter.tick();
    assert!(level > 0.0, "level did not react: {}", level);
    assert!(level <= 100.0);
}

#[test]
fn test_disabling_drops_to_zero_without_decay() {
    let track = mic(sine_samples(16, 256, 0.8));
    let mut meter = AudioLevelMeter::new();
    meter.attach(track.clone()).unwrap();
    for _ in 0..5 {
        meter.tick();
    }
    assert!(meter.level() > 0.0);

    track.set_enabled(false);
    assert_eq!(meter.tick(), 0.0);
    assert_eq!(meter.tick(), 0.0);
}

#[test]
fn test_ended_track_reads_zero() {
    let track = mic(sine_samples(16, 256, 0.8));
    let mut meter = AudioLevelMeter::new();
    meter.attach(track.clone()).unwrap();
    assert!(meter.tick() > 0.0);

    track.end_externally();
    assert_eq!(meter.tick(), 0.0);
}

#[test]
fn test_detach_resets_level() {
    let mut meter = AudioLevelMeter::new();
    meter.attach(mic(sine_samples(16, 256, 0.8))).unwrap();
    meter.tick();

    meter.detach();
    assert!(!meter.is_attached());
    assert_eq!(meter.level(), 0.0);
    assert_eq!(meter.tick(), 0.0);
}

#[tokio::test]
async fn test_subscribers_see_updates() {
    let mut meter = AudioLevelMeter::new();
    let mut rx = meter.subscribe();
    meter.attach(mic(sine_samples(16, 256, 0.8))).unwrap();

    let level = meter.tick();
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow(), level);
}
