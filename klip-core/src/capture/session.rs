//! Camera + microphone capture session

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::CaptureConfig;
use crate::error::{KlipError, Result};
use crate::host::{ActiveStream, CaptureHost, MediaConstraints, TrackRef};
use crate::types::{DeviceKind, DeviceSelection, TrackKind};

/// Observable capture state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptureState {
    /// Whether a stream is held
    pub active: bool,
    pub camera_enabled: bool,
    pub microphone_enabled: bool,
    /// Device ids bound to the current tracks (speaker: last selection)
    pub selection: DeviceSelection,
}

#[derive(Debug, Default)]
struct SessionInner {
    stream: Option<ActiveStream>,
    config: CaptureConfig,
    state: CaptureState,
}

/// Owns the local camera + microphone stream
///
/// Acquisitions are the only await points. Every other operation takes the
/// session lock briefly and never suspends. Each `start`/`stop` bumps an
/// epoch; an acquisition that resolves after its epoch moved on releases its
/// tracks and fails with [`KlipError::Superseded`].
pub struct CaptureSession {
    host: Arc<dyn CaptureHost>,
    inner: Mutex<SessionInner>,
    epoch: AtomicU64,
}

impl CaptureSession {
    /// Create an idle session
    pub fn new(host: Arc<dyn CaptureHost>) -> Self {
        Self {
            host,
            inner: Mutex::new(SessionInner::default()),
            epoch: AtomicU64::new(0),
        }
    }

    fn bump_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Acquire camera and/or microphone per `config`
    ///
    /// Fails with `DeviceUnavailable` for a stale exact device id and
    /// `Permission` when access is denied. On failure nothing is held.
    pub async fn start(&self, config: &CaptureConfig) -> Result<ActiveStream> {
        config.validate_strict()?;
        if self.inner.lock().stream.is_some() {
            return Err(KlipError::SessionAlreadyRunning);
        }

        let epoch = self.bump_epoch();
        info!(
            "Starting capture ({}, camera: {}, microphone: {})",
            config.preset,
            config.camera_id.as_deref().unwrap_or("default"),
            config.microphone_id.as_deref().unwrap_or("default")
        );

        let granted = self.host.request_user_media(&config.constraints()).await?;

        let mut inner = self.inner.lock();
        if self.current_epoch() != epoch || inner.stream.is_some() {
            debug!("Discarding stale capture grant {}", granted.handle());
            granted.stop();
            return Err(KlipError::Superseded);
        }

        let stream = keep_one_per_kind(granted, &config.constraints());
        let video = stream.video_track().cloned();
        let audio = stream.audio_track().cloned();
        if let Some(track) = &video {
            track.set_enabled(config.camera_enabled);
        }
        if let Some(track) = &audio {
            track.set_enabled(config.microphone_enabled);
        }

        let speaker_id = inner.state.selection.speaker_id.take();
        inner.state = CaptureState {
            active: true,
            camera_enabled: video.as_ref().is_some_and(|t| t.is_enabled()),
            microphone_enabled: audio.as_ref().is_some_and(|t| t.is_enabled()),
            selection: DeviceSelection {
                camera_id: video.as_ref().map(|t| t.device_id().to_string()),
                microphone_id: audio.as_ref().map(|t| t.device_id().to_string()),
                speaker_id,
            },
        };
        inner.config = config.clone();
        inner.stream = Some(stream.clone());

        info!(
            "Capture started: {} ({} tracks)",
            stream.handle(),
            stream.tracks().len()
        );
        Ok(stream)
    }

    fn set_track_enabled(&self, kind: TrackKind, enabled: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        let track = inner
            .stream
            .as_ref()
            .and_then(|s| s.track(kind))
            .cloned()
            .ok_or(KlipError::NoActiveTrack(kind))?;

        if track.is_enabled() != enabled {
            debug!("{} track {} enabled: {}", kind, track.handle(), enabled);
        }
        track.set_enabled(enabled);
        match kind {
            TrackKind::Video => inner.state.camera_enabled = enabled,
            TrackKind::Audio => inner.state.microphone_enabled = enabled,
        }
        Ok(())
    }

    /// Enable or blank the camera without releasing it; idempotent
    pub fn set_camera_enabled(&self, enabled: bool) -> Result<()> {
        self.set_track_enabled(TrackKind::Video, enabled)
    }

    /// Enable or mute the microphone without releasing it; idempotent
    pub fn set_microphone_enabled(&self, enabled: bool) -> Result<()> {
        self.set_track_enabled(TrackKind::Audio, enabled)
    }

    /// Rebind one kind to another device
    ///
    /// The new track is acquired first; only once it is granted is the old
    /// track of that kind stopped and replaced, so a failure leaves the
    /// current track running. The other kind is never touched. Speaker
    /// selection acquires nothing; it is checked against the host's
    /// enumeration and recorded.
    pub async fn switch_device(&self, kind: DeviceKind, device_id: &str) -> Result<()> {
        let Some(track_kind) = kind.track_kind() else {
            return self.select_speaker(device_id).await;
        };

        let (epoch, constraints) = {
            let inner = self.inner.lock();
            if inner.stream.is_none() {
                return Err(KlipError::NoActiveSession);
            }
            let id = Some(device_id.to_string());
            let constraints = match track_kind {
                TrackKind::Video => MediaConstraints::video_only(inner.config.video_constraints(id)),
                TrackKind::Audio => MediaConstraints::audio_only(inner.config.audio_constraints(id)),
            };
            (self.current_epoch(), constraints)
        };

        debug!("Switching {} to '{}'", kind, device_id);
        let granted = self.host.request_user_media(&constraints).await?;

        let mut inner = self.inner.lock();
        if self.current_epoch() != epoch {
            debug!("Discarding stale {} grant {}", kind, granted.handle());
            granted.stop();
            return Err(KlipError::Superseded);
        }

        let granted = keep_one_per_kind(granted, &constraints);
        let Some(new_track) = granted.track(track_kind).cloned() else {
            granted.stop();
            return Err(KlipError::host(format!(
                "host granted no {} track for '{}'",
                track_kind, device_id
            )));
        };

        let Some(stream) = inner.stream.take() else {
            new_track.stop();
            return Err(KlipError::NoActiveSession);
        };

        let mut tracks: Vec<TrackRef> = Vec::with_capacity(stream.tracks().len());
        // A kind the session did not hold yet takes the configured initial flag.
        let mut enabled = match track_kind {
            TrackKind::Video => inner.config.camera_enabled,
            TrackKind::Audio => inner.config.microphone_enabled,
        };
        for track in stream.tracks() {
            if track.kind() == track_kind {
                enabled = track.is_enabled();
                track.stop();
            } else {
                tracks.push(track.clone());
            }
        }
        new_track.set_enabled(enabled);
        tracks.push(new_track.clone());
        inner.stream = Some(ActiveStream::with_handle(stream.handle(), tracks));
        inner
            .state
            .selection
            .set(kind, Some(new_track.device_id().to_string()));
        match track_kind {
            TrackKind::Video => {
                inner.config.camera_id = Some(device_id.to_string());
                inner.state.camera_enabled = new_track.is_enabled();
            }
            TrackKind::Audio => {
                inner.config.microphone_id = Some(device_id.to_string());
                inner.state.microphone_enabled = new_track.is_enabled();
            }
        }

        info!("Switched {} to {} ({})", kind, new_track.label(), new_track.handle());
        Ok(())
    }

    async fn select_speaker(&self, device_id: &str) -> Result<()> {
        let devices = self.host.enumerate_devices().await?;
        let known = devices
            .iter()
            .any(|d| d.kind == DeviceKind::SpeakerOut && d.id == device_id);
        if !known {
            return Err(KlipError::device_unavailable(DeviceKind::SpeakerOut, device_id));
        }
        self.inner
            .lock()
            .state
            .selection
            .set(DeviceKind::SpeakerOut, Some(device_id.to_string()));
        debug!("Speaker output set to '{}'", device_id);
        Ok(())
    }

    /// Release every track
    ///
    /// Takes effect immediately, also for acquisitions still in flight.
    /// Returns whether anything was stopped; calling it again is a no-op.
    pub fn stop(&self) -> bool {
        self.bump_epoch();
        let mut inner = self.inner.lock();
        let Some(stream) = inner.stream.take() else {
            return false;
        };
        stream.stop();
        inner.state.active = false;
        inner.state.camera_enabled = false;
        inner.state.microphone_enabled = false;
        info!("Capture stopped: {}", stream.handle());
        true
    }

    /// Whether a stream is held
    pub fn is_active(&self) -> bool {
        self.inner.lock().stream.is_some()
    }

    /// Current state
    pub fn state(&self) -> CaptureState {
        self.inner.lock().state.clone()
    }

    /// Current stream
    pub fn active_stream(&self) -> Option<ActiveStream> {
        self.inner.lock().stream.clone()
    }

    /// Current camera track
    pub fn video_track(&self) -> Option<TrackRef> {
        self.inner.lock().stream.as_ref()?.video_track().cloned()
    }

    /// Current microphone track
    pub fn audio_track(&self) -> Option<TrackRef> {
        self.inner.lock().stream.as_ref()?.audio_track().cloned()
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("epoch", &self.current_epoch())
            .field("state", &self.inner.lock().state)
            .finish_non_exhaustive()
    }
}

/// Keep the first track of each requested kind and stop the rest
fn keep_one_per_kind(stream: ActiveStream, constraints: &MediaConstraints) -> ActiveStream {
    let mut kept: Vec<TrackRef> = Vec::with_capacity(2);
    for track in stream.tracks() {
        let wanted = constraints.wants(track.kind());
        if wanted && !kept.iter().any(|t| t.kind() == track.kind()) {
            kept.push(track.clone());
        } else {
            warn!("Releasing surplus {} track {}", track.kind(), track.handle());
            track.stop();
        }
    }
    ActiveStream::with_handle(stream.handle(), kept)
}
