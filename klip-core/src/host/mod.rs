//! Host capture API
//!
//! Everything below the session layer is provided by the embedding host: device
//! enumeration, camera/microphone acquisition, display capture and hot-plug
//! notification. Klip only talks to the host through these traits.
//!
//! ```text
//! ┌──────────────┐  request_user_media   ┌──────────────┐
//! │ CaptureHost  │──────────────────────▶│ ActiveStream │──▶ TrackRef (video)
//! │              │  request_display_media│              │──▶ TrackRef (audio)
//! └──────────────┘                       └──────────────┘
//! ```

mod constraints;

pub use constraints::{
    AudioConstraints, AudioProcessing, DisplayConstraints, MediaConstraints, VideoConstraints,
};

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

use crate::error::Result;
use crate::types::{DeviceDescriptor, Handle, TrackKind, VideoFrame};

/// Lifecycle of a host track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Producing media
    Live,
    /// Stopped, either by us or out-of-band by the host
    Ended,
}

/// A single host media source (one video or one audio feed)
pub trait MediaTrack: Send + Sync + std::fmt::Debug {
    /// Unique track handle
    fn handle(&self) -> Handle;

    /// Video or audio
    fn kind(&self) -> TrackKind;

    /// Id of the device this track is bound to
    fn device_id(&self) -> &str;

    /// Human-readable label
    fn label(&self) -> &str;

    /// Whether the track produces media (a disabled track stays allocated but is blank/silent)
    fn is_enabled(&self) -> bool;

    /// Enable or disable the track without releasing the hardware
    fn set_enabled(&self, enabled: bool);

    /// Current lifecycle state
    fn ready_state(&self) -> TrackState;

    /// Release the hardware; idempotent
    fn stop(&self);

    /// Watch the lifecycle state, including out-of-band termination
    fn watch_state(&self) -> watch::Receiver<TrackState>;

    /// Most recent video frame, `None` for audio tracks or before the first frame
    fn latest_frame(&self) -> Option<Arc<VideoFrame>> {
        None
    }

    /// Copy the most recent time-domain audio samples into `out`
    ///
    /// Returns the number of samples written. Disabled tracks read silence.
    fn read_samples(&self, _out: &mut [f32]) -> usize {
        0
    }
}

/// Shared reference to a host track
pub type TrackRef = Arc<dyn MediaTrack>;

/// A live stream: a handle plus its tracks
#[derive(Debug, Clone)]
pub struct ActiveStream {
    handle: Handle,
    tracks: Vec<TrackRef>,
}

impl ActiveStream {
    /// Wrap a set of tracks into a new stream
    pub fn new(tracks: Vec<TrackRef>) -> Self {
        Self::with_handle(Handle::new(), tracks)
    }

    /// Wrap tracks under an existing stream handle
    pub fn with_handle(handle: Handle, tracks: Vec<TrackRef>) -> Self {
        Self { handle, tracks }
    }

    /// Stream handle
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// All tracks
    pub fn tracks(&self) -> &[TrackRef] {
        &self.tracks
    }

    /// First track of a kind
    pub fn track(&self, kind: TrackKind) -> Option<&TrackRef> {
        self.tracks.iter().find(|t| t.kind() == kind)
    }

    /// First video track
    pub fn video_track(&self) -> Option<&TrackRef> {
        self.track(TrackKind::Video)
    }

    /// First audio track
    pub fn audio_track(&self) -> Option<&TrackRef> {
        self.track(TrackKind::Audio)
    }

    /// Stop every track
    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    /// Whether any track is still live
    pub fn is_live(&self) -> bool {
        self.tracks
            .iter()
            .any(|t| t.ready_state() == TrackState::Live)
    }
}

/// Host capture API
///
/// Acquisition calls are the only suspension points in a session. Hosts map
/// their own failures onto [`crate::KlipError`]: denied access is
/// `Permission`, a stale exact device id is `DeviceUnavailable`, a dismissed
/// share picker is `UserCancelled`.
#[async_trait]
pub trait CaptureHost: Send + Sync {
    /// Enumerate capture and output devices
    ///
    /// Fails with `Permission` until capture access has been granted.
    async fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>>;

    /// Acquire camera and/or microphone tracks
    async fn request_user_media(&self, constraints: &MediaConstraints) -> Result<ActiveStream>;

    /// Acquire a display capture stream (shows the host's share picker)
    async fn request_display_media(&self, constraints: &DisplayConstraints)
    -> Result<ActiveStream>;

    /// Notifications fired whenever the host device set changes
    fn device_changes(&self) -> broadcast::Receiver<()>;
}
