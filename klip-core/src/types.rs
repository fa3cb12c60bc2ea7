//! Core types for Klip
//!
//! Device descriptors, track kinds and the raw frame representation shared by
//! capture, compositing and screen share.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global handle counter for unique stream and track IDs
static HANDLE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque handle for a stream or track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    /// Create a new unique handle
    pub fn new() -> Self {
        Self(HANDLE_COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw handle value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

/// Kind of media device reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceKind {
    /// Video input
    Camera,
    /// Audio input
    MicrophoneIn,
    /// Audio output
    SpeakerOut,
}

impl DeviceKind {
    /// Track kind produced by capturing from this device, if any
    pub fn track_kind(&self) -> Option<TrackKind> {
        match self {
            Self::Camera => Some(TrackKind::Video),
            Self::MicrophoneIn => Some(TrackKind::Audio),
            Self::SpeakerOut => None,
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Camera => write!(f, "camera"),
            Self::MicrophoneIn => write!(f, "microphone"),
            Self::SpeakerOut => write!(f, "speaker"),
        }
    }
}

/// Kind of a single media track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    /// Device kind a track of this kind is captured from
    pub fn device_kind(&self) -> DeviceKind {
        match self {
            Self::Video => DeviceKind::Camera,
            Self::Audio => DeviceKind::MicrophoneIn,
        }
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Snapshot of one device as enumerated by the host
///
/// Immutable; the whole list is replaced when the host reports a hardware change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Host device identifier
    pub id: String,
    /// What kind of device this is
    pub kind: DeviceKind,
    /// Human-readable label (may be empty before permission is granted)
    pub label: String,
}

impl DeviceDescriptor {
    /// Create a new device descriptor
    pub fn new(id: impl Into<String>, kind: DeviceKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
        }
    }
}

impl std::fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {} ({})", self.id, self.label, self.kind)
    }
}

/// Selected device id per kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSelection {
    #[serde(default)]
    pub camera_id: Option<String>,
    #[serde(default)]
    pub microphone_id: Option<String>,
    #[serde(default)]
    pub speaker_id: Option<String>,
}

impl DeviceSelection {
    /// Get the selected id for a kind
    pub fn get(&self, kind: DeviceKind) -> Option<&str> {
        match kind {
            DeviceKind::Camera => self.camera_id.as_deref(),
            DeviceKind::MicrophoneIn => self.microphone_id.as_deref(),
            DeviceKind::SpeakerOut => self.speaker_id.as_deref(),
        }
    }

    /// Set the selected id for a kind
    pub fn set(&mut self, kind: DeviceKind, id: Option<String>) {
        match kind {
            DeviceKind::Camera => self.camera_id = id,
            DeviceKind::MicrophoneIn => self.microphone_id = id,
            DeviceKind::SpeakerOut => self.speaker_id = id,
        }
    }
}

/// Raw RGBA8 video frame
///
/// Used for camera frames, decoded background templates and surface snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Tightly packed RGBA8 data (width * height * 4 bytes)
    pub data: Vec<u8>,
    /// Presentation timestamp in nanoseconds
    pub pts: u64,
}

impl VideoFrame {
    /// Create a frame from packed RGBA data
    ///
    /// Data shorter than `width * height * 4` is padded with transparent black.
    pub fn new(width: u32, height: u32, mut data: Vec<u8>) -> Self {
        let expected = width as usize * height as usize * 4;
        data.resize(expected, 0);
        Self {
            width,
            height,
            data,
            pts: 0,
        }
    }

    /// Create a frame filled with one RGBA colour
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        let data = color.repeat(pixels);
        Self {
            width,
            height,
            data,
            pts: 0,
        }
    }

    /// Zero-sized frame, the host's "no data yet" value
    pub fn empty() -> Self {
        Self::new(0, 0, Vec::new())
    }

    /// Set the presentation timestamp
    pub fn with_pts(mut self, pts: u64) -> Self {
        self.pts = pts;
        self
    }

    /// Whether the frame carries any pixels
    pub fn is_ready(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// View the data as RGBA pixels
    pub fn pixels(&self) -> &[[u8; 4]] {
        let whole = self.data.len() - self.data.len() % 4;
        bytemuck::cast_slice(&self.data[..whole])
    }

    /// Pixel at (x, y), or `None` outside the frame
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels()
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }
}
