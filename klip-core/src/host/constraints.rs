//! Capture constraints handed to the host
//!
//! Device ids are always exact: a request naming a device that no longer
//! exists fails instead of silently falling back to another one.

use serde::{Deserialize, Serialize};

use crate::types::TrackKind;

/// Audio processing flags applied by the host capture pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioProcessing {
    #[serde(default = "default_true")]
    pub echo_cancellation: bool,
    #[serde(default = "default_true")]
    pub noise_suppression: bool,
    #[serde(default = "default_true")]
    pub auto_gain_control: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AudioProcessing {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Camera request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoConstraints {
    /// Exact device id, or `None` for the host default
    pub device_id: Option<String>,
    /// Ideal width in pixels
    pub width: u32,
    /// Ideal height in pixels
    pub height: u32,
    /// Ideal frame rate
    pub frame_rate: u32,
}

/// Microphone request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioConstraints {
    /// Exact device id, or `None` for the host default
    pub device_id: Option<String>,
    /// Processing flags
    pub processing: AudioProcessing,
}

/// Combined camera + microphone request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaConstraints {
    pub video: Option<VideoConstraints>,
    pub audio: Option<AudioConstraints>,
}

impl MediaConstraints {
    /// Request only a camera
    pub fn video_only(video: VideoConstraints) -> Self {
        Self {
            video: Some(video),
            audio: None,
        }
    }

    /// Request only a microphone
    pub fn audio_only(audio: AudioConstraints) -> Self {
        Self {
            video: None,
            audio: Some(audio),
        }
    }

    /// Whether a track of this kind is requested
    pub fn wants(&self, kind: TrackKind) -> bool {
        match kind {
            TrackKind::Video => self.video.is_some(),
            TrackKind::Audio => self.audio.is_some(),
        }
    }

    /// Whether nothing at all is requested
    pub fn is_empty(&self) -> bool {
        self.video.is_none() && self.audio.is_none()
    }
}

/// Display capture request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConstraints {
    /// Also capture system/tab audio when the host offers it
    #[serde(default = "default_true")]
    pub audio: bool,
}

impl Default for DisplayConstraints {
    fn default() -> Self {
        Self { audio: true }
    }
}
