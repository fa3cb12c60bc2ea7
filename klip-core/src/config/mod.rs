//! Configuration types for Klip
//!
//! Provides recording quality presets, capture requests and render settings.

mod file;

pub use file::{sample_config, ConfigFile};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::effects::{builtin_templates, BackgroundTemplate};
use crate::error::{KlipError, Result};
use crate::host::{
    AudioConstraints, AudioProcessing, DisplayConstraints, MediaConstraints, VideoConstraints,
};

/// Capture resolution/framerate preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Preset {
    /// 1280x720 @ 30fps (default)
    #[default]
    #[serde(rename = "720p")]
    P720,
    /// 1920x1080 @ 30fps
    #[serde(rename = "1080p")]
    P1080,
    /// 3840x2160 @ 30fps
    #[serde(rename = "4k")]
    P4k,
    /// Custom resolution/framerate
    Custom { width: u32, height: u32, fps: u32 },
}

impl Preset {
    /// Get width in pixels
    pub fn width(&self) -> u32 {
        match self {
            Self::P720 => 1280,
            Self::P1080 => 1920,
            Self::P4k => 3840,
            Self::Custom { width, .. } => *width,
        }
    }

    /// Get height in pixels
    pub fn height(&self) -> u32 {
        match self {
            Self::P720 => 720,
            Self::P1080 => 1080,
            Self::P4k => 2160,
            Self::Custom { height, .. } => *height,
        }
    }

    /// Get framerate
    pub fn fps(&self) -> u32 {
        match self {
            Self::P720 | Self::P1080 | Self::P4k => 30,
            Self::Custom { fps, .. } => *fps,
        }
    }

    /// Get resolution as (width, height) tuple
    pub fn resolution(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// Parse from string, returning Option instead of Result
    pub fn from_preset_str(s: &str) -> Option<Self> {
        s.parse().ok()
    }

    /// Label shown in quality pickers
    pub fn label(&self) -> &'static str {
        match self {
            Self::P720 => "720p HD",
            Self::P1080 => "1080p Full HD",
            Self::P4k => "4K Ultra HD",
            Self::Custom { .. } => "Custom",
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::P720 => write!(f, "720p"),
            Self::P1080 => write!(f, "1080p"),
            Self::P4k => write!(f, "4k"),
            Self::Custom { width, height, fps } => write!(f, "{}x{}@{}", width, height, fps),
        }
    }
}

impl std::str::FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "720p" | "720p30" | "hd" => Ok(Self::P720),
            "1080p" | "1080p30" | "fullhd" => Ok(Self::P1080),
            "4k" | "4k30" | "2160p" => Ok(Self::P4k),
            _ => Err(format!("Unknown preset: {}", s)),
        }
    }
}

/// Camera + microphone capture request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Resolution/framerate preset
    pub preset: Preset,
    /// Exact camera id (None = host default)
    pub camera_id: Option<String>,
    /// Exact microphone id (None = host default)
    pub microphone_id: Option<String>,
    /// Request a camera track
    pub video: bool,
    /// Request a microphone track
    pub audio: bool,
    /// Camera track enabled after start
    pub camera_enabled: bool,
    /// Microphone track enabled after start
    pub microphone_enabled: bool,
    /// Audio processing flags
    pub processing: AudioProcessing,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            preset: Preset::default(),
            camera_id: None,
            microphone_id: None,
            video: true,
            audio: true,
            camera_enabled: true,
            microphone_enabled: true,
            processing: AudioProcessing::default(),
        }
    }
}

impl CaptureConfig {
    /// Set the preset
    pub fn with_preset(mut self, preset: Preset) -> Self {
        self.preset = preset;
        self
    }

    /// Bind the camera to an exact device id
    pub fn with_camera(mut self, id: impl Into<String>) -> Self {
        self.camera_id = Some(id.into());
        self
    }

    /// Bind the microphone to an exact device id
    pub fn with_microphone(mut self, id: impl Into<String>) -> Self {
        self.microphone_id = Some(id.into());
        self
    }

    /// Set audio processing flags
    pub fn with_processing(mut self, processing: AudioProcessing) -> Self {
        self.processing = processing;
        self
    }

    /// Set initial camera/microphone enablement
    pub fn with_enabled(mut self, camera: bool, microphone: bool) -> Self {
        self.camera_enabled = camera;
        self.microphone_enabled = microphone;
        self
    }

    /// Do not request a camera
    pub fn without_video(mut self) -> Self {
        self.video = false;
        self
    }

    /// Do not request a microphone
    pub fn without_audio(mut self) -> Self {
        self.audio = false;
        self
    }

    /// Camera request for this config, bound to `device_id` when given
    pub fn video_constraints(&self, device_id: Option<String>) -> VideoConstraints {
        VideoConstraints {
            device_id,
            width: self.preset.width(),
            height: self.preset.height(),
            frame_rate: self.preset.fps(),
        }
    }

    /// Microphone request for this config, bound to `device_id` when given
    pub fn audio_constraints(&self, device_id: Option<String>) -> AudioConstraints {
        AudioConstraints {
            device_id,
            processing: self.processing,
        }
    }

    /// Host constraints for the initial acquisition
    pub fn constraints(&self) -> MediaConstraints {
        MediaConstraints {
            video: self
                .video
                .then(|| self.video_constraints(self.camera_id.clone())),
            audio: self
                .audio
                .then(|| self.audio_constraints(self.microphone_id.clone())),
        }
    }

    /// Validate the configuration and return any warnings
    ///
    /// An empty list means the configuration looks good.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.audio && !self.processing.echo_cancellation {
            warnings.push(
                "Echo cancellation is off; use headphones to avoid feedback.".to_string(),
            );
        }

        let pixels_per_second =
            self.preset.width() as u64 * self.preset.height() as u64 * self.preset.fps() as u64;
        if pixels_per_second > 200_000_000 {
            warnings.push(format!(
                "{} preview effects are expensive to composite in software.",
                self.preset
            ));
        }

        warnings
    }

    /// Validate and return an error if the configuration cannot work
    pub fn validate_strict(&self) -> Result<()> {
        if !self.video && !self.audio {
            return Err(KlipError::config(
                "At least one of camera or microphone must be requested",
            ));
        }

        let (width, height) = self.preset.resolution();
        if width == 0 || height == 0 {
            return Err(KlipError::config("Resolution cannot be zero"));
        }

        if self.preset.fps() == 0 {
            return Err(KlipError::config("Framerate cannot be zero"));
        }

        Ok(())
    }
}

/// Placeholder foreground region used by template backgrounds
///
/// A fixed centred rounded rectangle; there is no person segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskGeometry {
    pub width: f32,
    pub height: f32,
    pub corner_radius: f32,
}

impl Default for MaskGeometry {
    fn default() -> Self {
        Self {
            width: 400.0,
            height: 600.0,
            corner_radius: 40.0,
        }
    }
}

/// Frame loop and compositor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Frame loop rate (animation-frame cadence)
    pub fps: u32,
    /// Primary surface size
    pub primary_size: (u32, u32),
    /// Preview surface size
    pub preview_size: (u32, u32),
    /// Blur standard deviation in pixels
    pub blur_radius: f32,
    /// Brightness multiplier applied with blur
    pub brightness_lift: f32,
    /// Foreground mask for template backgrounds
    pub mask: MaskGeometry,
    /// RGBA colour of the mask border
    pub border_color: [u8; 4],
    /// Mask border width in pixels
    pub border_width: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            primary_size: (1280, 720),
            preview_size: (1280, 720),
            blur_radius: 20.0,
            brightness_lift: 1.1,
            mask: MaskGeometry::default(),
            border_color: [255, 255, 255, 26],
            border_width: 2,
        }
    }
}

impl RenderConfig {
    /// Validate and return an error if the configuration cannot work
    pub fn validate_strict(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(KlipError::config("Render fps cannot be zero"));
        }
        for (name, (w, h)) in [
            ("primary", self.primary_size),
            ("preview", self.preview_size),
        ] {
            if w == 0 || h == 0 {
                return Err(KlipError::config(format!(
                    "{} surface size cannot be zero",
                    name
                )));
            }
        }
        if self.blur_radius < 0.0 || self.brightness_lift < 0.0 {
            return Err(KlipError::config(
                "Blur radius and brightness lift must not be negative",
            ));
        }
        Ok(())
    }

    /// Interval between frame-loop ticks
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }
}

/// Complete studio session configuration
#[derive(Debug, Clone)]
pub struct StudioConfig {
    /// Camera + microphone request
    pub capture: CaptureConfig,
    /// Compositor and frame loop settings
    pub render: RenderConfig,
    /// Display capture request
    pub display: DisplayConstraints,
    /// Background templates to load at session start
    pub templates: Vec<BackgroundTemplate>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            render: RenderConfig::default(),
            display: DisplayConstraints::default(),
            templates: builtin_templates(&default_templates_dir()),
        }
    }
}

impl StudioConfig {
    /// Set the capture request
    pub fn with_capture(mut self, capture: CaptureConfig) -> Self {
        self.capture = capture;
        self
    }

    /// Set the render settings
    pub fn with_render(mut self, render: RenderConfig) -> Self {
        self.render = render;
        self
    }

    /// Replace the template list
    pub fn with_templates(mut self, templates: Vec<BackgroundTemplate>) -> Self {
        self.templates = templates;
        self
    }

    /// Validate capture and render settings
    pub fn validate_strict(&self) -> Result<()> {
        self.capture.validate_strict()?;
        self.render.validate_strict()
    }
}

/// Default directory holding the built-in template images
pub fn default_templates_dir() -> PathBuf {
    data_dir().join("templates")
}

/// Klip's data directory
pub(crate) fn data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        dir.join("klip")
    } else if let Ok(home) = std::env::var("HOME") {
        Path::new(&home).join(".local").join("share").join("klip")
    } else {
        PathBuf::from("/var/lib/klip")
    }
}
