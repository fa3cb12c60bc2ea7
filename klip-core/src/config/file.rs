//! Configuration file loading and merging
//!
//! Loads user configuration from `~/.config/klip/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::{
    default_templates_dir, CaptureConfig, MaskGeometry, Preset, RenderConfig, StudioConfig,
};
use crate::effects::{builtin_templates, BackgroundTemplate};
use crate::error::{KlipError, Result};
use crate::host::{AudioProcessing, DisplayConstraints};

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Capture settings
    #[serde(default)]
    pub capture: CaptureSettings,

    /// Compositor settings
    #[serde(default)]
    pub render: RenderSettings,

    /// Screen share settings
    #[serde(default)]
    pub share: ShareSettings,

    /// Background template settings
    #[serde(default)]
    pub templates: TemplateSettings,
}

/// Camera/microphone capture settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Recording quality preset (720p, 1080p, 4k)
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Echo cancellation
    #[serde(default = "default_true")]
    pub echo_cancellation: bool,

    /// Noise suppression
    #[serde(default = "default_true")]
    pub noise_suppression: bool,

    /// Automatic gain control
    #[serde(default = "default_true")]
    pub auto_gain_control: bool,
}

/// Compositor and frame loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Frame loop rate
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Primary surface size, "WIDTHxHEIGHT"
    #[serde(default = "default_surface")]
    pub surface: String,

    /// Preview surface size, "WIDTHxHEIGHT"
    #[serde(default = "default_surface")]
    pub preview: String,

    /// Blur radius in pixels
    #[serde(default = "default_blur_radius")]
    pub blur_radius: f32,

    /// Brightness multiplier applied with blur
    #[serde(default = "default_brightness")]
    pub brightness: f32,

    /// Foreground mask width in pixels
    #[serde(default = "default_mask_width")]
    pub mask_width: f32,

    /// Foreground mask height in pixels
    #[serde(default = "default_mask_height")]
    pub mask_height: f32,

    /// Foreground mask corner radius in pixels
    #[serde(default = "default_corner_radius")]
    pub corner_radius: f32,
}

/// Screen share settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareSettings {
    /// Capture system audio with the shared screen
    #[serde(default = "default_true")]
    pub audio: bool,
}

/// Background template settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateSettings {
    /// Directory holding `<id>.jpg` images for the built-in templates
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Additional templates
    #[serde(default)]
    pub custom: Vec<BackgroundTemplate>,
}

// Default value functions
fn default_preset() -> String {
    "720p".to_string()
}

fn default_true() -> bool {
    true
}

fn default_fps() -> u32 {
    60
}

fn default_surface() -> String {
    "1280x720".to_string()
}

fn default_blur_radius() -> f32 {
    20.0
}

fn default_brightness() -> f32 {
    1.1
}

fn default_mask_width() -> f32 {
    400.0
}

fn default_mask_height() -> f32 {
    600.0
}

fn default_corner_radius() -> f32 {
    40.0
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            surface: default_surface(),
            preview: default_surface(),
            blur_radius: default_blur_radius(),
            brightness: default_brightness(),
            mask_width: default_mask_width(),
            mask_height: default_mask_height(),
            corner_radius: default_corner_radius(),
        }
    }
}

impl Default for ShareSettings {
    fn default() -> Self {
        Self { audio: true }
    }
}

/// Parse a "WIDTHxHEIGHT" size
fn parse_size(s: &str) -> Result<(u32, u32)> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| KlipError::config(format!("Invalid surface size: {}", s)))?;
    let width = w
        .trim()
        .parse()
        .map_err(|_| KlipError::config(format!("Invalid surface width: {}", s)))?;
    let height = h
        .trim()
        .parse()
        .map_err(|_| KlipError::config(format!("Invalid surface height: {}", s)))?;
    Ok((width, height))
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("klip").join("config.toml")
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("klip")
                .join("config.toml")
        } else {
            PathBuf::from("/etc/klip/config.toml")
        }
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| KlipError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ConfigFile = toml::from_str(&content)
            .map_err(|e| KlipError::Config(format!("Failed to parse config file: {}", e)))?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load configuration, logging warnings but returning defaults on error
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::default_path())
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    KlipError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| KlipError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&path, content)
            .map_err(|e| KlipError::Config(format!("Failed to write config file: {}", e)))?;

        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Resolve into a validated runtime configuration
    pub fn to_studio_config(&self) -> Result<StudioConfig> {
        let preset = Preset::from_preset_str(&self.capture.preset)
            .ok_or_else(|| KlipError::config(format!("Unknown preset: {}", self.capture.preset)))?;

        let capture = CaptureConfig::default()
            .with_preset(preset)
            .with_processing(AudioProcessing {
                echo_cancellation: self.capture.echo_cancellation,
                noise_suppression: self.capture.noise_suppression,
                auto_gain_control: self.capture.auto_gain_control,
            });

        let render = RenderConfig {
            fps: self.render.fps,
            primary_size: parse_size(&self.render.surface)?,
            preview_size: parse_size(&self.render.preview)?,
            blur_radius: self.render.blur_radius,
            brightness_lift: self.render.brightness,
            mask: MaskGeometry {
                width: self.render.mask_width,
                height: self.render.mask_height,
                corner_radius: self.render.corner_radius,
            },
            ..RenderConfig::default()
        };

        let dir = self
            .templates
            .dir
            .clone()
            .unwrap_or_else(default_templates_dir);
        let mut templates = builtin_templates(&dir);
        templates.extend(self.templates.custom.iter().cloned());

        let config = StudioConfig {
            capture,
            render,
            display: DisplayConstraints {
                audio: self.share.audio,
            },
            templates,
        };
        config.validate_strict()?;

        for warning in config.capture.validate() {
            warn!("{}", warning);
        }

        Ok(config)
    }
}

/// Generate a sample configuration file
pub fn sample_config() -> String {
    r#"# Klip Configuration

[capture]
# Recording quality: 720p, 1080p, 4k
preset = "720p"

# Microphone processing applied by the host
echo_cancellation = true
noise_suppression = true
auto_gain_control = true

[render]
# Preview frame loop rate
fps = 60

# Primary and preview surface sizes
surface = "1280x720"
preview = "1280x720"

# Background blur radius (pixels) and brightness lift
blur_radius = 20.0
brightness = 1.1

# Foreground region drawn over template backgrounds
mask_width = 400.0
mask_height = 600.0
corner_radius = 40.0

[share]
# Capture system audio together with the shared screen
audio = true

[templates]
# Directory with gradient.jpg, nature.jpg, office.jpg, abstract.jpg, studio.jpg, modern.jpg
# dir = "/home/me/.local/share/klip/templates"

# Extra backgrounds
# [[templates.custom]]
# id = "beach"
# display_name = "Beach"
# image = "/home/me/Pictures/beach.jpg"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();
        assert_eq!(config.capture.preset, "720p");
        assert_eq!(config.render.fps, 60);
        assert!(config.share.audio);
    }

    #[test]
    fn test_sample_config_parses() {
        let sample = sample_config();
        let config: ConfigFile = toml::from_str(&sample).unwrap();
        assert_eq!(config.capture.preset, "720p");
        assert_eq!(config.render.surface, "1280x720");
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("640x360").unwrap(), (640, 360));
        assert_eq!(parse_size("1920X1080").unwrap(), (1920, 1080));
        assert!(parse_size("wide").is_err());
        assert!(parse_size("10xten").is_err());
    }
}
