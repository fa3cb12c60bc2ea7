//! Klip Core Library
//!
//! Client-side media capture and live preview effects for the Klip studio.
//!
//! This library provides:
//! - Camera/microphone capture sessions with atomic device switching
//! - Microphone loudness metering
//! - Background blur and template replacement on the camera preview
//! - Screen share with out-of-band termination detection
//! - A session controller exposing one consistent state snapshot
//!
//! The host (browser shim, native capture layer, test mock) is plugged in
//! through [`host::CaptureHost`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌────────────────┐    ┌──────────────────┐
//! │ CaptureHost     │───▶│ CaptureSession │───▶│ EffectsCompositor│──▶ Surfaces
//! │ (host capture)  │    │ + LevelMeter   │    │ (blur/template)  │
//! └─────────────────┘    └────────────────┘    └──────────────────┘
//!          │                                            ▲
//!          └──────▶ ScreenShareSession    SessionController (snapshot + commands)
//! ```

pub mod audio;
pub mod capture;
pub mod config;
pub mod controller;
pub mod devices;
pub mod effects;
pub mod error;
pub mod host;
pub mod prefs;
pub mod screen;
pub mod types;

pub use audio::AudioLevelMeter;
pub use capture::{CaptureSession, CaptureState};
pub use config::{CaptureConfig, ConfigFile, Preset, RenderConfig, StudioConfig};
pub use controller::{FrameTick, SessionController, SessionEvent, SessionSnapshot};
pub use devices::{DeviceInventory, DeviceList};
pub use effects::{EffectSelection, EffectsCompositor, RenderOutcome};
pub use error::{KlipError, Result};
pub use host::{ActiveStream, CaptureHost, MediaTrack, TrackRef, TrackState};
pub use screen::{EndReason, ScreenShareEvent, ScreenShareSession};
pub use types::{DeviceDescriptor, DeviceKind, Handle, TrackKind, VideoFrame};
