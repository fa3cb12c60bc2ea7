//! Local camera and microphone capture
//!
//! This module handles:
//! - Acquiring camera/microphone tracks from the host
//! - Track-level enable/disable without renegotiation
//! - Atomic per-kind device switching
//! - Discarding hardware grants that arrive after a stop

mod session;

pub use session::{CaptureSession, CaptureState};
