//! Error types for Klip

use thiserror::Error;

use crate::types::{DeviceKind, TrackKind};

/// Result type alias using KlipError
pub type Result<T> = std::result::Result<T, KlipError>;

/// Main error type for Klip operations
#[derive(Debug, Error)]
pub enum KlipError {
    /// User or OS denied capture access
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Requested device id no longer exists (stale id, unplugged)
    #[error("Device unavailable: {kind} '{id}'")]
    DeviceUnavailable { kind: DeviceKind, id: String },

    /// Share picker (or other host prompt) dismissed without a selection
    #[error("Cancelled by user")]
    UserCancelled,

    /// Effect selection names a template that is not in the cache
    #[error("Unknown effect: {0}")]
    UnknownEffect(String),

    /// Template selected before the template cache finished loading
    #[error("Background templates not loaded yet (requested '{0}')")]
    TemplatesNotLoaded(String),

    /// Capture session not active
    #[error("No active capture session")]
    NoActiveSession,

    /// Session already running
    #[error("Capture session already running")]
    SessionAlreadyRunning,

    /// Operation needs a track the session does not hold
    #[error("No active {0} track")]
    NoActiveTrack(TrackKind),

    /// A hardware grant arrived after the session was stopped or restarted
    #[error("Acquisition superseded by a later stop or start")]
    Superseded,

    /// Track handed to a component that cannot use it
    #[error("Invalid track: {0}")]
    InvalidTrack(String),

    /// Host capture API failure not covered above
    #[error("Host error: {0}")]
    Host(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Image decoding error
    #[error("Image error: {0}")]
    Image(String),

    /// Preference (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<KlipError>,
    },
}

impl KlipError {
    /// Create a permission error
    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission(msg.into())
    }

    /// Create a device-unavailable error
    pub fn device_unavailable(kind: DeviceKind, id: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            kind,
            id: id.into(),
        }
    }

    /// Create a host error
    pub fn host(msg: impl Into<String>) -> Self {
        Self::Host(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping context wrappers
    pub fn root(&self) -> &KlipError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this error is an expected no-op rather than a failure
    pub fn is_silent(&self) -> bool {
        matches!(self.root(), Self::UserCancelled)
    }

    /// Hint for the user on how to recover, if there is one
    pub fn user_hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::Permission(_) => {
                Some("Allow camera and microphone access in your browser or system settings")
            }
            Self::DeviceUnavailable { .. } => {
                Some("The device was disconnected; pick another one from the device list")
            }
            Self::TemplatesNotLoaded(_) => Some("Wait for background templates to finish loading"),
            Self::Config(_) => Some("Check ~/.config/klip/config.toml for invalid values"),
            Self::Image(_) => Some("Check that the background template files are valid images"),
            _ => None,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

// Conversions from external error types

impl From<image::ImageError> for KlipError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err.to_string())
    }
}

impl From<serde_json::Error> for KlipError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<tokio::task::JoinError> for KlipError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Host(format!("background task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_skips_context() {
        let err = KlipError::UserCancelled
            .with_context("share")
            .with_context("controller");
        assert!(matches!(err.root(), KlipError::UserCancelled));
        assert!(err.is_silent());
    }

    #[test]
    fn test_device_unavailable_message() {
        let err = KlipError::device_unavailable(DeviceKind::Camera, "nonexistent");
        assert_eq!(err.to_string(), "Device unavailable: camera 'nonexistent'");
    }
}
