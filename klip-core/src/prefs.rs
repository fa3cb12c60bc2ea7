//! Persisted session preferences
//!
//! The last-used effect, device selection and camera/mic state are read once
//! when a session starts and written once when it ends. File I/O runs on the
//! blocking pool so it never stalls the frame loop.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::data_dir;
use crate::effects::EffectSelection;
use crate::error::{KlipError, Result, ResultExt};
use crate::types::DeviceSelection;

/// Last-used session selections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Selected effect
    pub effect: EffectSelection,
    /// Selected devices
    pub devices: DeviceSelection,
    /// Camera on at start
    pub camera_enabled: bool,
    /// Microphone on at start
    pub microphone_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            effect: EffectSelection::None,
            devices: DeviceSelection::default(),
            camera_enabled: true,
            microphone_enabled: true,
        }
    }
}

/// JSON preference file
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    /// Store backed by a specific file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Per-project store at `<data dir>/klip/settings-<id>.json`
    pub fn for_project(id: &str) -> Self {
        Self::new(data_dir().join(format!("settings-{}.json", id)))
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read preferences; a missing file gives defaults
    pub async fn load(&self) -> Result<Preferences> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read(&path)).await?
    }

    /// Write preferences, creating parent directories
    pub async fn save(&self, prefs: &Preferences) -> Result<()> {
        let path = self.path.clone();
        let json = serde_json::to_string_pretty(prefs)?;
        tokio::task::spawn_blocking(move || write(&path, &json)).await?
    }
}

fn read(path: &Path) -> Result<Preferences> {
    if !path.exists() {
        debug!("No preferences at {:?}, using defaults", path);
        return Ok(Preferences::default());
    }
    let content = std::fs::read_to_string(path)?;
    let prefs = serde_json::from_str(&content)
        .map_err(KlipError::from)
        .context(format!("Invalid preferences file {:?}", path))?;
    debug!("Loaded preferences from {:?}", path);
    Ok(prefs)
}

fn write(path: &Path, json: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)?;
    info!("Saved preferences to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_enable_both() {
        let prefs = Preferences::default();
        assert!(prefs.camera_enabled);
        assert!(prefs.microphone_enabled);
        assert_eq!(prefs.effect, EffectSelection::None);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let prefs: Preferences = serde_json::from_str(r#"{"effect":"blur"}"#).unwrap();
        assert_eq!(prefs.effect, EffectSelection::Blur);
        assert!(prefs.camera_enabled);
        assert_eq!(prefs.devices, DeviceSelection::default());
    }

    #[test]
    fn test_project_path() {
        let store = PreferenceStore::for_project("demo");
        assert!(store.path().ends_with("klip/settings-demo.json"));
    }

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::new(dir.path().join("nope.json"));
        assert_eq!(store.load().await.unwrap(), Preferences::default());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::new(dir.path().join("nested").join("settings.json"));
        let mut prefs = Preferences {
            effect: EffectSelection::template("office"),
            camera_enabled: false,
            ..Default::default()
        };
        prefs.devices.camera_id = Some("cam-2".into());
        store.save(&prefs).await.unwrap();
        assert_eq!(store.load().await.unwrap(), prefs);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = PreferenceStore::new(path).load().await.unwrap_err();
        assert!(matches!(err.root(), KlipError::Serialization(_)));
    }
}
