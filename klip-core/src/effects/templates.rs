//! Background template cache
//!
//! Templates are decoded once at session start and shared read-only between
//! every output surface for the lifetime of the session.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{KlipError, Result, ResultExt};
use crate::types::VideoFrame;

/// Built-in template ids and display names
const BUILTIN: [(&str, &str); 6] = [
    ("gradient", "Gradient"),
    ("nature", "Nature"),
    ("office", "Office"),
    ("abstract", "Abstract"),
    ("studio", "Studio"),
    ("modern", "Modern"),
];

/// A selectable background replacement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundTemplate {
    /// Stable id used in effect selections
    pub id: String,
    /// Name shown in the effects picker
    pub display_name: String,
    /// Image file
    pub image: PathBuf,
}

impl BackgroundTemplate {
    /// Create a new template
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        image: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            image: image.into(),
        }
    }
}

/// The built-in templates with images at `<dir>/<id>.jpg`
pub fn builtin_templates(dir: &Path) -> Vec<BackgroundTemplate> {
    BUILTIN
        .iter()
        .map(|(id, name)| BackgroundTemplate::new(*id, *name, dir.join(format!("{}.jpg", id))))
        .collect()
}

/// A template with its decoded image
#[derive(Debug)]
pub struct LoadedTemplate {
    pub template: BackgroundTemplate,
    pub image: VideoFrame,
}

/// Immutable id -> decoded template map
#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: HashMap<String, Arc<LoadedTemplate>>,
}

/// Decode an image file into an RGBA frame
fn decode(path: &Path) -> Result<VideoFrame> {
    let image = image::open(path)?.to_rgba8();
    let (width, height) = image.dimensions();
    Ok(VideoFrame::new(width, height, image.into_raw()))
}

impl TemplateCache {
    /// Decode every template on blocking tasks
    ///
    /// Templates whose image fails to load are logged and left out, so they
    /// later fail selection as unknown effects.
    pub async fn load(templates: Vec<BackgroundTemplate>) -> Self {
        let mut tasks = Vec::with_capacity(templates.len());
        for template in templates {
            tasks.push(tokio::task::spawn_blocking(move || {
                let image = decode(&template.image)
                    .context(format!("Failed to load template '{}'", template.id));
                (template, image)
            }));
        }

        let mut entries = HashMap::new();
        for task in tasks {
            match task.await {
                Ok((template, Ok(image))) => {
                    debug!(
                        "Loaded template '{}' ({}x{})",
                        template.id, image.width, image.height
                    );
                    entries.insert(
                        template.id.clone(),
                        Arc::new(LoadedTemplate { template, image }),
                    );
                }
                Ok((_, Err(e))) => warn!("{}", e),
                Err(e) => warn!("Template loader task failed: {}", KlipError::from(e)),
            }
        }

        info!("Template cache ready with {} backgrounds", entries.len());
        Self { entries }
    }

    /// Build a cache from already-decoded images
    pub fn from_frames(frames: impl IntoIterator<Item = (BackgroundTemplate, VideoFrame)>) -> Self {
        let entries = frames
            .into_iter()
            .map(|(template, image)| {
                (
                    template.id.clone(),
                    Arc::new(LoadedTemplate { template, image }),
                )
            })
            .collect();
        Self { entries }
    }

    /// Look up a template by id
    pub fn get(&self, id: &str) -> Option<&Arc<LoadedTemplate>> {
        self.entries.get(id)
    }

    /// Whether a template id is loaded
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Loaded template ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of loaded templates
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no template loaded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
