//! Live preview effects
//!
//! The compositor renders the camera frame through the selected effect onto
//! one or more output surfaces at display frame rate:
//!
//! ```text
//!                          ┌────────────────┐──▶ primary Surface
//! camera frame ──────────▶ │ EffectsCompositor │
//!   TemplateCache (Arc) ──▶ └────────────────┘──▶ preview Surface
//! ```

mod compositor;
mod filters;
mod surface;
mod templates;

pub use compositor::{EffectsCompositor, RenderOutcome, VideoAdjustments};
pub use filters::{brightness, contrast, gaussian_blur, Filter};
pub use surface::{Rect, RoundedRect, Surface};
pub use templates::{builtin_templates, BackgroundTemplate, LoadedTemplate, TemplateCache};

use serde::{Deserialize, Serialize};

/// Selected visual effect
///
/// Persisted as a plain string: `"none"`, `"blur"` or a template id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EffectSelection {
    /// Raw camera frame
    #[default]
    None,
    /// Blurred, slightly brightened camera frame
    Blur,
    /// Background template with the camera frame in the foreground region
    Template(String),
}

impl EffectSelection {
    /// Template selection by id
    pub fn template(id: impl Into<String>) -> Self {
        Self::Template(id.into())
    }

    /// String key used for persistence
    pub fn key(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Blur => "blur",
            Self::Template(id) => id,
        }
    }
}

impl From<String> for EffectSelection {
    fn from(s: String) -> Self {
        match s.as_str() {
            "" | "none" => Self::None,
            "blur" => Self::Blur,
            _ => Self::Template(s),
        }
    }
}

impl From<&str> for EffectSelection {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<EffectSelection> for String {
    fn from(selection: EffectSelection) -> Self {
        match selection {
            EffectSelection::Template(id) => id,
            other => other.key().to_string(),
        }
    }
}

impl std::fmt::Display for EffectSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Compositor render state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositorState {
    /// No effect selected yet, nothing is rendered
    Idle,
    RenderingNone,
    RenderingBlur,
    RenderingTemplate(String),
}

impl CompositorState {
    /// Effect this state renders, `None` while idle
    pub fn selection(&self) -> Option<EffectSelection> {
        match self {
            Self::Idle => None,
            Self::RenderingNone => Some(EffectSelection::None),
            Self::RenderingBlur => Some(EffectSelection::Blur),
            Self::RenderingTemplate(id) => Some(EffectSelection::Template(id.clone())),
        }
    }
}
