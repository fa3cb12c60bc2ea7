//! Effects compositor
//!
//! Fans one source frame out to every output surface per tick. Surfaces are
//! rendered one after another inside a tick, so a surface never sees two
//! overlapping renders.

use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::filters::Filter;
use super::surface::{Rect, RoundedRect, Surface};
use super::templates::TemplateCache;
use super::{CompositorState, EffectSelection};
use crate::config::RenderConfig;
use crate::error::{KlipError, Result};
use crate::types::VideoFrame;

/// Manual picture adjustments applied after the effect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoAdjustments {
    /// Brightness multiplier (1.0 = unchanged)
    pub brightness: f32,
    /// Contrast multiplier (1.0 = unchanged)
    pub contrast: f32,
}

impl Default for VideoAdjustments {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            contrast: 1.0,
        }
    }
}

impl VideoAdjustments {
    /// From 0..=100 settings sliders where 50 is neutral
    pub fn from_sliders(brightness: u8, contrast: u8) -> Self {
        Self {
            brightness: (brightness.min(100) as f32 + 50.0) / 100.0,
            contrast: (contrast.min(100) as f32 + 50.0) / 100.0,
        }
    }

    /// Whether the adjustments change nothing
    pub fn is_neutral(&self) -> bool {
        Filter::Brightness(self.brightness).is_identity() && Filter::Contrast(self.contrast).is_identity()
    }
}

/// Result of one compositor tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// No effect selected (or rendering paused), surfaces untouched
    Idle,
    /// Source frame not ready yet; retried next tick
    Skipped,
    /// Composited onto this many surfaces
    Rendered(usize),
}

/// Renders camera frames through the selected effect
#[derive(Debug)]
pub struct EffectsCompositor {
    /// Blur, mask and border settings
    settings: RenderConfig,
    /// Current render state
    state: CompositorState,
    /// Template cache, `None` until loaded
    templates: Option<Arc<TemplateCache>>,
    /// Picture adjustments
    adjustments: VideoAdjustments,
    /// Surface renders completed
    frames_rendered: u64,
    /// Ticks skipped for lack of a ready frame
    ticks_skipped: u64,
}

impl EffectsCompositor {
    /// Create an idle compositor
    pub fn new(settings: RenderConfig) -> Self {
        Self {
            settings,
            state: CompositorState::Idle,
            templates: None,
            adjustments: VideoAdjustments::default(),
            frames_rendered: 0,
            ticks_skipped: 0,
        }
    }

    /// Install the loaded template cache
    pub fn install_templates(&mut self, templates: Arc<TemplateCache>) {
        debug!("Compositor received {} templates", templates.len());
        self.templates = Some(templates);
    }

    /// Whether the template cache has been installed
    pub fn templates_loaded(&self) -> bool {
        self.templates.is_some()
    }

    /// Shared template cache, if loaded
    pub fn templates(&self) -> Option<&Arc<TemplateCache>> {
        self.templates.as_ref()
    }

    /// Select an effect
    ///
    /// Template selections are checked against the cache. On error the
    /// previous state is kept.
    pub fn set_effect(&mut self, selection: &EffectSelection) -> Result<()> {
        let next = match selection {
            EffectSelection::None => CompositorState::RenderingNone,
            EffectSelection::Blur => CompositorState::RenderingBlur,
            EffectSelection::Template(id) => {
                let templates = self
                    .templates
                    .as_ref()
                    .ok_or_else(|| KlipError::TemplatesNotLoaded(id.clone()))?;
                if !templates.contains(id) {
                    return Err(KlipError::UnknownEffect(id.clone()));
                }
                CompositorState::RenderingTemplate(id.clone())
            }
        };

        if next != self.state {
            debug!("Compositor state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
        Ok(())
    }

    /// Return to idle
    pub fn reset(&mut self) {
        self.state = CompositorState::Idle;
    }

    /// Current state
    pub fn state(&self) -> &CompositorState {
        &self.state
    }

    /// Current effect; `None` while idle
    pub fn effect(&self) -> EffectSelection {
        self.state.selection().unwrap_or_default()
    }

    /// Set picture adjustments
    pub fn set_adjustments(&mut self, adjustments: VideoAdjustments) {
        self.adjustments = adjustments;
    }

    /// Current picture adjustments
    pub fn adjustments(&self) -> VideoAdjustments {
        self.adjustments
    }

    /// Surface renders completed so far
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Ticks skipped because the source frame was not ready
    pub fn ticks_skipped(&self) -> u64 {
        self.ticks_skipped
    }

    /// Composite one source frame onto every surface
    pub fn render(&mut self, frame: Option<&VideoFrame>, surfaces: &mut [&mut Surface]) -> RenderOutcome {
        if self.state == CompositorState::Idle {
            return RenderOutcome::Idle;
        }

        let Some(frame) = frame.filter(|f| f.is_ready()) else {
            self.ticks_skipped += 1;
            trace!("Source frame not ready, skipping tick");
            return RenderOutcome::Skipped;
        };

        for surface in surfaces.iter_mut() {
            self.compose(frame, surface);
        }
        self.frames_rendered += surfaces.len() as u64;
        RenderOutcome::Rendered(surfaces.len())
    }

    fn compose(&self, frame: &VideoFrame, surface: &mut Surface) {
        let full = Rect::full(surface.width(), surface.height());
        surface.clear();

        match &self.state {
            CompositorState::Idle => return,
            CompositorState::RenderingNone => surface.draw_image(frame, full, None),
            CompositorState::RenderingBlur => {
                surface.draw_image(frame, full, None);
                surface.apply_filter(Filter::Blur {
                    radius: self.settings.blur_radius,
                });
                surface.apply_filter(Filter::Brightness(self.settings.brightness_lift));
            }
            CompositorState::RenderingTemplate(id) => {
                match self.templates.as_ref().and_then(|t| t.get(id)) {
                    Some(background) => {
                        surface.draw_image(&background.image, full, None);
                        let mask = &self.settings.mask;
                        let region = Rect::centered(surface.size(), mask.width, mask.height);
                        let clip = RoundedRect::new(region, mask.corner_radius);
                        surface.draw_image(frame, region, Some(&clip));
                        surface.stroke_rect(
                            region,
                            self.settings.border_color,
                            self.settings.border_width,
                        );
                    }
                    None => {
                        warn!("Template '{}' vanished from cache, drawing raw frame", id);
                        surface.draw_image(frame, full, None);
                    }
                }
            }
        }

        if !self.adjustments.is_neutral() {
            surface.apply_filter(Filter::Brightness(self.adjustments.brightness));
            surface.apply_filter(Filter::Contrast(self.adjustments.contrast));
        }
    }
}
