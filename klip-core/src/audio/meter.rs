//! Microphone level meter

use tokio::sync::watch;
use tracing::{debug, trace};

use super::analyser::{level_from_spectrum, AnalyserConfig, SpectrumAnalyser};
use crate::error::{KlipError, Result};
use crate::host::{TrackRef, TrackState};
use crate::types::TrackKind;

/// Derives a 0-100 loudness value from an audio track
///
/// Driven by [`tick`](Self::tick) at the frame cadence. While the attached
/// track is disabled or ended the meter reports 0 on every tick.
#[derive(Debug)]
pub struct AudioLevelMeter {
    /// Attached microphone track
    track: Option<TrackRef>,
    /// Spectrum analyser
    analyser: SpectrumAnalyser,
    /// Time-domain scratch buffer
    samples: Vec<f32>,
    /// Byte spectrum scratch buffer
    spectrum: Vec<u8>,
    /// Whether the last tick was silenced (disabled/ended track)
    silenced: bool,
    /// Published level
    level_tx: watch::Sender<f32>,
}

impl AudioLevelMeter {
    /// Create a detached meter
    pub fn new() -> Self {
        Self::with_config(AnalyserConfig::default())
    }

    /// Create a detached meter with custom analyser tuning
    pub fn with_config(config: AnalyserConfig) -> Self {
        let analyser = SpectrumAnalyser::new(config);
        let (level_tx, _) = watch::channel(0.0);
        Self {
            track: None,
            samples: vec![0.0; analyser.fft_size()],
            spectrum: vec![0; analyser.bin_count()],
            analyser,
            silenced: true,
            level_tx,
        }
    }

    /// Start sampling an audio track, replacing any previous one
    pub fn attach(&mut self, track: TrackRef) -> Result<()> {
        if track.kind() != TrackKind::Audio {
            return Err(KlipError::InvalidTrack(format!(
                "level meter needs an audio track, got {} track {}",
                track.kind(),
                track.handle()
            )));
        }
        debug!("Level meter attached to {} ({})", track.label(), track.handle());
        self.analyser.reset();
        self.track = Some(track);
        Ok(())
    }

    /// Stop sampling and release analysis state
    pub fn detach(&mut self) {
        if let Some(track) = self.track.take() {
            debug!("Level meter detached from {}", track.handle());
        }
        self.analyser.reset();
        self.silenced = true;
        self.level_tx.send_replace(0.0);
    }

    /// Whether a track is attached
    pub fn is_attached(&self) -> bool {
        self.track.is_some()
    }

    /// Handle of the attached track
    pub fn track(&self) -> Option<&TrackRef> {
        self.track.as_ref()
    }

    /// Take one sample and publish the new level
    pub fn tick(&mut self) -> f32 {
        let level = match &self.track {
            Some(track) if track.is_enabled() && track.ready_state() == TrackState::Live => {
                if self.silenced {
                    self.analyser.reset();
                    self.silenced = false;
                }
                self.samples.fill(0.0);
                track.read_samples(&mut self.samples);
                self.analyser.analyse(&self.samples, &mut self.spectrum);
                level_from_spectrum(&self.spectrum)
            }
            _ => {
                self.silenced = true;
                0.0
            }
        };

        trace!("Audio level {:.1}", level);
        self.level_tx.send_replace(level);
        level
    }

    /// Last published level
    pub fn level(&self) -> f32 {
        *self.level_tx.borrow()
    }

    /// Subscribe to level updates
    pub fn subscribe(&self) -> watch::Receiver<f32> {
        self.level_tx.subscribe()
    }
}

impl Default for AudioLevelMeter {
    fn default() -> Self {
        Self::new()
    }
}
