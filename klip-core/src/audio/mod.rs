//! Microphone loudness metering
//!
//! Time-domain samples from the microphone track go through a spectrum
//! analyser; the mean byte magnitude becomes a 0-100 level published on a
//! watch channel.

mod analyser;
mod meter;

pub use analyser::{
    level_from_spectrum, AnalyserConfig, SpectrumAnalyser, DEFAULT_FFT_SIZE, DEFAULT_SMOOTHING,
};
pub use meter::AudioLevelMeter;
