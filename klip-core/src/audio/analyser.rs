//! Frequency-domain analyser
//!
//! Byte spectrum in the style of a Web Audio `AnalyserNode`: Blackman window,
//! magnitude spectrum scaled by 1/N, exponential smoothing over time and a
//! linear dB -> 0..=255 mapping.

use std::f32::consts::PI;

/// Default FFT size (128 frequency bins)
pub const DEFAULT_FFT_SIZE: usize = 256;
/// Default smoothing time constant
pub const DEFAULT_SMOOTHING: f32 = 0.8;
/// Default lower bound of the byte range in dB
pub const DEFAULT_MIN_DECIBELS: f32 = -100.0;
/// Default upper bound of the byte range in dB
pub const DEFAULT_MAX_DECIBELS: f32 = -30.0;

/// Analyser tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyserConfig {
    /// Samples per analysis window, a power of two
    pub fft_size: usize,
    /// Weight of the previous spectrum in [0, 1)
    pub smoothing: f32,
    /// dB mapped to byte 0
    pub min_decibels: f32,
    /// dB mapped to byte 255
    pub max_decibels: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            smoothing: DEFAULT_SMOOTHING,
            min_decibels: DEFAULT_MIN_DECIBELS,
            max_decibels: DEFAULT_MAX_DECIBELS,
        }
    }
}

/// Time-domain samples to byte spectrum
#[derive(Debug, Clone)]
pub struct SpectrumAnalyser {
    config: AnalyserConfig,
    window: Vec<f32>,
    cos: Vec<f32>,
    sin: Vec<f32>,
    smoothed: Vec<f32>,
}

impl SpectrumAnalyser {
    /// Create an analyser
    pub fn new(mut config: AnalyserConfig) -> Self {
        config.fft_size = config.fft_size.max(32).next_power_of_two();
        config.smoothing = config.smoothing.clamp(0.0, 0.99);
        let n = config.fft_size;

        let window = (0..n)
            .map(|i| {
                let x = i as f32 / n as f32;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();
        let cos = (0..n).map(|j| (2.0 * PI * j as f32 / n as f32).cos()).collect();
        let sin = (0..n).map(|j| (2.0 * PI * j as f32 / n as f32).sin()).collect();

        Self {
            config,
            window,
            cos,
            sin,
            smoothed: vec![0.0; n / 2],
        }
    }

    /// Samples consumed per analysis
    pub fn fft_size(&self) -> usize {
        self.config.fft_size
    }

    /// Number of output bins
    pub fn bin_count(&self) -> usize {
        self.config.fft_size / 2
    }

    /// Forget the smoothed history
    pub fn reset(&mut self) {
        self.smoothed.fill(0.0);
    }

    /// Analyse one window of samples into `out` (one byte per bin)
    ///
    /// Missing and non-finite samples are treated as silence.
    pub fn analyse(&mut self, samples: &[f32], out: &mut [u8]) {
        let n = self.config.fft_size;
        let tau = self.config.smoothing;
        let range = self.config.max_decibels - self.config.min_decibels;

        let windowed: Vec<f32> = (0..n)
            .map(|i| {
                let x = samples.get(i).copied().filter(|x| x.is_finite());
                x.unwrap_or(0.0) * self.window[i]
            })
            .collect();

        for (k, smoothed) in self.smoothed.iter_mut().enumerate() {
            let (mut re, mut im) = (0.0f32, 0.0f32);
            for (i, x) in windowed.iter().enumerate() {
                let j = (k * i) % n;
                re += x * self.cos[j];
                im -= x * self.sin[j];
            }
            let magnitude = (re * re + im * im).sqrt() / n as f32;
            *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;

            if let Some(byte) = out.get_mut(k) {
                let db = 20.0 * smoothed.max(f32::MIN_POSITIVE).log10();
                let scaled = 255.0 / range * (db - self.config.min_decibels);
                *byte = scaled.clamp(0.0, 255.0) as u8;
            }
        }
    }
}

impl Default for SpectrumAnalyser {
    fn default() -> Self {
        Self::new(AnalyserConfig::default())
    }
}

/// Map a byte spectrum to a 0-100 level: mean byte / 2.55, clipped at 100
pub fn level_from_spectrum(spectrum: &[u8]) -> f32 {
    if spectrum.is_empty() {
        return 0.0;
    }
    let sum: u32 = spectrum.iter().map(|&b| b as u32).sum();
    let mean = sum as f32 / spectrum.len() as f32;
    (mean / 2.55).clamp(0.0, 100.0)
}
