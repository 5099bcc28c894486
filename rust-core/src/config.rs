//! Analysis configuration
//!
//! Every component receives its tunables explicitly. Sections mirror the
//! `analysis` block of the application's JSON configuration; missing keys
//! fall back to the defaults below.

use crate::error::{AnalysisError, Result};
use crate::filters::windows::WindowType;
use serde::Deserialize;
use std::io::Read;

/// Ordered sample-count policy: the first step whose `below` limit exceeds
/// the sample count wins, otherwise the fallback applies.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable<T> {
    steps: Vec<(usize, T)>,
    fallback: T,
}

impl<T: Clone> ThresholdTable<T> {
    /// Build a table from `(below, value)` steps
    ///
    /// Steps are sorted by ascending limit so lookups are independent of the
    /// order they were declared in.
    pub fn new(mut steps: Vec<(usize, T)>, fallback: T) -> Self {
        steps.sort_by_key(|(below, _)| *below);
        Self { steps, fallback }
    }

    /// Value for a slice of `n` samples
    pub fn lookup(&self, n: usize) -> T {
        self.steps
            .iter()
            .find(|(below, _)| n < *below)
            .map(|(_, value)| value.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }

    pub fn steps(&self) -> &[(usize, T)] {
        &self.steps
    }
}

/// Plasma duration detection (`cal_duration`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DurationConfig {
    /// Fraction of the trace maximum a sample must exceed
    pub threshold_factor: f64,

    /// Absolute floor a sample must reach
    pub min_val: f64,

    /// Start-time gate; currently both branches compute the same duration
    pub min_start_time_threshold: f64,
}

impl Default for DurationConfig {
    fn default() -> Self {
        Self {
            threshold_factor: 0.095,
            min_val: 2500.0,
            min_start_time_threshold: 300.0,
        }
    }
}

/// Band-limited filtering of the analysis window (`wavelet`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WaveletConfig {
    pub filter_order_default: usize,
    pub filter_order_medium: usize,
    pub filter_order_short: usize,

    /// Slices shorter than this use `filter_order_medium`
    pub order_medium_below: usize,

    /// Slices shorter than this use `filter_order_short`
    pub order_short_below: usize,

    /// Symmetric clip width applied before filtering
    pub norm_width: f64,

    /// Guard band (Hz) kept away from DC and Nyquist
    pub filter_low_margin: f64,

    pub winsize_default: usize,
    pub winsize_short: usize,

    /// Slices of at most this many samples use `winsize_short`
    pub min_samples_short: usize,

    /// Slices of at most this many samples are returned clipped only
    pub min_samples_very_short: usize,
}

impl Default for WaveletConfig {
    fn default() -> Self {
        Self {
            filter_order_default: 16,
            filter_order_medium: 4,
            filter_order_short: 2,
            order_medium_below: 400,
            order_short_below: 100,
            norm_width: 0.5,
            filter_low_margin: 100.0,
            winsize_default: 11,
            winsize_short: 5,
            min_samples_short: 11,
            min_samples_very_short: 5,
        }
    }
}

impl WaveletConfig {
    /// Filter order by slice length
    pub fn filter_order_table(&self) -> ThresholdTable<usize> {
        ThresholdTable::new(
            vec![
                (self.order_short_below, self.filter_order_short),
                (self.order_medium_below, self.filter_order_medium),
            ],
            self.filter_order_default,
        )
    }

    /// Smoothing window by slice length; `None` skips filtering and smoothing
    pub fn smoothing_window_table(&self) -> ThresholdTable<Option<usize>> {
        ThresholdTable::new(
            vec![
                (self.min_samples_very_short + 1, None),
                (self.min_samples_short + 1, Some(self.winsize_short)),
            ],
            Some(self.winsize_default),
        )
    }
}

/// Savitzky-Golay smoothing (`savgol`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SavgolConfig {
    pub polyorder: usize,

    /// Slices shorter than this are not filtered at all
    pub min_len_for_filter: usize,
}

impl Default for SavgolConfig {
    fn default() -> Self {
        Self {
            polyorder: 3,
            min_len_for_filter: 100,
        }
    }
}

/// Short-time Fourier transform (`spectrogram`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpectrogramConfig {
    pub noverlap_ratio: f64,
    pub default_nfft: usize,

    /// Segment taper, Hann unless configured
    pub window: WindowType,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            noverlap_ratio: 0.5,
            default_nfft: 512,
            window: WindowType::Hann,
        }
    }
}

/// Spatial structure reconstruction (`spatial`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Base radius of the probe ring
    pub radius: f64,

    /// Display amplitude of the normalized mode
    pub factor: f64,

    /// Number of points evaluated along the spline
    pub interp_points: usize,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            radius: 40.0,
            factor: 15.0,
            interp_points: 200,
        }
    }
}

/// Peak extraction (`peaks`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PeakConfig {
    /// Minimum separation in samples between peaks on one channel
    pub distance: usize,
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self { distance: 10 }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub cal_duration: DurationConfig,
    pub wavelet: WaveletConfig,
    pub savgol: SavgolConfig,
    pub spectrogram: SpectrogramConfig,
    pub spatial: SpatialConfig,
    pub peaks: PeakConfig,
}

impl AnalysisConfig {
    /// Parse a JSON document
    ///
    /// Accepts either the analysis section itself or a full application
    /// config holding it under `"analysis"`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| AnalysisError::InvalidParameter(format!("config: {}", e)))?;
        Self::from_value(value)
    }

    /// Parse a JSON document from a reader
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_reader(reader)
            .map_err(|e| AnalysisError::InvalidParameter(format!("config: {}", e)))?;
        Self::from_value(value)
    }

    fn from_value(mut value: serde_json::Value) -> Result<Self> {
        if let Some(section) = value.get_mut("analysis") {
            value = section.take();
        }
        serde_json::from_value(value)
            .map_err(|e| AnalysisError::InvalidParameter(format!("config: {}", e)))
    }
}
