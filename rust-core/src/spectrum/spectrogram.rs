//! Short-time Fourier spectrogram of a single channel
//!
//! Segments are mean-detrended, windowed and transformed with a real FFT;
//! power is reported as a one-sided power spectral density.

use super::fft::FftEngine;
use super::windowing::{density_scale, detrend_and_window};
use crate::config::SpectrogramConfig;
use crate::error::{AnalysisError, Result};
use crate::filters::windows::periodic_window;
use ndarray::{Array1, Array2};

/// Segmentation parameters for one spectrogram call
///
/// Unset fields fall back to the estimator's configuration: a 1 ms segment,
/// overlap `noverlap_ratio` of the segment and `default_nfft` FFT points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrogramParams {
    /// Segment length in samples
    pub nperseg: Option<usize>,

    /// Segment length in milliseconds (takes precedence over `nperseg`)
    pub window_ms: Option<f64>,

    /// Overlap between segments in samples
    pub noverlap: Option<usize>,

    /// FFT size; raised to the segment length when smaller
    pub nfft: Option<usize>,
}

/// Spectrogram output
#[derive(Debug, Clone)]
pub struct Spectrogram {
    /// Bin frequencies in Hz
    pub frequencies: Array1<f64>,

    /// Segment centers in seconds from the first sample
    pub times: Array1<f64>,

    /// Power spectral density, (frequency, time)
    pub power: Array2<f64>,
}

/// Single-channel STFT estimator
#[derive(Debug, Clone, Default)]
pub struct SpectralEstimator {
    config: SpectrogramConfig,
}

impl SpectralEstimator {
    pub fn new(config: SpectrogramConfig) -> Self {
        Self { config }
    }

    /// Compute the spectrogram of one channel
    ///
    /// # Arguments
    /// * `data` - Channel samples
    /// * `sample_rate` - Sample rate in Hz
    /// * `params` - Segmentation overrides
    pub fn compute(
        &self,
        data: &[f64],
        sample_rate: f64,
        params: &SpectrogramParams,
    ) -> Result<Spectrogram> {
        if sample_rate <= 0.0 || !sample_rate.is_finite() {
            return Err(AnalysisError::InvalidParameter(format!(
                "sample rate {} must be positive",
                sample_rate
            )));
        }
        if data.is_empty() {
            return Err(AnalysisError::InvalidParameter(
                "spectrogram of an empty signal".to_string(),
            ));
        }

        let requested = match (params.window_ms, params.nperseg) {
            (Some(ms), _) => (ms * sample_rate / 1000.0) as usize,
            (None, Some(n)) => n,
            (None, None) => (0.001 * sample_rate) as usize,
        };
        if requested == 0 {
            return Err(AnalysisError::InvalidParameter(
                "segment length rounds to zero samples".to_string(),
            ));
        }
        let nperseg = requested.min(data.len());

        let noverlap = params
            .noverlap
            .unwrap_or((nperseg as f64 * self.config.noverlap_ratio) as usize);
        if noverlap >= nperseg {
            return Err(AnalysisError::InvalidParameter(format!(
                "overlap {} must be less than segment length {}",
                noverlap, nperseg
            )));
        }

        let nfft = params.nfft.unwrap_or(self.config.default_nfft).max(nperseg);
        let step = nperseg - noverlap;
        let num_segments = (data.len() - noverlap) / step;

        let window = periodic_window(self.config.window, nperseg);
        let scale = density_scale(&window, sample_rate);
        let mut engine = FftEngine::new(nfft);
        let num_bins = engine.num_bins();

        let mut power = Array2::<f64>::zeros((num_bins, num_segments));
        for seg in 0..num_segments {
            let start = seg * step;
            let segment = detrend_and_window(&data[start..start + nperseg], &window);
            let spectrum = engine.compute_power(&segment)?;

            for (bin, &p) in spectrum.iter().enumerate() {
                // One-sided: fold negative frequencies except DC and Nyquist
                let doubled = bin != 0 && !(nfft % 2 == 0 && bin == num_bins - 1);
                power[[bin, seg]] = if doubled { 2.0 * p * scale } else { p * scale };
            }
        }

        let times = Array1::from_iter(
            (0..num_segments).map(|seg| (nperseg as f64 / 2.0 + (seg * step) as f64) / sample_rate),
        );

        Ok(Spectrogram {
            frequencies: Array1::from(engine.frequency_axis_hz(sample_rate)),
            times,
            power,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::windows::WindowType;
    use std::f64::consts::PI;

    fn tone(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| (2.0 * PI * freq * i as f64 / fs).sin()).collect()
    }

    #[test]
    fn test_default_segmentation() {
        let fs = 200_000.0;
        let data = tone(10_000.0, fs, 2000);
        let estimator = SpectralEstimator::default();
        assert_eq!(SpectrogramConfig::default().window, WindowType::Hann);
        let spec = estimator.compute(&data, fs, &SpectrogramParams::default()).unwrap();

        // 1 ms → 200 samples, 100 overlap, 512-point FFT
        assert_eq!(spec.frequencies.len(), 257);
        assert_eq!(spec.times.len(), (2000 - 100) / 100);
        assert_eq!(spec.power.dim(), (257, 19));
        assert!((spec.times[0] - 100.0 / fs).abs() < 1e-12);
        assert!((spec.times[1] - spec.times[0] - 100.0 / fs).abs() < 1e-12);
    }

    #[test]
    fn test_tone_peak_frequency() {
        let fs = 200_000.0;
        let data = tone(25_000.0, fs, 4000);
        let estimator = SpectralEstimator::new(SpectrogramConfig {
            window: WindowType::Hann,
            ..SpectrogramConfig::default()
        });
        let spec = estimator
            .compute(&data, fs, &SpectrogramParams { window_ms: Some(2.0), ..Default::default() })
            .unwrap();

        let column = spec.power.column(3);
        let (peak_bin, _) = column
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .unwrap();
        assert!((spec.frequencies[peak_bin] - 25_000.0).abs() <= fs / 400.0);
    }

    #[test]
    fn test_density_integrates_to_variance() {
        // Unit-variance alternating sequence puts all power in the Nyquist bin
        let fs = 1000.0;
        let data: Vec<f64> = (0..256).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let estimator = SpectralEstimator::new(SpectrogramConfig {
            window: WindowType::Rectangular,
            ..SpectrogramConfig::default()
        });
        let params = SpectrogramParams {
            nperseg: Some(64),
            noverlap: Some(0),
            nfft: Some(64),
            ..Default::default()
        };
        let spec = estimator.compute(&data, fs, &params).unwrap();
        let df = fs / 64.0;
        let total: f64 = spec.power.column(0).iter().sum::<f64>() * df;
        assert!((total - 1.0).abs() < 1e-9, "integrated power {}", total);
    }

    #[test]
    fn test_short_signal_clamps_segment() {
        let spec = SpectralEstimator::default()
            .compute(&[1.0, 2.0, 3.0, 4.0], 200_000.0, &SpectrogramParams::default())
            .unwrap();
        assert_eq!(spec.times.len(), 1);
    }

    #[test]
    fn test_invalid_inputs() {
        let estimator = SpectralEstimator::default();
        assert!(estimator.compute(&[], 1000.0, &SpectrogramParams::default()).is_err());
        assert!(estimator.compute(&[1.0; 10], 0.0, &SpectrogramParams::default()).is_err());
        let params = SpectrogramParams {
            nperseg: Some(8),
            noverlap: Some(8),
            ..Default::default()
        };
        assert!(estimator.compute(&[1.0; 10], 1000.0, &params).is_err());
    }
}
