//! Band-limited view of an analysis window
//!
//! Slices the channel matrix in time, clips it, bandpass filters each
//! channel forward and backward, and applies Savitzky-Golay smoothing.
//! Short windows step down the filter order and smoothing length; any
//! channel whose filtering fails keeps its clipped samples.

use crate::config::{SavgolConfig, WaveletConfig};
use crate::data::{check_monotonic, slice_range, validate_sample_rate, ChannelMatrix};
use crate::error::{AnalysisError, Result};
use crate::filters::{design_bandpass_sos, savgol_filter, FilterSpec, SosFilter};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Why a channel was returned without filtering
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelDiagnostic {
    /// 0-based channel index, `None` when the whole window was affected
    pub channel: Option<usize>,
    pub error: AnalysisError,
}

/// Filtered analysis window
#[derive(Debug, Clone)]
pub struct FilteredWindow {
    /// Timestamps of the slice
    pub time: Array1<f64>,

    /// Filtered samples, (time, channel)
    pub data: Array2<f64>,

    /// Filter order chosen for the slice length
    pub filter_order: usize,

    /// Savitzky-Golay window, `None` when smoothing was skipped
    pub smoothing_window: Option<usize>,

    /// Band actually used, after margin clamping
    pub spec: FilterSpec,

    /// Channels that fell back to clipped data
    pub diagnostics: Vec<ChannelDiagnostic>,
}

impl FilteredWindow {
    /// Samples oriented (channel, time)
    pub fn channel_major(&self) -> ArrayView2<'_, f64> {
        self.data.t()
    }

    pub fn num_samples(&self) -> usize {
        self.data.nrows()
    }

    pub fn num_channels(&self) -> usize {
        self.data.ncols()
    }
}

/// Clip to [-width, width]
pub fn clip_symmetric(data: ArrayView2<'_, f64>, width: f64) -> Array2<f64> {
    data.mapv(|v| v.clamp(-width, width))
}

/// Clip, bandpass and smooth analysis windows
#[derive(Debug, Clone, Default)]
pub struct BandpassSmoother {
    wavelet: WaveletConfig,
    savgol: SavgolConfig,
}

impl BandpassSmoother {
    pub fn new(wavelet: WaveletConfig, savgol: SavgolConfig) -> Self {
        Self { wavelet, savgol }
    }

    /// Filter the window [t_start, t_end) of every channel
    ///
    /// # Arguments
    /// * `matrix` - Channel matrix (channels × time)
    /// * `t_start`, `t_end` - Window bounds in time-axis units
    /// * `center_hz` - Center of the pass band
    /// * `half_width_hz` - Half bandwidth
    ///
    /// # Returns
    /// Window oriented (time, channel), same channel count as the input
    ///
    /// # Errors
    /// `EmptyRange` when the window selects no samples, `InvalidParameter`
    /// on a negative or NaN clip width
    pub fn apply(
        &self,
        matrix: &ChannelMatrix,
        t_start: f64,
        t_end: f64,
        center_hz: f64,
        half_width_hz: f64,
    ) -> Result<FilteredWindow> {
        self.apply_raw(
            matrix.data(),
            matrix.time(),
            t_start,
            t_end,
            center_hz,
            half_width_hz,
            matrix.sample_rate(),
        )
    }

    /// Same as [`BandpassSmoother::apply`] on borrowed arrays
    #[allow(clippy::too_many_arguments)]
    pub fn apply_raw(
        &self,
        data: ArrayView2<'_, f64>,
        time: ArrayView1<'_, f64>,
        t_start: f64,
        t_end: f64,
        center_hz: f64,
        half_width_hz: f64,
        sample_rate: f64,
    ) -> Result<FilteredWindow> {
        if data.ncols() != time.len() {
            return Err(AnalysisError::ShapeMismatch {
                what: "time axis length",
                expected: data.ncols(),
                actual: time.len(),
            });
        }
        check_monotonic(time)?;
        validate_sample_rate(sample_rate)?;
        if !(self.wavelet.norm_width >= 0.0) {
            return Err(AnalysisError::InvalidParameter(format!(
                "clip width must be non-negative, got {}",
                self.wavelet.norm_width
            )));
        }

        let (start, end) = slice_range(time, t_start, t_end)?;
        let n = end - start;
        let sliced_time = time.slice(s![start..end]).to_owned();

        // (time, channel) from here on
        let clipped = clip_symmetric(data.slice(s![.., start..end]), self.wavelet.norm_width)
            .reversed_axes();

        let order = self.wavelet.filter_order_table().lookup(n);
        let spec = FilterSpec::bandpass_around(
            order,
            center_hz,
            half_width_hz,
            sample_rate,
            self.wavelet.filter_low_margin,
        );

        let mut window = FilteredWindow {
            time: sliced_time,
            data: clipped,
            filter_order: order,
            smoothing_window: None,
            spec,
            diagnostics: Vec::new(),
        };

        let sos = match design_bandpass_sos(&window.spec, sample_rate) {
            Ok(sos) => sos,
            Err(error) => {
                log::warn!("bandpass design failed (N={}, order={}): {}", n, order, error);
                window.diagnostics.push(ChannelDiagnostic { channel: None, error });
                return Ok(window);
            }
        };

        let smoothing = match self.wavelet.smoothing_window_table().lookup(n) {
            Some(w) => w,
            None => return Ok(window),
        };

        if n < self.savgol.min_len_for_filter {
            // Too short for the configured filter length; clipped data only
            return Ok(window);
        }
        window.smoothing_window = Some(smoothing);

        for (channel, mut column) in window.data.axis_iter_mut(Axis(1)).enumerate() {
            let samples = column.to_vec();
            match self.filter_channel(&sos, &samples, smoothing) {
                Ok(filtered) => column.assign(&Array1::from(filtered)),
                Err(error) => {
                    log::warn!("filter error on channel {}: {}", channel, error);
                    window.diagnostics.push(ChannelDiagnostic {
                        channel: Some(channel),
                        error,
                    });
                }
            }
        }

        Ok(window)
    }

    fn filter_channel(&self, sos: &SosFilter, samples: &[f64], smoothing: usize) -> Result<Vec<f64>> {
        let mut filtered = sos.filtfilt(samples)?;
        if filtered.len() > smoothing {
            filtered = savgol_filter(&filtered, smoothing, self.savgol.polyorder)?;
        }
        if filtered.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::FilterDesign(
                "filter produced non-finite samples".to_string(),
            ));
        }
        Ok(filtered)
    }
}
