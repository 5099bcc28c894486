//! Channel matrix and time-axis helpers
//!
//! The engine borrows a validated `ChannelMatrix` and never mutates it; every
//! transform returns fresh arrays.

use crate::error::{AnalysisError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Multi-channel probe data, channels × time, with its time axis
#[derive(Debug, Clone)]
pub struct ChannelMatrix {
    data: Array2<f64>,
    time: Array1<f64>,
    sample_rate: f64,
}

impl ChannelMatrix {
    /// Validate and wrap a channel matrix
    ///
    /// # Arguments
    /// * `data` - Samples, one row per channel
    /// * `time` - Non-decreasing timestamps, one per column
    /// * `sample_rate` - Sample rate in Hz
    pub fn new(data: Array2<f64>, time: Array1<f64>, sample_rate: f64) -> Result<Self> {
        if data.ncols() != time.len() {
            return Err(AnalysisError::ShapeMismatch {
                what: "time axis length",
                expected: data.ncols(),
                actual: time.len(),
            });
        }
        validate_sample_rate(sample_rate)?;
        check_monotonic(time.view())?;

        Ok(Self {
            data,
            time,
            sample_rate,
        })
    }

    pub fn data(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn time(&self) -> ArrayView1<'_, f64> {
        self.time.view()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn num_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn num_samples(&self) -> usize {
        self.data.ncols()
    }

    /// One channel's samples (0-based index)
    pub fn channel(&self, index: usize) -> Result<ArrayView1<'_, f64>> {
        if index >= self.num_channels() {
            return Err(AnalysisError::InvalidParameter(format!(
                "channel {} out of range for {} channels",
                index,
                self.num_channels()
            )));
        }
        Ok(self.data.index_axis(Axis(0), index))
    }
}

/// Reject non-positive or non-finite sample rates
pub fn validate_sample_rate(sample_rate: f64) -> Result<()> {
    if sample_rate <= 0.0 || !sample_rate.is_finite() {
        return Err(AnalysisError::InvalidParameter(format!(
            "sample rate {} must be positive",
            sample_rate
        )));
    }
    Ok(())
}

/// Fail on the first decreasing timestamp
pub fn check_monotonic(time: ArrayView1<'_, f64>) -> Result<()> {
    match time
        .windows(2)
        .into_iter()
        .position(|pair| !(pair[1] >= pair[0]))
    {
        Some(i) => Err(AnalysisError::NonMonotonicTime { index: i + 1 }),
        None => Ok(()),
    }
}

/// Left insertion point of `value` in a sorted axis
///
/// Returns the first index whose timestamp is not less than `value`.
pub fn search_sorted(time: ArrayView1<'_, f64>, value: f64) -> usize {
    let (mut lo, mut hi) = (0, time.len());
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if time[mid] < value {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Index range `[start, end)` covering `[t_start, t_end)` on the axis
///
/// # Errors
/// `EmptyRange` if the window selects no samples
pub fn slice_range(time: ArrayView1<'_, f64>, t_start: f64, t_end: f64) -> Result<(usize, usize)> {
    let start = search_sorted(time, t_start);
    let end = search_sorted(time, t_end);
    if start >= end {
        return Err(AnalysisError::EmptyRange { t_start, t_end });
    }
    Ok((start, end))
}
