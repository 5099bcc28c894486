//! Per-channel local maxima
//!
//! Local maxima follow the usual scan: a sample (or the first sample of a
//! flat plateau) strictly above its left neighbour and above the first
//! differing sample to its right. Endpoints are never peaks.

use crate::config::PeakConfig;
use crate::data::check_monotonic;
use crate::error::{AnalysisError, Result};
use ndarray::{ArrayView1, ArrayView2, Axis};

/// A detected peak on one channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakRecord {
    /// Timestamp of the peak sample
    pub time: f64,

    /// Channel number, 1-based
    pub channel: usize,

    /// Sample value at the peak
    pub amplitude: f64,
}

/// Peaks as parallel columns, convenient for scatter overlays
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakColumns {
    pub times: Vec<f64>,
    pub channels: Vec<usize>,
    pub amplitudes: Vec<f64>,
}

/// Indices of all local maxima, plateaus reduced to their earliest sample
pub fn local_maxima(x: ArrayView1<'_, f64>) -> Vec<usize> {
    let n = x.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }

    let last = n - 1;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                peaks.push(i);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Keep peaks at least `distance` samples apart, highest first
///
/// Equal heights are resolved in favour of the earlier peak.
pub fn select_by_distance(x: ArrayView1<'_, f64>, peaks: &[usize], distance: usize) -> Vec<usize> {
    if distance <= 1 || peaks.len() < 2 {
        return peaks.to_vec();
    }

    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| x[peaks[b]].total_cmp(&x[peaks[a]]).then(a.cmp(&b)));

    let mut keep = vec![true; peaks.len()];
    for &j in &order {
        if !keep[j] {
            continue;
        }
        for k in (0..j).rev() {
            if peaks[j] - peaks[k] >= distance {
                break;
            }
            keep[k] = false;
        }
        for k in j + 1..peaks.len() {
            if peaks[k] - peaks[j] >= distance {
                break;
            }
            keep[k] = false;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, kept)| kept.then_some(p))
        .collect()
}

/// Multi-channel peak finder
#[derive(Debug, Clone, Default)]
pub struct PeakExtractor {
    config: PeakConfig,
}

impl PeakExtractor {
    pub fn new(config: PeakConfig) -> Self {
        Self { config }
    }

    /// Find peaks on every channel
    ///
    /// # Arguments
    /// * `time` - Time axis
    /// * `data` - Samples, (channel, time)
    /// * `distance` - Minimum separation in samples; the configured default if `None`
    ///
    /// # Returns
    /// Flat list ordered by channel, then time
    pub fn extract(
        &self,
        time: ArrayView1<'_, f64>,
        data: ArrayView2<'_, f64>,
        distance: Option<usize>,
    ) -> Result<Vec<PeakRecord>> {
        if data.ncols() != time.len() {
            return Err(AnalysisError::ShapeMismatch {
                what: "time axis length",
                expected: data.ncols(),
                actual: time.len(),
            });
        }
        check_monotonic(time)?;
        let distance = distance.unwrap_or(self.config.distance);
        if distance == 0 {
            return Err(AnalysisError::InvalidParameter(
                "peak distance must be at least 1 sample".to_string(),
            ));
        }

        let mut records = Vec::new();
        for (ch, row) in data.axis_iter(Axis(0)).enumerate() {
            let candidates = local_maxima(row);
            for idx in select_by_distance(row, &candidates, distance) {
                records.push(PeakRecord {
                    time: time[idx],
                    channel: ch + 1,
                    amplitude: row[idx],
                });
            }
        }
        Ok(records)
    }

    /// Non-negative local maxima of a (time, channel) window, no distance limit
    pub fn positive_peaks(
        &self,
        time: ArrayView1<'_, f64>,
        data: ArrayView2<'_, f64>,
    ) -> Result<PeakColumns> {
        if data.nrows() != time.len() {
            return Err(AnalysisError::ShapeMismatch {
                what: "time axis length",
                expected: data.nrows(),
                actual: time.len(),
            });
        }
        check_monotonic(time)?;

        let mut columns = PeakColumns::default();
        for (ch, column) in data.axis_iter(Axis(1)).enumerate() {
            for idx in local_maxima(column) {
                if column[idx] >= 0.0 {
                    columns.times.push(time[idx]);
                    columns.channels.push(ch + 1);
                    columns.amplitudes.push(column[idx]);
                }
            }
        }
        Ok(columns)
    }
}
