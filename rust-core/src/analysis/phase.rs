//! Phase difference versus probe angle
//!
//! Two estimators feed the mode-number fit:
//! - `direct`: global maximum per channel inside one window, signed phase
//! - `robust`: a two-point line through the peak scatter, snapped to the
//!   nearest detected peak on every channel, unsigned phase

use super::peaks::PeakRecord;
use crate::data::{check_monotonic, slice_range};
use crate::error::{AnalysisError, Result};
use ndarray::{s, ArrayView1, ArrayView2, Axis};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Probe arrangement around the vessel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeLayout {
    /// 12 coils around the minor cross section ("m")
    Poloidal,
    /// 14 coils around the torus ("n")
    Toroidal,
}

impl ProbeLayout {
    pub fn num_probes(self) -> usize {
        match self {
            ProbeLayout::Poloidal => 12,
            ProbeLayout::Toroidal => 14,
        }
    }

    /// Layout from its mode letter
    pub fn from_mode(mode: &str) -> Result<Self> {
        match mode {
            "m" | "poloidal" => Ok(ProbeLayout::Poloidal),
            "n" | "toroidal" => Ok(ProbeLayout::Toroidal),
            other => Err(AnalysisError::InvalidParameter(format!(
                "unknown probe layout '{}'",
                other
            ))),
        }
    }

    /// Probe angles in degrees, or an `n`-point ring when the count differs
    pub fn angles_for(self, n: usize) -> Vec<f64> {
        if n != self.num_probes() {
            log::debug!(
                "{:?} layout has {} probes, using a {}-point ring",
                self,
                self.num_probes(),
                n
            );
        }
        ring_angles(n)
    }
}

/// `n` evenly spaced angles `k·360/n` degrees
pub fn ring_angles(n: usize) -> Vec<f64> {
    (0..n).map(|k| k as f64 * 360.0 / n as f64).collect()
}

/// Phase-vs-angle series, aligned 1:1
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseFitResult {
    /// Probe angles in degrees, in channel order
    pub angles: Vec<f64>,

    /// Phase differences in degrees
    pub phase_diffs: Vec<f64>,

    /// Peak time used for each included channel
    pub reference_times: Vec<f64>,
}

impl PhaseFitResult {
    pub fn len(&self) -> usize {
        self.angles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }
}

/// A point picked on the peak scatter (time, 1-based channel)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferencePoint {
    pub time: f64,
    pub channel: f64,
}

impl ReferencePoint {
    pub fn new(time: f64, channel: f64) -> Self {
        Self { time, channel }
    }
}

/// Phase difference estimators
pub struct PhaseAnalyzer;

impl PhaseAnalyzer {
    /// Signed phase from the global maximum of each channel
    ///
    /// # Arguments
    /// * `data` - Filtered samples, (channel, time)
    /// * `time` - Time axis
    /// * `t1`, `t2` - Window bounds, either order
    /// * `f_base` - Mode frequency in cycles per time-axis unit
    /// * `layout` - Probe layout used for the angles
    /// * `reference_channel` - 0-based channel whose phase is zero
    ///
    /// # Errors
    /// `EmptyRange` when the window selects no samples, `NonMonotonicTime`
    /// when the time axis decreases
    pub fn direct(
        data: ArrayView2<'_, f64>,
        time: ArrayView1<'_, f64>,
        t1: f64,
        t2: f64,
        f_base: f64,
        layout: ProbeLayout,
        reference_channel: usize,
    ) -> Result<PhaseFitResult> {
        if data.ncols() != time.len() {
            return Err(AnalysisError::ShapeMismatch {
                what: "time axis length",
                expected: data.ncols(),
                actual: time.len(),
            });
        }
        check_monotonic(time)?;
        let num_channels = data.nrows();
        if reference_channel >= num_channels {
            return Err(AnalysisError::InvalidParameter(format!(
                "reference channel {} out of range for {} channels",
                reference_channel, num_channels
            )));
        }

        let (start, end) = slice_range(time, t1.min(t2), t1.max(t2))?;
        let window = data.slice(s![.., start..end]);
        let window_time = time.slice(s![start..end]);

        let peak_times: Vec<f64> = window
            .axis_iter(Axis(0))
            .map(|row| window_time[argmax(row)])
            .collect();

        let t0 = peak_times[reference_channel];
        let phase_diffs = peak_times.iter().map(|&t| 360.0 * f_base * (t - t0)).collect();

        Ok(PhaseFitResult {
            angles: layout.angles_for(num_channels),
            phase_diffs,
            reference_times: peak_times,
        })
    }

    /// Unsigned phase from peaks snapped to a two-point line
    ///
    /// The line `channel = m·time + b` passes through `p1` and `p2`; for each
    /// channel the predicted time is snapped to that channel's nearest peak.
    /// Excluded channels and channels without peaks are left out.
    ///
    /// # Arguments
    /// * `peaks` - Peak list with 1-based channels, times in milliseconds
    /// * `p1`, `p2` - Points picked on the scatter
    /// * `f_base_hz` - Mode frequency in Hz
    /// * `num_coils` - Probe count
    /// * `excluded` - 1-based channels to skip
    ///
    /// # Errors
    /// `DegenerateLine` when the points share a time or a channel,
    /// `NoPeaks` when no channel could be snapped
    pub fn robust(
        peaks: &[PeakRecord],
        p1: ReferencePoint,
        p2: ReferencePoint,
        f_base_hz: f64,
        num_coils: usize,
        excluded: &[usize],
    ) -> Result<PhaseFitResult> {
        if peaks.is_empty() {
            return Err(AnalysisError::NoPeaks);
        }
        if p1.time == p2.time {
            return Err(AnalysisError::DegenerateLine(format!(
                "reference points share time {}",
                p1.time
            )));
        }

        let slope = (p1.channel - p2.channel) / (p1.time - p2.time);
        if slope == 0.0 {
            return Err(AnalysisError::DegenerateLine(format!(
                "reference points share channel {}",
                p1.channel
            )));
        }
        let intercept = p2.channel - slope * p2.time;

        let mut by_channel: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
        for peak in peaks.iter().filter(|p| (1..=num_coils).contains(&p.channel)) {
            by_channel.entry(peak.channel).or_default().push(peak.time);
        }
        for times in by_channel.values_mut() {
            times.sort_by(f64::total_cmp);
        }

        let ring = ring_angles(num_coils);
        let mut result = PhaseFitResult::default();
        for channel in 1..=num_coils {
            if excluded.contains(&channel) {
                continue;
            }
            let times = match by_channel.get(&channel) {
                Some(times) => times,
                None => continue,
            };

            let predicted = (channel as f64 - intercept) / slope;
            if let Some(snapped) = nearest(times, predicted) {
                result.reference_times.push(snapped);
                result.angles.push(ring[channel - 1]);
            }
        }

        let first = match result.reference_times.first() {
            Some(&t) => t,
            None => return Err(AnalysisError::NoPeaks),
        };
        result.phase_diffs = result
            .reference_times
            .iter()
            .map(|&t| 360.0 * f_base_hz * 1e-3 * (t - first).abs())
            .collect();

        log::debug!(
            "robust phase: slope={:.4} ch/ms, {} of {} channels snapped",
            slope,
            result.len(),
            num_coils
        );
        Ok(result)
    }
}

/// First index of the largest sample
fn argmax(row: ArrayView1<'_, f64>) -> usize {
    let mut best = 0;
    for (i, &v) in row.iter().enumerate() {
        if v > row[best] {
            best = i;
        }
    }
    best
}

/// Element of `times` closest to `target`, earliest on ties
fn nearest(times: &[f64], target: f64) -> Option<f64> {
    times.iter().copied().fold(None, |best, t| match best {
        Some(b) if (b - target).abs() <= (t - target).abs() => Some(b),
        _ => Some(t),
    })
}

/// Ordinary least squares line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

impl LinearFit {
    /// Fit `y = slope·x + intercept`
    pub fn fit(x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(AnalysisError::ShapeMismatch {
                what: "regression y length",
                expected: x.len(),
                actual: y.len(),
            });
        }
        if x.len() < 2 {
            return Err(AnalysisError::InvalidParameter(
                "linear fit needs at least 2 points".to_string(),
            ));
        }

        let n = x.len() as f64;
        let mean_x = x.iter().sum::<f64>() / n;
        let mean_y = y.iter().sum::<f64>() / n;
        let sxx: f64 = x.iter().map(|&xi| (xi - mean_x).powi(2)).sum();
        let sxy: f64 = x.iter().zip(y).map(|(&xi, &yi)| (xi - mean_x) * (yi - mean_y)).sum();
        if sxx == 0.0 {
            return Err(AnalysisError::InvalidParameter(
                "linear fit needs distinct x values".to_string(),
            ));
        }

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;
        let ss_res: f64 = x
            .iter()
            .zip(y)
            .map(|(&xi, &yi)| (yi - (slope * xi + intercept)).powi(2))
            .sum();
        let ss_tot: f64 = y.iter().map(|&yi| (yi - mean_y).powi(2)).sum();
        let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Ok(Self {
            slope,
            intercept,
            r_squared,
        })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}
