//! Plasma discharge window from the reference current trace

use crate::config::DurationConfig;
use crate::data::check_monotonic;
use crate::error::{AnalysisError, Result};

/// Outcome of duration detection
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DurationEstimate {
    /// time[end] - time[start], in time-axis units
    pub duration: f64,

    /// Maximum of the trace
    pub peak_amplitude: f64,

    /// First sample above threshold
    pub start_index: usize,
}

impl DurationEstimate {
    /// Sentinel for traces with no valid sample
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_none(&self) -> bool {
        *self == Self::none()
    }
}

/// Threshold-based plasma start/end detector
#[derive(Debug, Clone, Default)]
pub struct DurationDetector {
    config: DurationConfig,
}

impl DurationDetector {
    pub fn new(config: DurationConfig) -> Self {
        Self { config }
    }

    /// Detect the discharge window
    ///
    /// A sample is valid when it exceeds `threshold_factor · max(trace)` and
    /// reaches `min_val`. The window spans the first to the last valid sample.
    ///
    /// # Arguments
    /// * `trace` - Reference current samples
    /// * `time` - Timestamps, same length as `trace`
    ///
    /// # Returns
    /// The zero sentinel when the trace is empty or never valid
    ///
    /// # Errors
    /// `ShapeMismatch` when trace and time lengths differ, `NonMonotonicTime`
    /// when the time axis decreases
    pub fn detect(&self, trace: &[f64], time: &[f64]) -> Result<DurationEstimate> {
        if trace.len() != time.len() {
            return Err(AnalysisError::ShapeMismatch {
                what: "reference trace length",
                expected: time.len(),
                actual: trace.len(),
            });
        }
        check_monotonic(ndarray::aview1(time))?;
        if trace.is_empty() {
            return Ok(DurationEstimate::none());
        }

        let max = trace.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let threshold = self.config.threshold_factor * max;
        let is_valid = |v: f64| v > threshold && v >= self.config.min_val;

        let mut valid = trace
            .iter()
            .enumerate()
            .filter(|&(_, &v)| is_valid(v))
            .map(|(i, _)| i);
        let start = match valid.next() {
            Some(i) => i,
            None => return Ok(DurationEstimate::none()),
        };
        let end = valid.last().unwrap_or(start);

        let (start_time, end_time) = (time[start], time[end]);
        log::debug!(
            "cal_duration: threshold={:.2}, max={:.2}, start_idx={}, start_time={}, end_idx={}, end_time={}",
            threshold,
            max,
            start,
            start_time,
            end,
            end_time
        );

        // The start-time gate selects between two branches that currently
        // yield the same duration.
        let duration = if start_time >= self.config.min_start_time_threshold {
            end_time - start_time
        } else {
            log::debug!(
                "cal_duration: start time {} below gate {}",
                start_time,
                self.config.min_start_time_threshold
            );
            end_time - start_time
        };

        Ok(DurationEstimate {
            duration,
            peak_amplitude: max,
            start_index: start,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Trapezoid crossing `level` upward at `rise` and back down after `fall`
    fn trapezoid(n: usize, rise: usize, fall: usize, top: f64) -> Vec<f64> {
        (0..n)
            .map(|i| {
                if i < rise {
                    top * 0.05 * i as f64 / rise as f64
                } else if i < fall {
                    top
                } else {
                    top * 0.05 * (n - i) as f64 / (n - fall) as f64
                }
            })
            .collect()
    }

    #[test]
    fn test_trapezoid_window() {
        let fs = 10_000.0;
        let n = 1000;
        let trace = trapezoid(n, 100, 901, 50_000.0);
        let time: Vec<f64> = (0..n).map(|i| i as f64 / fs).collect();

        let estimate = DurationDetector::default().detect(&trace, &time).unwrap();
        assert_eq!(estimate.start_index, 100);
        assert!((estimate.duration - (900.0 - 100.0) / fs).abs() < 1e-12);
        assert_eq!(estimate.peak_amplitude, 50_000.0);
    }

    #[test]
    fn test_below_threshold_returns_sentinel() {
        let trace = vec![100.0; 500];
        let time: Vec<f64> = (0..500).map(|i| i as f64).collect();
        // Above the relative threshold but never reaches the absolute floor
        let estimate = DurationDetector::default().detect(&trace, &time).unwrap();
        assert!(estimate.is_none());
        assert_eq!(estimate, DurationEstimate { duration: 0.0, peak_amplitude: 0.0, start_index: 0 });
    }

    #[test]
    fn test_empty_and_mismatched() {
        let detector = DurationDetector::default();
        assert!(detector.detect(&[], &[]).unwrap().is_none());
        assert!(detector.detect(&[1.0, 2.0], &[0.0]).is_err());
    }

    #[test]
    fn test_start_gate_does_not_change_duration() {
        let trace = vec![0.0, 5000.0, 6000.0, 5000.0, 0.0];
        let early: Vec<f64> = (0..5).map(|i| i as f64).collect();
        let late: Vec<f64> = (0..5).map(|i| 1000.0 + i as f64).collect();
        let detector = DurationDetector::default();
        let a = detector.detect(&trace, &early).unwrap();
        let b = detector.detect(&trace, &late).unwrap();
        assert_eq!(a.duration, 2.0);
        assert_eq!(b.duration, 2.0);
        assert_eq!(a.start_index, 1);
    }

    #[test]
    fn test_single_valid_sample_has_zero_duration() {
        let trace = vec![0.0, 5000.0, 0.0];
        let time = vec![0.0, 1.0, 2.0];
        let estimate = DurationDetector::default().detect(&trace, &time).unwrap();
        assert!(!estimate.is_none());
        assert_eq!(estimate.start_index, 1);
        assert_eq!(estimate.duration, 0.0);
    }

    #[test]
    fn test_unsorted_time_rejected() {
        let trace = trapezoid(200, 20, 180, 50_000.0);
        let mut time: Vec<f64> = (0..200).map(|i| i as f64 * 1e-4).collect();
        time.swap(50, 150);
        let err = DurationDetector::default().detect(&trace, &time).unwrap_err();
        assert!(matches!(err, AnalysisError::NonMonotonicTime { index: 51 }));
    }
}
