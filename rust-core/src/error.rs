//! Error taxonomy for the analysis engine

use thiserror::Error;

/// Errors reported by the analysis engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Time axis is not monotonic at index {index}")]
    NonMonotonicTime { index: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Empty time range [{t_start}, {t_end}]")]
    EmptyRange { t_start: f64, t_end: f64 },

    #[error("Filter design failed: {0}")]
    FilterDesign(String),

    #[error("Signal of {len} samples is too short for zero-phase filtering (padding {padlen})")]
    FilterTooShort { len: usize, padlen: usize },

    #[error("Degenerate reference line: {0}")]
    DegenerateLine(String),

    #[error("No peaks recorded on any included channel")]
    NoPeaks,

    #[error("Probe count {probes} does not match mode vector length {mode_len}")]
    DimensionMismatch { probes: usize, mode_len: usize },

    #[error("Spline fit failed: {0}")]
    SplineFit(String),

    #[error("Decomposition failed: {0}")]
    Decomposition(String),
}

impl AnalysisError {
    /// Outcomes of exploratory selection that a shell should show as an empty result
    /// rather than as a failure.
    pub fn is_degenerate(&self) -> bool {
        matches!(
            self,
            AnalysisError::DegenerateLine(_)
                | AnalysisError::NoPeaks
                | AnalysisError::EmptyRange { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
