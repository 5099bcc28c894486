//! Mirnov Analysis - Magnetic Probe Signal Analysis Core
//!
//! Discharge detection, zero-phase band filtering, peak-based phase fitting
//! and SVD mode decomposition for tokamak Mirnov coil arrays, with optional
//! Python bindings.

// Suppress PyO3 non-local impl warnings (harmless macro-generated code)
#![cfg_attr(feature = "python", allow(non_local_definitions))]

pub mod error;
pub mod config;
pub mod data;
pub mod filters;
pub mod spectrum;
pub mod analysis;

#[cfg(feature = "python")]
pub mod python_bindings;

pub use error::{AnalysisError, Result};
pub use config::AnalysisConfig;
pub use data::ChannelMatrix;
pub use filters::WindowType;
pub use spectrum::{SpectralEstimator, Spectrogram, SpectrogramParams};
pub use analysis::{
    BandpassSmoother, DurationDetector, DurationEstimate, FilteredWindow, LinearFit,
    PeakExtractor, PeakRecord, PhaseAnalyzer, PhaseFitResult, ProbeLayout, ReferencePoint,
    SpatialDecomposer, SpatialStructure, SvdResult,
};
