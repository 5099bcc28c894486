//! Spectral analysis with FFT

pub mod fft;
pub mod windowing;
pub mod spectrogram;

pub use fft::FftEngine;
pub use spectrogram::{SpectralEstimator, Spectrogram, SpectrogramParams};
