//! IIR bandpass design, zero-phase filtering and polynomial smoothing

pub mod windows;
pub mod design;
pub mod sos;
pub mod savgol;

pub use windows::{WindowType, generate_window, periodic_window};
pub use design::{FilterKind, FilterSpec, design_bandpass_sos};
pub use sos::{Section, SosFilter};
pub use savgol::{savgol_coefficients, savgol_filter};
