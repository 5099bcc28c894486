//! Butterworth bandpass design in second-order-section form
//!
//! Analog prototype → lowpass-to-bandpass transform → bilinear transform,
//! then grouped into biquads. Frequencies are handled normalized to the
//! Nyquist rate so intermediate products stay near unity even for high orders.

use super::sos::{Section, SosFilter};
use crate::error::{AnalysisError, Result};
use num_complex::Complex64;
use std::f64::consts::PI;

/// Highest order accepted by the designer
pub const MAX_FILTER_ORDER: usize = 32;

/// Kind of response produced by a [`FilterSpec`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Bandpass,
}

/// Filter specification in Hz
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    /// Prototype order; a bandpass has `order` biquad sections
    pub order: usize,

    /// Lower band edge in Hz
    pub low_hz: f64,

    /// Upper band edge in Hz
    pub high_hz: f64,

    pub kind: FilterKind,
}

impl FilterSpec {
    /// Create custom bandpass filter spec
    pub fn bandpass(order: usize, low_hz: f64, high_hz: f64) -> Self {
        Self {
            order,
            low_hz,
            high_hz,
            kind: FilterKind::Bandpass,
        }
    }

    /// Bandpass around a center frequency, clamped away from DC and Nyquist
    ///
    /// # Arguments
    /// * `order` - Prototype order
    /// * `center_hz` - Center frequency
    /// * `half_width_hz` - Half bandwidth (edges at center ± half width)
    /// * `sample_rate` - Sample rate in Hz
    /// * `margin_hz` - Minimum distance of either edge from 0 and fs/2
    pub fn bandpass_around(
        order: usize,
        center_hz: f64,
        half_width_hz: f64,
        sample_rate: f64,
        margin_hz: f64,
    ) -> Self {
        let low = margin_hz.max(center_hz - half_width_hz);
        let high = (sample_rate / 2.0 - margin_hz).min(center_hz + half_width_hz);
        Self::bandpass(order, low, high)
    }

    /// Check the invariants `1 ≤ order` and `0 < low < high < fs/2`
    pub fn validate(&self, sample_rate: f64) -> Result<()> {
        if self.order == 0 || self.order > MAX_FILTER_ORDER {
            return Err(AnalysisError::FilterDesign(format!(
                "order {} outside 1..={}",
                self.order, MAX_FILTER_ORDER
            )));
        }
        let nyquist = sample_rate / 2.0;
        let edges_ok = self.low_hz > 0.0 && self.low_hz < self.high_hz && self.high_hz < nyquist;
        if !edges_ok || !self.low_hz.is_finite() || !self.high_hz.is_finite() {
            return Err(AnalysisError::FilterDesign(format!(
                "band [{}, {}] Hz not inside (0, {}) Hz",
                self.low_hz, self.high_hz, nyquist
            )));
        }
        Ok(())
    }
}

/// Design a digital Butterworth bandpass filter
///
/// # Arguments
/// * `spec` - Band edges and prototype order
/// * `sample_rate` - Sample rate in Hz
///
/// # Returns
/// Cascade of `spec.order` sections, each with zeros at z = ±1
pub fn design_bandpass_sos(spec: &FilterSpec, sample_rate: f64) -> Result<SosFilter> {
    spec.validate(sample_rate)?;
    let order = spec.order;

    // Pre-warp edges; with the Nyquist-normalized convention fs = 2, so the
    // bilinear constant 2*fs is 4.
    let fs2 = 4.0;
    let warp = |f_hz: f64| fs2 * (PI * (f_hz / (sample_rate / 2.0)) / 2.0).tan();
    let wl = warp(spec.low_hz);
    let wh = warp(spec.high_hz);
    let bw = wh - wl;
    let w0 = (wl * wh).sqrt();

    // Butterworth prototype poles on the left half of the unit circle
    let prototype: Vec<Complex64> = (0..order)
        .map(|i| {
            let m = 2.0 * i as f64 - order as f64 + 1.0;
            -Complex64::from_polar(1.0, PI * m / (2.0 * order as f64))
        })
        .collect();

    // Lowpass to bandpass: every prototype pole splits into two
    let mut analog_poles = Vec::with_capacity(2 * order);
    for &p in &prototype {
        let p_lp = p * (bw / 2.0);
        let root = (p_lp * p_lp - w0 * w0).sqrt();
        analog_poles.push(p_lp + root);
        analog_poles.push(p_lp - root);
    }

    // Bilinear transform; `order` analog zeros at the origin map to z = 1 and
    // the `order` zeros at infinity map to z = -1.
    let digital_poles: Vec<Complex64> = analog_poles
        .iter()
        .map(|&p| (fs2 + p) / (fs2 - p))
        .collect();

    let numerator = Complex64::new(fs2.powi(order as i32), 0.0);
    let denominator: Complex64 = analog_poles.iter().map(|&p| fs2 - p).product();
    let gain = bw.powi(order as i32) * (numerator / denominator).re;

    if !gain.is_finite() || gain == 0.0 {
        return Err(AnalysisError::FilterDesign(format!(
            "degenerate gain {} for band [{}, {}] Hz",
            gain, spec.low_hz, spec.high_hz
        )));
    }

    let mut sections = pair_poles(&digital_poles)?;
    if let Some(first) = sections.first_mut() {
        first.scale_numerator(gain);
    }

    Ok(SosFilter::new(sections))
}

/// Group poles into biquads, conjugate pairs first, then real poles two by two
fn pair_poles(poles: &[Complex64]) -> Result<Vec<Section>> {
    let tol = 1e-12;
    let mut complex: Vec<Complex64> = poles.iter().copied().filter(|p| p.im > tol).collect();
    let mut real: Vec<f64> = poles
        .iter()
        .filter(|p| p.im.abs() <= tol)
        .map(|p| p.re)
        .collect();

    if real.len() % 2 != 0 {
        return Err(AnalysisError::FilterDesign(
            "unpaired real pole in bandpass design".to_string(),
        ));
    }

    // Poles farthest from the unit circle first
    complex.sort_by(|a, b| a.norm().total_cmp(&b.norm()));
    real.sort_by(|a, b| a.abs().total_cmp(&b.abs()));

    let mut sections: Vec<Section> = complex
        .iter()
        .map(|p| Section::new([1.0, 0.0, -1.0], [1.0, -2.0 * p.re, p.norm_sqr()]))
        .collect();

    for pair in real.chunks(2) {
        let (p1, p2) = (pair[0], pair[1]);
        sections.push(Section::new([1.0, 0.0, -1.0], [1.0, -(p1 + p2), p1 * p2]));
    }

    Ok(sections)
}
