//! Second-order-section IIR filtering
//!
//! Sections run in Direct Form II Transposed. Zero-phase filtering pads the
//! signal by odd extension, primes every section with its steady-state
//! response, then runs forward and backward.

use crate::error::{AnalysisError, Result};
use num_complex::Complex64;
use std::f64::consts::PI;

/// A single biquad: H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// Numerator coefficients [b0, b1, b2]
    b: [f64; 3],

    /// Denominator coefficients [1, a1, a2]
    a: [f64; 3],
}

impl Section {
    /// Create a section, normalizing so that a0 = 1
    pub fn new(b: [f64; 3], a: [f64; 3]) -> Self {
        let a0 = a[0];
        Self {
            b: [b[0] / a0, b[1] / a0, b[2] / a0],
            a: [1.0, a[1] / a0, a[2] / a0],
        }
    }

    pub fn numerator(&self) -> &[f64; 3] {
        &self.b
    }

    pub fn denominator(&self) -> &[f64; 3] {
        &self.a
    }

    pub(crate) fn scale_numerator(&mut self, gain: f64) {
        for b in self.b.iter_mut() {
            *b *= gain;
        }
    }

    /// Poles strictly inside the unit circle
    pub fn is_stable(&self) -> bool {
        let (a1, a2) = (self.a[1], self.a[2]);
        a2.abs() < 1.0 && a1.abs() < 1.0 + a2
    }

    /// Initial state giving the steady-state response to a unit step
    fn step_state(&self) -> [f64; 2] {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        let det = 1.0 + a1 + a2;
        if det.abs() < f64::EPSILON {
            return [0.0; 2];
        }
        let rhs0 = b1 - a1 * b0;
        let rhs1 = b2 - a2 * b0;
        let z0 = (rhs0 + rhs1) / det;
        [z0, rhs1 - a2 * z0]
    }

    /// DC gain of the section
    fn dc_gain(&self) -> f64 {
        self.b.iter().sum::<f64>() / self.a.iter().sum::<f64>()
    }

    #[inline]
    fn process_sample(&self, input: f64, state: &mut [f64; 2]) -> f64 {
        let output = self.b[0] * input + state[0];
        state[0] = self.b[1] * input - self.a[1] * output + state[1];
        state[1] = self.b[2] * input - self.a[2] * output;
        output
    }

    fn response(&self, z_inv: Complex64) -> Complex64 {
        let z_inv2 = z_inv * z_inv;
        let num = self.b[0] + self.b[1] * z_inv + self.b[2] * z_inv2;
        let den = self.a[0] + self.a[1] * z_inv + self.a[2] * z_inv2;
        num / den
    }
}

/// Cascade of second-order sections
#[derive(Debug, Clone, PartialEq)]
pub struct SosFilter {
    sections: Vec<Section>,
}

impl SosFilter {
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn num_sections(&self) -> usize {
        self.sections.len()
    }

    pub fn is_stable(&self) -> bool {
        self.sections.iter().all(Section::is_stable)
    }

    /// Edge padding used by [`SosFilter::filtfilt`]
    ///
    /// Three times the overall filter length, not counting trailing
    /// coefficients that are zero in every section.
    pub fn padlen(&self) -> usize {
        let zero_b2 = self.sections.iter().filter(|s| s.b[2] == 0.0).count();
        let zero_a2 = self.sections.iter().filter(|s| s.a[2] == 0.0).count();
        3 * (2 * self.sections.len() + 1 - zero_b2.min(zero_a2))
    }

    /// Per-section initial conditions for a unit step
    pub fn steady_state(&self) -> Vec<[f64; 2]> {
        let mut scale = 1.0;
        self.sections
            .iter()
            .map(|section| {
                let [z0, z1] = section.step_state();
                let state = [scale * z0, scale * z1];
                scale *= section.dc_gain();
                state
            })
            .collect()
    }

    /// Run the cascade over `input` starting from `initial` section states
    ///
    /// # Arguments
    /// * `input` - Input samples
    /// * `initial` - One state per section, or `None` for a rest start
    ///
    /// # Returns
    /// Filtered output samples (same length as input)
    pub fn process_block(&self, input: &[f64], initial: Option<&[[f64; 2]]>) -> Vec<f64> {
        let mut states: Vec<[f64; 2]> = match initial {
            Some(init) => init.to_vec(),
            None => vec![[0.0; 2]; self.sections.len()],
        };

        input
            .iter()
            .map(|&x| {
                self.sections
                    .iter()
                    .zip(states.iter_mut())
                    .fold(x, |acc, (section, state)| section.process_sample(acc, state))
            })
            .collect()
    }

    /// Zero-phase forward-backward filtering
    ///
    /// # Errors
    /// `FilterTooShort` if the signal is not longer than [`SosFilter::padlen`]
    pub fn filtfilt(&self, input: &[f64]) -> Result<Vec<f64>> {
        let n = input.len();
        let padlen = self.padlen();
        if n <= padlen {
            return Err(AnalysisError::FilterTooShort { len: n, padlen });
        }

        let extended = odd_extension(input, padlen);
        let zi = self.steady_state();

        let scaled = |factor: f64| -> Vec<[f64; 2]> {
            zi.iter().map(|s| [s[0] * factor, s[1] * factor]).collect()
        };

        let forward = self.process_block(&extended, Some(&scaled(extended[0])));

        let reversed: Vec<f64> = forward.iter().rev().copied().collect();
        let last = reversed[0];
        let mut backward = self.process_block(&reversed, Some(&scaled(last)));
        backward.reverse();

        Ok(backward[padlen..padlen + n].to_vec())
    }

    /// Complex frequency response at `freq_hz`
    pub fn frequency_response(&self, freq_hz: f64, sample_rate: f64) -> Complex64 {
        let omega = 2.0 * PI * freq_hz / sample_rate;
        let z_inv = Complex64::from_polar(1.0, -omega);
        self.sections
            .iter()
            .map(|s| s.response(z_inv))
            .product()
    }

    /// Magnitude response |H| at `freq_hz`
    pub fn magnitude_at(&self, freq_hz: f64, sample_rate: f64) -> f64 {
        self.frequency_response(freq_hz, sample_rate).norm()
    }
}

/// Odd extension by `padlen` samples at both ends
fn odd_extension(x: &[f64], padlen: usize) -> Vec<f64> {
    let n = x.len();
    let first = x[0];
    let last = x[n - 1];

    let mut ext = Vec::with_capacity(n + 2 * padlen);
    ext.extend((1..=padlen).rev().map(|i| 2.0 * first - x[i]));
    ext.extend_from_slice(x);
    ext.extend((1..=padlen).map(|i| 2.0 * last - x[n - 1 - i]));
    ext
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::design::{design_bandpass_sos, FilterSpec};

    fn one_pole_lowpass() -> SosFilter {
        // y[n] = 0.5 x[n] + 0.5 y[n-1]
        SosFilter::new(vec![Section::new([0.5, 0.0, 0.0], [1.0, -0.5, 0.0])])
    }

    #[test]
    fn test_section_normalization() {
        let section = Section::new([2.0, 4.0, 2.0], [2.0, 1.0, 0.5]);
        assert_eq!(section.numerator(), &[1.0, 2.0, 1.0]);
        assert_eq!(section.denominator(), &[1.0, 0.5, 0.25]);
    }

    #[test]
    fn test_impulse_response() {
        let filter = one_pole_lowpass();
        let output = filter.process_block(&[1.0, 0.0, 0.0, 0.0], None);
        let expected = [0.5, 0.25, 0.125, 0.0625];
        for (o, e) in output.iter().zip(expected.iter()) {
            assert!((o - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_steady_state_has_no_transient() {
        let filter = one_pole_lowpass();
        let zi = filter.steady_state();
        let output = filter.process_block(&[3.0; 20], Some(&[[zi[0][0] * 3.0, zi[0][1] * 3.0]]));
        assert!(output.iter().all(|&y| (y - 3.0).abs() < 1e-12));
    }

    #[test]
    fn test_odd_extension() {
        let ext = odd_extension(&[1.0, 2.0, 4.0, 7.0], 2);
        assert_eq!(ext, vec![-2.0, 0.0, 1.0, 2.0, 4.0, 7.0, 10.0, 12.0]);
    }

    #[test]
    fn test_padlen() {
        assert_eq!(one_pole_lowpass().padlen(), 6);
        let sos = design_bandpass_sos(&FilterSpec::bandpass(16, 7_000.0, 13_000.0), 200_000.0)
            .unwrap();
        assert_eq!(sos.padlen(), 99);
    }

    #[test]
    fn test_filtfilt_too_short() {
        let sos = design_bandpass_sos(&FilterSpec::bandpass(4, 7_000.0, 13_000.0), 200_000.0)
            .unwrap();
        let err = sos.filtfilt(&[0.0; 27]).unwrap_err();
        assert_eq!(err, AnalysisError::FilterTooShort { len: 27, padlen: 27 });
        assert!(sos.filtfilt(&[0.0; 28]).is_ok());
    }

    #[test]
    fn test_filtfilt_zero_phase_in_band() {
        let fs = 200_000.0;
        let f = 10_000.0;
        let sos = design_bandpass_sos(&FilterSpec::bandpass(4, 7_000.0, 13_000.0), fs).unwrap();

        let n = 2000;
        let signal: Vec<f64> = (0..n)
            .map(|i| (2.0 * PI * f * i as f64 / fs).sin())
            .collect();
        let filtered = sos.filtfilt(&signal).unwrap();
        assert_eq!(filtered.len(), n);

        // Away from the edges the in-band tone passes unchanged, with no delay
        for i in 500..1500 {
            assert!((filtered[i] - signal[i]).abs() < 0.02, "sample {} differs", i);
        }
    }

    #[test]
    fn test_filtfilt_rejects_out_of_band() {
        let fs = 200_000.0;
        let sos = design_bandpass_sos(&FilterSpec::bandpass(4, 7_000.0, 13_000.0), fs).unwrap();
        let signal: Vec<f64> = (0..2000)
            .map(|i| (2.0 * PI * 60_000.0 * i as f64 / fs).sin() + 0.3)
            .collect();
        let filtered = sos.filtfilt(&signal).unwrap();
        let peak = filtered[500..1500].iter().fold(0.0f64, |m, &v| m.max(v.abs()));
        assert!(peak < 1e-3, "residual {}", peak);
    }
}
