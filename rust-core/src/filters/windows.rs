//! Window functions for spectral segmentation

use crate::error::AnalysisError;
use serde::Deserialize;
use std::f64::consts::PI;
use std::str::FromStr;

/// Window function types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    /// Hann window: w[n] = 0.5 - 0.5*cos(2πn/(M-1))
    Hann,

    /// Hamming window: w[n] = 0.54 - 0.46*cos(2πn/(M-1))
    Hamming,

    /// Blackman window: w[n] = 0.42 - 0.5*cos(2πn/(M-1)) + 0.08*cos(4πn/(M-1))
    Blackman,

    /// Rectangular window (no windowing)
    Rectangular,
}

impl FromStr for WindowType {
    type Err = AnalysisError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "hann" | "hanning" => Ok(WindowType::Hann),
            "hamming" => Ok(WindowType::Hamming),
            "blackman" => Ok(WindowType::Blackman),
            "rectangular" | "boxcar" => Ok(WindowType::Rectangular),
            other => Err(AnalysisError::InvalidParameter(format!(
                "unknown window '{}'",
                other
            ))),
        }
    }
}

/// Generate symmetric window coefficients
///
/// # Arguments
/// * `window_type` - Type of window function
/// * `length` - Number of samples (M)
///
/// # Returns
/// Vector of window coefficients w[n] for n = 0..M-1
pub fn generate_window(window_type: WindowType, length: usize) -> Vec<f64> {
    if length == 1 {
        return vec![1.0];
    }

    let denom = length as f64 - 1.0;
    (0..length)
        .map(|n| {
            let angle = 2.0 * PI * n as f64 / denom;
            match window_type {
                WindowType::Hann => 0.5 - 0.5 * angle.cos(),
                WindowType::Hamming => 0.54 - 0.46 * angle.cos(),
                WindowType::Blackman => 0.42 - 0.5 * angle.cos() + 0.08 * (2.0 * angle).cos(),
                WindowType::Rectangular => 1.0,
            }
        })
        .collect()
}

/// Generate periodic window coefficients
///
/// A periodic window of length M is the symmetric window of length M+1
/// with its last sample dropped; it tiles without a duplicated endpoint,
/// which is what overlapping FFT segments expect.
pub fn periodic_window(window_type: WindowType, length: usize) -> Vec<f64> {
    let mut window = generate_window(window_type, length + 1);
    window.truncate(length);
    window
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_generation() {
        let length = 161;

        let hann = generate_window(WindowType::Hann, length);
        let hamming = generate_window(WindowType::Hamming, length);
        let blackman = generate_window(WindowType::Blackman, length);

        assert_eq!(hann.len(), length);
        assert_eq!(hamming.len(), length);
        assert_eq!(blackman.len(), length);

        // Symmetric
        assert!((hann[0] - hann[length - 1]).abs() < 1e-10);
        assert!((blackman[0] - blackman[length - 1]).abs() < 1e-10);

        // Center values peak at 1.0
        let center = length / 2;
        assert!((hann[center] - 1.0).abs() < 1e-10);
        assert!((hamming[center] - 1.0).abs() < 1e-10);
        assert!((blackman[center] - 1.0).abs() < 1e-10);

        // Hamming has non-zero endpoints (0.08)
        assert!(hamming[0] > 0.07 && hamming[0] < 0.09);
    }

    #[test]
    fn test_periodic_hann() {
        let window = periodic_window(WindowType::Hann, 8);
        assert_eq!(window.len(), 8);
        assert!(window[0].abs() < 1e-12);
        // Peak sits at M/2 for a periodic window
        assert!((window[4] - 1.0).abs() < 1e-12);
        assert!((window[1] - window[7]).abs() < 1e-12);
    }

    #[test]
    fn test_rectangular_window() {
        let window = generate_window(WindowType::Rectangular, 100);
        assert_eq!(window.len(), 100);
        assert!(window.iter().all(|&w| w == 1.0));
    }

    #[test]
    fn test_window_from_name() {
        assert_eq!("hann".parse::<WindowType>().unwrap(), WindowType::Hann);
        assert_eq!("Boxcar".parse::<WindowType>().unwrap(), WindowType::Rectangular);
        assert!("tukey".parse::<WindowType>().is_err());
    }

    #[test]
    fn test_single_sample_window() {
        assert_eq!(generate_window(WindowType::Blackman, 1), vec![1.0]);
    }
}
