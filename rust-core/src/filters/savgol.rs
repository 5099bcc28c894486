//! Savitzky-Golay polynomial smoothing
//!
//! Interior samples use the centered least-squares convolution weights. The
//! first and last half-window of samples are taken from a polynomial fitted
//! to the first and last full window, so the output keeps the input length
//! without padding artifacts.

use crate::error::{AnalysisError, Result};
use nalgebra::DMatrix;

/// Vandermonde pseudo-inverse for a centered window
///
/// Row k maps a window of samples to the k-th polynomial coefficient, with
/// sample positions -half..=half.
fn fit_operator(window: usize, polyorder: usize) -> Result<DMatrix<f64>> {
    if window % 2 == 0 {
        return Err(AnalysisError::InvalidParameter(format!(
            "smoothing window {} must be odd",
            window
        )));
    }
    if polyorder >= window {
        return Err(AnalysisError::InvalidParameter(format!(
            "polynomial order {} must be less than window {}",
            polyorder, window
        )));
    }

    let half = (window / 2) as f64;
    let vandermonde = DMatrix::from_fn(window, polyorder + 1, |i, k| {
        (i as f64 - half).powi(k as i32)
    });

    vandermonde
        .pseudo_inverse(1e-12)
        .map_err(|e| AnalysisError::InvalidParameter(format!("savgol fit: {}", e)))
}

/// Centered smoothing coefficients for an odd `window`
pub fn savgol_coefficients(window: usize, polyorder: usize) -> Result<Vec<f64>> {
    let operator = fit_operator(window, polyorder)?;
    Ok(operator.row(0).iter().copied().collect())
}

/// Smooth `data` with a Savitzky-Golay filter
///
/// # Arguments
/// * `data` - Input samples, at least `window` long
/// * `window` - Odd window length
/// * `polyorder` - Polynomial degree, less than `window`
///
/// # Returns
/// Smoothed samples (same length as input)
pub fn savgol_filter(data: &[f64], window: usize, polyorder: usize) -> Result<Vec<f64>> {
    let n = data.len();
    if window > n {
        return Err(AnalysisError::InvalidParameter(format!(
            "smoothing window {} exceeds signal length {}",
            window, n
        )));
    }

    let operator = fit_operator(window, polyorder)?;
    let half = window / 2;
    let weights: Vec<f64> = operator.row(0).iter().copied().collect();

    let mut output = vec![0.0; n];
    for i in half..n - half {
        output[i] = data[i - half..=i + half]
            .iter()
            .zip(weights.iter())
            .map(|(x, w)| x * w)
            .sum();
    }

    // Edges: evaluate the polynomial fitted over the outermost windows
    let eval = |coeffs: &[f64], position: f64| -> f64 {
        coeffs.iter().rev().fold(0.0, |acc, &c| acc * position + c)
    };
    let fit = |segment: &[f64]| -> Vec<f64> {
        (0..=polyorder)
            .map(|k| {
                operator
                    .row(k)
                    .iter()
                    .zip(segment.iter())
                    .map(|(w, x)| w * x)
                    .sum()
            })
            .collect()
    };

    let head = fit(&data[..window]);
    for (j, out) in output.iter_mut().take(half).enumerate() {
        *out = eval(&head, j as f64 - half as f64);
    }

    let tail = fit(&data[n - window..]);
    for j in 0..half {
        output[n - half + j] = eval(&tail, (j + 1) as f64);
    }

    Ok(output)
}
