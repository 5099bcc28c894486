//! Segment conditioning before the FFT

/// Remove the mean of a segment and apply a precomputed window
///
/// # Arguments
/// * `segment` - Raw samples
/// * `window` - Window coefficients, same length as the segment
///
/// # Returns
/// Detrended, windowed segment
pub fn detrend_and_window(segment: &[f64], window: &[f64]) -> Vec<f64> {
    let mean = if segment.is_empty() {
        0.0
    } else {
        segment.iter().sum::<f64>() / segment.len() as f64
    };

    segment
        .iter()
        .zip(window.iter())
        .map(|(&s, &w)| (s - mean) * w)
        .collect()
}

/// Power spectral density scale 1 / (fs · Σw²)
pub fn density_scale(window: &[f64], sample_rate: f64) -> f64 {
    let sum_sq: f64 = window.iter().map(|&w| w * w).sum();
    1.0 / (sample_rate * sum_sq)
}
