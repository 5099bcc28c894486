//! Spatial mode decomposition
//!
//! Economy SVD of a filtered (channel, time) window and the geometry used to
//! draw one spatial mode as a deformed ring of probes.

use super::spline::PeriodicSpline;
use crate::config::SpatialConfig;
use crate::error::{AnalysisError, Result};
use nalgebra::{DMatrix, SVD};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::f64::consts::PI;

/// Economy SVD factors, `data = u · diag(s) · vt`
#[derive(Debug, Clone)]
pub struct SvdResult {
    /// Spatial modes, (channel, k)
    pub u: Array2<f64>,

    /// Singular values, descending
    pub s: Array1<f64>,

    /// Temporal modes, (k, time)
    pub vt: Array2<f64>,
}

impl SvdResult {
    pub fn rank(&self) -> usize {
        self.s.len()
    }

    /// Spatial mode `index` as a column of U
    pub fn spatial_mode(&self, index: usize) -> Option<ArrayView1<'_, f64>> {
        (index < self.u.ncols()).then(|| self.u.column(index))
    }

    /// Fraction of total energy per mode
    pub fn energy_fractions(&self) -> Vec<f64> {
        let total: f64 = self.s.iter().map(|s| s * s).sum();
        if total == 0.0 {
            return vec![0.0; self.s.len()];
        }
        self.s.iter().map(|s| s * s / total).collect()
    }

    /// `u · diag(s) · vt`
    pub fn reconstruct(&self) -> Array2<f64> {
        let scaled = &self.u * &self.s.view().insert_axis(ndarray::Axis(0));
        scaled.dot(&self.vt)
    }
}

/// Probe ring and the mode-deformed curve through it
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialStructure {
    /// Undisplaced probe positions
    pub probe_positions: Vec<[f64; 2]>,

    /// Probes moved radially by the scaled mode weight
    pub displaced_positions: Vec<[f64; 2]>,

    /// Periodic spline through the displaced probes
    pub smoothed_curve: Vec<[f64; 2]>,
}

/// SVD and mode geometry
#[derive(Debug, Clone, Default)]
pub struct SpatialDecomposer {
    config: SpatialConfig,
}

impl SpatialDecomposer {
    pub fn new(config: SpatialConfig) -> Self {
        Self { config }
    }

    /// Economy SVD of a (channel, time) window
    ///
    /// # Errors
    /// `Decomposition` on empty or non-finite input, or if the iteration fails
    pub fn decompose(&self, data: ArrayView2<'_, f64>) -> Result<SvdResult> {
        let (rows, cols) = data.dim();
        if rows == 0 || cols == 0 {
            return Err(AnalysisError::Decomposition("empty matrix".to_string()));
        }
        if data.iter().any(|v| !v.is_finite()) {
            log::warn!("svd skipped: input contains non-finite samples");
            return Err(AnalysisError::Decomposition(
                "input contains non-finite samples".to_string(),
            ));
        }

        let matrix = DMatrix::from_fn(rows, cols, |i, j| data[[i, j]]);
        let svd = SVD::try_new(matrix, true, true, f64::EPSILON, 0).ok_or_else(|| {
            log::warn!("svd did not converge for {}x{} window", rows, cols);
            AnalysisError::Decomposition("svd did not converge".to_string())
        })?;

        let (u, vt) = match (svd.u, svd.v_t) {
            (Some(u), Some(vt)) => (u, vt),
            _ => {
                return Err(AnalysisError::Decomposition(
                    "svd factors missing".to_string(),
                ))
            }
        };

        let k = svd.singular_values.len();
        let mut order: Vec<usize> = (0..k).collect();
        order.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));

        Ok(SvdResult {
            u: Array2::from_shape_fn((rows, k), |(i, j)| u[(i, order[j])]),
            s: Array1::from_iter(order.iter().map(|&j| svd.singular_values[j])),
            vt: Array2::from_shape_fn((k, cols), |(i, j)| vt[(order[i], j)]),
        })
    }

    /// Probe ring deformed by one spatial mode
    ///
    /// # Arguments
    /// * `mode` - Mode weight per probe
    /// * `num_probes` - Probe count, must match `mode`
    ///
    /// # Errors
    /// `DimensionMismatch` on a length mismatch, `SplineFit` when the curve
    /// cannot be interpolated
    pub fn reconstruct(&self, mode: ArrayView1<'_, f64>, num_probes: usize) -> Result<SpatialStructure> {
        if mode.len() != num_probes {
            return Err(AnalysisError::DimensionMismatch {
                probes: num_probes,
                mode_len: mode.len(),
            });
        }

        let angles: Vec<f64> = (0..num_probes)
            .map(|k| 2.0 * PI * k as f64 / num_probes as f64)
            .collect();
        let radius = self.config.radius;
        let probe_positions: Vec<[f64; 2]> = angles
            .iter()
            .map(|&a| [radius * a.cos(), radius * a.sin()])
            .collect();

        let max_abs = mode.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        let displaced_positions: Vec<[f64; 2]> = if max_abs > 0.0 {
            probe_positions
                .iter()
                .zip(&angles)
                .zip(mode.iter())
                .map(|((p, &a), &w)| {
                    let shift = w / max_abs * self.config.factor;
                    [p[0] + shift * a.cos(), p[1] + shift * a.sin()]
                })
                .collect()
        } else {
            probe_positions.clone()
        };

        let mut closed = displaced_positions.clone();
        if let Some(&first) = displaced_positions.first() {
            closed.push(first);
        }
        let spline = PeriodicSpline::fit(&closed).map_err(|e| {
            log::warn!("spatial structure spline failed: {}", e);
            e
        })?;

        Ok(SpatialStructure {
            probe_positions,
            displaced_positions,
            smoothed_curve: spline.sample(self.config.interp_points),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn rotating_window(channels: usize, samples: usize) -> Array2<f64> {
        Array2::from_shape_fn((channels, samples), |(ch, i)| {
            let phase = 2.0 * PI * ch as f64 / channels as f64;
            let t = i as f64 * 0.01;
            (2.0 * PI * 3.0 * t - phase).sin() + 0.1 * (2.0 * PI * 7.0 * t + phase).cos()
        })
    }

    #[test]
    fn test_svd_reconstructs_input() {
        let data = rotating_window(12, 200);
        let svd = SpatialDecomposer::default().decompose(data.view()).unwrap();
        assert_eq!(svd.u.dim(), (12, 12));
        assert_eq!(svd.s.len(), 12);
        assert_eq!(svd.vt.dim(), (12, 200));

        let rebuilt = svd.reconstruct();
        let scale = data.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        for (a, b) in rebuilt.iter().zip(data.iter()) {
            assert!((a - b).abs() < 1e-6 * scale);
        }
    }

    #[test]
    fn test_singular_values_sorted_non_negative() {
        let data = rotating_window(5, 3);
        let svd = SpatialDecomposer::default().decompose(data.view()).unwrap();
        assert_eq!(svd.rank(), 3);
        assert_eq!(svd.u.dim(), (5, 3));
        assert_eq!(svd.vt.dim(), (3, 3));
        for pair in svd.s.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
        assert!(svd.s.iter().all(|&s| s >= 0.0));

        let fractions = svd.energy_fractions();
        assert!((fractions.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_svd_rejects_non_finite() {
        let mut data = rotating_window(4, 10);
        data[[2, 3]] = f64::NAN;
        let err = SpatialDecomposer::default().decompose(data.view()).unwrap_err();
        assert!(matches!(err, AnalysisError::Decomposition(_)));
        assert!(SpatialDecomposer::default()
            .decompose(Array2::<f64>::zeros((0, 4)).view())
            .is_err());
    }

    #[test]
    fn test_zero_mode_keeps_probes_in_place() {
        let mode = Array1::<f64>::zeros(12);
        let structure = SpatialDecomposer::default().reconstruct(mode.view(), 12).unwrap();
        assert_eq!(structure.displaced_positions, structure.probe_positions);
        assert_eq!(structure.smoothed_curve.len(), 200);
        assert!((structure.probe_positions[0][0] - 40.0).abs() < 1e-12);
        assert!((structure.probe_positions[3][1] - 40.0).abs() < 1e-12);
    }

    #[test]
    fn test_mode_displaces_radially() {
        let mode = array![1.0, -0.5, 0.0, 0.25];
        let structure = SpatialDecomposer::default().reconstruct(mode.view(), 4).unwrap();
        let radii: Vec<f64> = structure
            .displaced_positions
            .iter()
            .map(|p| p[0].hypot(p[1]))
            .collect();
        let expected = [55.0, 32.5, 40.0, 43.75];
        for (r, e) in radii.iter().zip(&expected) {
            assert!((r - e).abs() < 1e-9);
        }

        // Curve starts and ends on the first displaced probe
        let curve = &structure.smoothed_curve;
        let first = structure.displaced_positions[0];
        assert!((curve[0][0] - first[0]).abs() < 1e-9);
        assert!((curve[curve.len() - 1][1] - first[1]).abs() < 1e-9);
    }

    #[test]
    fn test_svd_mode_feeds_reconstruction() {
        let data = rotating_window(12, 300);
        let decomposer = SpatialDecomposer::new(SpatialConfig {
            interp_points: 64,
            ..SpatialConfig::default()
        });
        let svd = decomposer.decompose(data.view()).unwrap();
        let mode = svd.spatial_mode(0).unwrap();
        let structure = decomposer.reconstruct(mode, 12).unwrap();
        assert_eq!(structure.smoothed_curve.len(), 64);
        assert!(svd.spatial_mode(12).is_none());
    }

    #[test]
    fn test_dimension_mismatch() {
        let mode = Array1::<f64>::ones(10);
        let err = SpatialDecomposer::default().reconstruct(mode.view(), 12).unwrap_err();
        assert_eq!(err, AnalysisError::DimensionMismatch { probes: 12, mode_len: 10 });
    }

    #[test]
    fn test_collapsed_ring_fails_spline() {
        // A mode that pulls two neighbouring probes onto the same point
        let decomposer = SpatialDecomposer::new(SpatialConfig {
            radius: 10.0,
            factor: 10.0,
            ..SpatialConfig::default()
        });
        let mode = array![-1.0, -1.0, 0.5, 0.5];
        let err = decomposer.reconstruct(mode.view(), 4).unwrap_err();
        assert!(matches!(err, AnalysisError::SplineFit(_)));
    }
}
