//! Closed-curve interpolation
//!
//! Periodic cubic spline through a closed loop of 2-D points, parameterized
//! by normalized cumulative chord length. Both coordinates share the knots;
//! each is an independent C2-periodic interpolant.

use crate::error::{AnalysisError, Result};
use nalgebra::{DMatrix, DVector};

/// One periodic coordinate: knot values and second derivatives
#[derive(Debug, Clone)]
struct PeriodicComponent {
    values: Vec<f64>,
    curvature: Vec<f64>,
}

impl PeriodicComponent {
    fn fit(knots: &[f64], values: &[f64]) -> Result<Self> {
        // knots.len() == values.len() == n + 1, last value repeats the first
        let n = knots.len() - 1;
        let h: Vec<f64> = knots.windows(2).map(|w| w[1] - w[0]).collect();

        let mut system = DMatrix::<f64>::zeros(n, n);
        let mut rhs = DVector::<f64>::zeros(n);
        for i in 0..n {
            let prev = (i + n - 1) % n;
            let next = (i + 1) % n;
            let (h_prev, h_next) = (h[prev], h[i]);

            system[(i, prev)] += h_prev;
            system[(i, i)] += 2.0 * (h_prev + h_next);
            system[(i, next)] += h_next;
            rhs[i] = 6.0 * ((values[i + 1] - values[i]) / h_next - (values[i] - values[prev]) / h_prev);
        }

        let solved = system.lu().solve(&rhs).ok_or_else(|| {
            AnalysisError::SplineFit("periodic spline system is singular".to_string())
        })?;

        let mut curvature: Vec<f64> = solved.iter().copied().collect();
        curvature.push(curvature[0]);
        if curvature.iter().any(|m| !m.is_finite()) {
            return Err(AnalysisError::SplineFit(
                "periodic spline produced non-finite coefficients".to_string(),
            ));
        }

        Ok(Self {
            values: values.to_vec(),
            curvature,
        })
    }

    fn evaluate(&self, knots: &[f64], segment: usize, u: f64) -> f64 {
        let (u0, u1) = (knots[segment], knots[segment + 1]);
        let h = u1 - u0;
        let (a, b) = (u1 - u, u - u0);
        let (m0, m1) = (self.curvature[segment], self.curvature[segment + 1]);
        let (y0, y1) = (self.values[segment], self.values[segment + 1]);

        m0 * a.powi(3) / (6.0 * h)
            + m1 * b.powi(3) / (6.0 * h)
            + (y0 / h - m0 * h / 6.0) * a
            + (y1 / h - m1 * h / 6.0) * b
    }
}

/// Interpolating periodic cubic spline in the plane
#[derive(Debug, Clone)]
pub struct PeriodicSpline {
    knots: Vec<f64>,
    x: PeriodicComponent,
    y: PeriodicComponent,
}

impl PeriodicSpline {
    /// Fit through a closed loop
    ///
    /// # Arguments
    /// * `closed` - Points with the first repeated at the end
    ///
    /// # Errors
    /// `SplineFit` when the loop is open, has fewer than 3 distinct points,
    /// repeats a point consecutively or yields a singular system
    pub fn fit(closed: &[[f64; 2]]) -> Result<Self> {
        if closed.len() < 4 {
            return Err(AnalysisError::SplineFit(format!(
                "need at least 3 points, got {}",
                closed.len().saturating_sub(1)
            )));
        }
        if closed.first() != closed.last() {
            return Err(AnalysisError::SplineFit("point loop is not closed".to_string()));
        }

        let mut knots = Vec::with_capacity(closed.len());
        knots.push(0.0);
        for pair in closed.windows(2) {
            let chord = (pair[1][0] - pair[0][0]).hypot(pair[1][1] - pair[0][1]);
            if chord == 0.0 || !chord.is_finite() {
                return Err(AnalysisError::SplineFit(
                    "consecutive points coincide or are not finite".to_string(),
                ));
            }
            knots.push(knots[knots.len() - 1] + chord);
        }
        let total = knots[knots.len() - 1];
        for u in knots.iter_mut() {
            *u /= total;
        }

        let xs: Vec<f64> = closed.iter().map(|p| p[0]).collect();
        let ys: Vec<f64> = closed.iter().map(|p| p[1]).collect();
        let x = PeriodicComponent::fit(&knots, &xs)?;
        let y = PeriodicComponent::fit(&knots, &ys)?;

        Ok(Self { knots, x, y })
    }

    /// Knot parameters in [0, 1], one per input point
    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    /// Point at parameter `u`, wrapped into [0, 1]
    pub fn evaluate(&self, u: f64) -> [f64; 2] {
        let u = if (0.0..=1.0).contains(&u) { u } else { u.rem_euclid(1.0) };
        let last_segment = self.knots.len() - 2;
        let segment = self.knots[1..=last_segment]
            .partition_point(|&k| k <= u)
            .min(last_segment);

        [
            self.x.evaluate(&self.knots, segment, u),
            self.y.evaluate(&self.knots, segment, u),
        ]
    }

    /// `count` points at evenly spaced parameters from 0 to 1 inclusive
    pub fn sample(&self, count: usize) -> Vec<[f64; 2]> {
        match count {
            0 => Vec::new(),
            1 => vec![self.evaluate(0.0)],
            _ => (0..count)
                .map(|i| self.evaluate(i as f64 / (count - 1) as f64))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn circle(n: usize, r: f64) -> Vec<[f64; 2]> {
        let mut points: Vec<[f64; 2]> = (0..n)
            .map(|k| {
                let theta = 2.0 * PI * k as f64 / n as f64;
                [r * theta.cos(), r * theta.sin()]
            })
            .collect();
        points.push(points[0]);
        points
    }

    #[test]
    fn test_passes_through_points() {
        let points = circle(12, 40.0);
        let spline = PeriodicSpline::fit(&points).unwrap();
        for (u, p) in spline.knots().iter().zip(&points) {
            let q = spline.evaluate(*u);
            assert!((q[0] - p[0]).abs() < 1e-9);
            assert!((q[1] - p[1]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_circle_stays_round() {
        let spline = PeriodicSpline::fit(&circle(12, 40.0)).unwrap();
        for p in spline.sample(200) {
            let r = p[0].hypot(p[1]);
            assert!((r - 40.0).abs() < 0.1, "radius {}", r);
        }
    }

    #[test]
    fn test_sample_closes_loop() {
        let spline = PeriodicSpline::fit(&circle(7, 3.0)).unwrap();
        let samples = spline.sample(50);
        assert_eq!(samples.len(), 50);
        assert!((samples[0][0] - samples[49][0]).abs() < 1e-9);
        assert!((samples[0][1] - samples[49][1]).abs() < 1e-9);
        assert!((samples[0][0] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_periodic_derivative_matches_at_seam() {
        let spline = PeriodicSpline::fit(&circle(5, 1.0)).unwrap();
        let eps = 1e-6;
        let after = spline.evaluate(eps);
        let before = spline.evaluate(1.0 - eps);
        let start = spline.evaluate(0.0);
        // Slopes on either side of the seam agree
        let left = [(start[0] - before[0]) / eps, (start[1] - before[1]) / eps];
        let right = [(after[0] - start[0]) / eps, (after[1] - start[1]) / eps];
        assert!((left[0] - right[0]).abs() < 1e-3);
        assert!((left[1] - right[1]).abs() < 1e-3);
    }

    #[test]
    fn test_rejects_bad_loops() {
        assert!(PeriodicSpline::fit(&[[0.0, 0.0], [1.0, 0.0], [0.0, 0.0]]).is_err());
        assert!(PeriodicSpline::fit(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]).is_err());

        let repeated = [[0.0, 0.0], [1.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 0.0]];
        assert!(matches!(
            PeriodicSpline::fit(&repeated),
            Err(AnalysisError::SplineFit(_))
        ));
    }
}
