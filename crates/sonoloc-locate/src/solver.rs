//! Hyperbolic multilateration.
//!
//! With `d_i = v * tau_i` the range to receiver `i` minus the range to the
//! reference receiver 0, subtracting the range equation of the pair (0, 1)
//! from that of the pair (0, i) cancels the quadratic term and leaves one
//! linear row per receiver `i >= 2`:
//!
//! ```text
//! A_i = 2 (P_i - P_0) / d_i - 2 (P_1 - P_0) / d_1
//! b_i = (|P_i|^2 - |P_0|^2) / d_i - d_i - (|P_1|^2 - |P_0|^2) / d_1 + d_1
//! ```
//!
//! The stacked system is solved with an SVD pseudo-inverse. Every row divides
//! by a range difference, so delays are first clamped away from zero.
//!
//! Four receivers give only two rows; the pseudo-inverse then pins the
//! source to a line. Range closure resolves the remaining unknown from the
//! reference-pair range equation.

use nalgebra::{DMatrix, DVector, Vector3};
use serde::{Deserialize, Serialize};
use sonoloc_core::{ConfigError, DelayVector, Point3, ReceiverGeometry, SolverError};

/// Tolerance below which two closure residuals count as equal.
const RESIDUAL_TIE: f64 = 1e-9;

/// Solver parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Propagation speed in m/s
    pub speed_of_sound: f64,
    /// Smallest delay magnitude, in seconds, used when forming the system
    pub epsilon: f64,
    /// Singular values below `rcond * max_singular_value` are discarded
    pub rcond: f64,
    /// Resolve the underdetermined four-receiver case with the range equation
    pub range_closure: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            speed_of_sound: sonoloc_core::DEFAULT_SPEED_OF_SOUND,
            epsilon: 1e-6,
            rcond: 1e-12,
            range_closure: false,
        }
    }
}

impl SolverConfig {
    /// Checks parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.speed_of_sound.is_finite() || self.speed_of_sound <= 0.0 {
            return Err(ConfigError::invalid_value(
                "solver.speed_of_sound",
                format!("must be finite and > 0, got {}", self.speed_of_sound),
            ));
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(ConfigError::invalid_value(
                "solver.epsilon",
                format!("must be finite and > 0, got {}", self.epsilon),
            ));
        }
        if !self.rcond.is_finite() || !(0.0..1.0).contains(&self.rcond) {
            return Err(ConfigError::invalid_value(
                "solver.rcond",
                format!("must be in [0, 1), got {}", self.rcond),
            ));
        }
        Ok(())
    }
}

/// A solved position with diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// Estimated source position
    pub position: Point3,
    /// Delays pushed away from zero before solving
    pub clamped_delays: usize,
    /// Numerical rank of the linear system
    pub rank: usize,
    /// RMS range-difference residual in meters
    pub residual: f64,
}

/// Multilateration solver bound to one receiver geometry.
#[derive(Debug, Clone)]
pub struct MultilaterationSolver {
    geometry: ReceiverGeometry,
    config: SolverConfig,
}

impl MultilaterationSolver {
    /// Creates a solver.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is out of range.
    pub fn new(geometry: ReceiverGeometry, config: SolverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { geometry, config })
    }

    /// Creates a solver with default parameters.
    #[must_use]
    pub fn with_defaults(geometry: ReceiverGeometry) -> Self {
        Self {
            geometry,
            config: SolverConfig::default(),
        }
    }

    /// Returns the receiver geometry.
    #[must_use]
    pub fn geometry(&self) -> &ReceiverGeometry {
        &self.geometry
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solves for the source position.
    ///
    /// # Errors
    ///
    /// - [`SolverError::DelayCountMismatch`] if `delays` does not hold one
    ///   entry per non-reference receiver
    /// - [`SolverError::NonFiniteDelay`] for NaN or infinite delays
    /// - [`SolverError::Decomposition`] if the pseudo-inverse fails
    /// - [`SolverError::NonFiniteSolution`] if the result is not finite
    pub fn solve(&self, delays: &DelayVector) -> Result<Solution, SolverError> {
        let receivers = self.geometry.receivers();
        let expected = receivers.len() - 1;
        if delays.len() != expected {
            return Err(SolverError::DelayCountMismatch {
                expected,
                actual: delays.len(),
            });
        }
        if let Some(index) = delays.iter().position(|d| !d.is_finite()) {
            return Err(SolverError::NonFiniteDelay { index });
        }

        let (clamped, clamped_delays) = delays.clamped(self.config.epsilon);
        let ranges: Vec<f64> = clamped
            .iter()
            .map(|t| self.config.speed_of_sound * t)
            .collect();

        let points: Vec<Vector3<f64>> = receivers.iter().map(to_vector).collect();
        let (a, b) = linear_system(&points, &ranges);

        let svd = a.clone().svd(true, true);
        let cutoff = self.config.rcond * svd.singular_values.max();
        let rank = svd.singular_values.iter().filter(|&&s| s > cutoff).count();
        let pinv = svd
            .pseudo_inverse(cutoff)
            .map_err(|e| SolverError::Decomposition(e.to_string()))?;
        let x = pinv * &b;
        let mut p = Vector3::new(x[0], x[1], x[2]);

        if self.config.range_closure && a.nrows() == 2 && rank == 2 {
            let row = |r: usize| Vector3::new(a[(r, 0)], a[(r, 1)], a[(r, 2)]);
            let line = row(0).cross(&row(1));
            match close_range(&points, &ranges, p, line) {
                Some(closed) => p = closed,
                None => tracing::debug!("no admissible range-closure root, keeping least-squares point"),
            }
        }

        let position = Point3::new(p.x, p.y, p.z);
        if !position.is_finite() {
            return Err(SolverError::NonFiniteSolution);
        }

        Ok(Solution {
            position,
            clamped_delays,
            rank,
            residual: range_residual(&points, &ranges, &p),
        })
    }
}

fn to_vector(p: &Point3) -> Vector3<f64> {
    Vector3::new(p.x, p.y, p.z)
}

/// Stacks rows `i = 2..N` of the linearized system.
fn linear_system(points: &[Vector3<f64>], ranges: &[f64]) -> (DMatrix<f64>, DVector<f64>) {
    let p0 = points[0];
    let p1 = points[1];
    let d1 = ranges[0];
    let k1 = p1.norm_squared() - p0.norm_squared();

    let rows = points.len() - 2;
    let mut a = DMatrix::zeros(rows, 3);
    let mut b = DVector::zeros(rows);
    for (row, (pi, &di)) in points[2..].iter().zip(&ranges[1..]).enumerate() {
        let coeffs = 2.0 * (pi - p0) / di - 2.0 * (p1 - p0) / d1;
        for col in 0..3 {
            a[(row, col)] = coeffs[col];
        }
        b[row] = (pi.norm_squared() - p0.norm_squared()) / di - di - k1 / d1 + d1;
    }
    (a, b)
}

/// RMS of `(|p - P_i| - |p - P_0|) - d_i` over `i >= 1`.
#[allow(clippy::cast_precision_loss)]
fn range_residual(points: &[Vector3<f64>], ranges: &[f64], p: &Vector3<f64>) -> f64 {
    let r0 = (p - points[0]).norm();
    let sum: f64 = points[1..]
        .iter()
        .zip(ranges)
        .map(|(pi, di)| ((p - pi).norm() - r0 - di).powi(2))
        .sum();
    (sum / ranges.len() as f64).sqrt()
}

/// Picks the point on `base + t * line` that satisfies the reference-pair
/// range equation with non-negative ranges.
fn close_range(
    points: &[Vector3<f64>],
    ranges: &[f64],
    base: Vector3<f64>,
    line: Vector3<f64>,
) -> Option<Vector3<f64>> {
    let p0 = points[0];
    let p1 = points[1];
    let d1 = ranges[0];
    let e = p1 - p0;

    // range to the reference receiver along the line: r0(t) = alpha + beta t
    let alpha = (p1.norm_squared() - p0.norm_squared() - 2.0 * base.dot(&e) - d1 * d1) / (2.0 * d1);
    let beta = -line.dot(&e) / d1;
    let q = base - p0;

    // |q + t n|^2 = r0(t)^2
    let qa = line.norm_squared() - beta * beta;
    let qb = 2.0 * (q.dot(&line) - alpha * beta);
    let qc = q.norm_squared() - alpha * alpha;

    let roots: Vec<f64> = if qa.abs() <= f64::EPSILON * line.norm_squared() {
        if qb == 0.0 {
            Vec::new()
        } else {
            vec![-qc / qb]
        }
    } else {
        let disc = qb * qb - 4.0 * qa * qc;
        if disc < 0.0 {
            Vec::new()
        } else {
            let s = disc.sqrt();
            vec![(-qb + s) / (2.0 * qa), (-qb - s) / (2.0 * qa)]
        }
    };

    roots
        .into_iter()
        .filter_map(|t| {
            let r0 = alpha + beta * t;
            let admissible = r0 >= 0.0 && ranges.iter().all(|d| r0 + d >= 0.0);
            admissible.then(|| {
                let p = base + line * t;
                (p, range_residual(points, ranges, &p), r0)
            })
        })
        .min_by(|a, b| {
            if (a.1 - b.1).abs() <= RESIDUAL_TIE {
                a.2.total_cmp(&b.2)
            } else {
                a.1.total_cmp(&b.1)
            }
        })
        .map(|(p, _, _)| p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn five_receivers() -> ReceiverGeometry {
        ReceiverGeometry::new(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.2, 0.0),
            Point3::new(0.0, 0.0, 0.9),
            Point3::new(0.8, 0.7, 0.5),
        ])
        .unwrap()
    }

    fn exact_delays(geometry: &ReceiverGeometry, source: Point3, v: f64) -> DelayVector {
        let r0 = source.distance_to(&geometry.reference());
        DelayVector::new(
            geometry.receivers()[1..]
                .iter()
                .map(|p| (source.distance_to(p) - r0) / v)
                .collect(),
        )
    }

    #[test]
    fn test_full_rank_round_trip() {
        let geometry = five_receivers();
        let solver = MultilaterationSolver::with_defaults(geometry.clone());
        for source in [
            Point3::new(2.0, 1.5, 1.0),
            Point3::new(-1.5, 2.5, 0.7),
            Point3::new(3.0, -2.0, 1.8),
        ] {
            let solution = solver.solve(&exact_delays(&geometry, source, 343.0)).unwrap();
            assert_eq!(solution.rank, 3);
            assert_eq!(solution.clamped_delays, 0);
            assert!(solution.position.distance_to(&source) < 1e-3, "{source} -> {}", solution.position);
            assert!(solution.residual < 1e-6);
        }
    }

    #[test]
    fn test_four_receivers_with_closure_round_trip() {
        let geometry = ReceiverGeometry::lab_default();
        let solver = MultilaterationSolver::new(
            geometry.clone(),
            SolverConfig {
                range_closure: true,
                ..Default::default()
            },
        )
        .unwrap();
        for source in [Point3::new(1.0, 2.0, 0.5), Point3::new(2.0, 1.5, 1.0)] {
            let solution = solver.solve(&exact_delays(&geometry, source, 343.0)).unwrap();
            assert_eq!(solution.rank, 2);
            assert!(solution.position.distance_to(&source) < 1e-3, "{source} -> {}", solution.position);
        }
    }

    #[test]
    fn test_four_receivers_default_is_min_norm() {
        let solver = MultilaterationSolver::with_defaults(ReceiverGeometry::lab_default());
        let solution = solver
            .solve(&DelayVector::new(vec![0.005, 0.010, 0.015]))
            .unwrap();
        assert_eq!(solution.rank, 2);
        assert_abs_diff_eq!(solution.position.x, -0.68, epsilon = 0.01);
        assert_abs_diff_eq!(solution.position.y, -3.19, epsilon = 0.01);
        assert_abs_diff_eq!(solution.position.z, 5.44, epsilon = 0.01);
    }

    #[test]
    fn test_zero_delays_are_clamped_not_fatal() {
        let solver = MultilaterationSolver::with_defaults(ReceiverGeometry::lab_default());
        let solution = solver.solve(&DelayVector::zeros(3)).unwrap();
        assert_eq!(solution.clamped_delays, 3);
        assert!(solution.position.is_finite());
        assert_abs_diff_eq!(solution.position.x, -0.238, epsilon = 0.01);
        assert_abs_diff_eq!(solution.position.y, 0.425, epsilon = 0.01);
        assert_abs_diff_eq!(solution.position.z, 0.594, epsilon = 0.01);
    }

    #[test]
    fn test_delay_count_mismatch() {
        let solver = MultilaterationSolver::with_defaults(ReceiverGeometry::lab_default());
        assert!(matches!(
            solver.solve(&DelayVector::zeros(2)),
            Err(SolverError::DelayCountMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_non_finite_delay_rejected() {
        let solver = MultilaterationSolver::with_defaults(ReceiverGeometry::lab_default());
        assert!(matches!(
            solver.solve(&DelayVector::new(vec![0.001, f64::NAN, 0.002])),
            Err(SolverError::NonFiniteDelay { index: 1 })
        ));
    }

    #[test]
    fn test_config_validation() {
        let geometry = ReceiverGeometry::lab_default();
        for config in [
            SolverConfig {
                speed_of_sound: 0.0,
                ..Default::default()
            },
            SolverConfig {
                epsilon: -1e-6,
                ..Default::default()
            },
            SolverConfig {
                rcond: f64::NAN,
                ..Default::default()
            },
        ] {
            assert!(MultilaterationSolver::new(geometry.clone(), config).is_err());
        }
    }
}
