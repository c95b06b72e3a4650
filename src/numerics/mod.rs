pub mod linear;
pub mod newton;
pub mod sparse;
pub mod transient;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("linear solve failed")]
    LinearSolveFailed,
    #[error("Newton's method failed to converge in {iterations} iterations")]
    NonConvergence { iterations: usize },
    #[error("line search found no sufficient decrease at iteration {iteration}")]
    LineSearchFailed { iteration: usize },
    #[error("residual contains NaN or Inf at iteration {iteration}")]
    NumericalBreakdown { iteration: usize },
    #[error("time step {dt:.3e} s is below the minimum {min_dt:.3e} s")]
    TimestepTooSmall { dt: f64, min_dt: f64 },
    #[error("ministep still failing after {cuts} consecutive cuts")]
    TooManyCuts { cuts: usize },
}

/// Tolerances on the normalized residual measures.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerances {
    pub cnv: f64,
    pub mb: f64,
    pub well: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            cnv: 1e-3,
            mb: 1e-7,
            well: 1e-5,
        }
    }
}

/// Norm of the scaled residual used as the line search merit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceMetric {
    #[default]
    L2Norm,
    MaxNorm,
}

impl ConvergenceMetric {
    pub fn norm(&self, vector: &DVector<f64>) -> f64 {
        match self {
            ConvergenceMetric::L2Norm => vector.norm(),
            ConvergenceMetric::MaxNorm => vector.amax(),
        }
    }
}

/// Residual measures of one Newton iterate, one entry per component for the
/// cell measures.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConvergenceReport {
    /// max_c |R_c| dt / (pv_c rho_c)
    pub cnv: Vec<f64>,
    /// |sum_c R_c| dt / sum_c (pv_c rho_c)
    pub mb: Vec<f64>,
    /// Largest scaled well control residual.
    pub well: f64,
}

impl ConvergenceReport {
    pub fn max_cnv(&self) -> f64 {
        self.cnv.iter().fold(0.0, |a, &b| a.max(b))
    }

    pub fn max_mb(&self) -> f64 {
        self.mb.iter().fold(0.0, |a, &b| a.max(b))
    }

    pub fn is_converged(&self, tol: &Tolerances) -> bool {
        self.max_cnv() <= tol.cnv && self.max_mb() <= tol.mb && self.well <= tol.well
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_checks_all_measures() {
        let tol = Tolerances::default();
        let mut report = ConvergenceReport {
            cnv: vec![1e-4, 5e-4],
            mb: vec![1e-9, 1e-8],
            well: 1e-7,
        };
        assert!(report.is_converged(&tol));
        report.mb[1] = 1e-6;
        assert!(!report.is_converged(&tol));
        report.mb[1] = 0.0;
        report.well = 1e-3;
        assert!(!report.is_converged(&tol));
    }

    #[test]
    fn metric_norms() {
        let v = DVector::from_vec(vec![3.0, -4.0]);
        assert_eq!(ConvergenceMetric::L2Norm.norm(&v), 5.0);
        assert_eq!(ConvergenceMetric::MaxNorm.norm(&v), 4.0);
    }
}
