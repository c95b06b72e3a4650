use log::debug;
use nalgebra::DVector;

use super::linear::LinearSolver;
use super::sparse::CsrMatrix;
use super::{ConvergenceMetric, ConvergenceReport, SolverError, Tolerances};

/// Nonlinear system of one ministep.
pub trait NonlinearProblem {
    fn residual(&self, u: &DVector<f64>) -> DVector<f64>;

    fn residual_and_jacobian(&self, u: &DVector<f64>) -> (DVector<f64>, CsrMatrix);

    fn convergence(&self, u: &DVector<f64>, residual: &DVector<f64>) -> ConvergenceReport;

    /// Residual in the units of the convergence measures, used as the line
    /// search merit.
    fn scaled_residual(&self, u: &DVector<f64>, residual: &DVector<f64>) -> DVector<f64>;

    /// Apply a Newton update with the model's chopping rules.
    fn apply_update(&self, u: &mut DVector<f64>, du: &DVector<f64>);

    /// Re-evaluate discrete controls. Returns true when something changed,
    /// which forces at least one more iteration.
    fn update_controls(&mut self, _u: &DVector<f64>) -> bool {
        false
    }

    /// Size and count of the leading diagonal blocks for preconditioning.
    fn block_layout(&self) -> (usize, usize);
}

pub struct NewtonSolver {
    pub max_iterations: usize,
    pub min_iterations: usize,
    pub tolerances: Tolerances,
    pub line_search: bool,
    /// Minimum step length before the line search gives up.
    pub min_step_size: f64,
    /// Parameter for sufficient decrease (usually 1e-4).
    pub armijo_param: f64,
    pub merit: ConvergenceMetric,
}

impl Default for NewtonSolver {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            min_iterations: 1,
            tolerances: Tolerances::default(),
            line_search: false,
            min_step_size: 1e-3,
            armijo_param: 1e-4,
            merit: ConvergenceMetric::L2Norm,
        }
    }
}

#[derive(Debug)]
pub struct NewtonResult {
    pub solution: DVector<f64>,
    pub iterations: usize,
    pub linear_iterations: usize,
    pub report: ConvergenceReport,
}

impl NewtonSolver {
    pub fn solve<P: NonlinearProblem>(
        &self,
        problem: &mut P,
        linear: &LinearSolver,
        initial_guess: DVector<f64>,
    ) -> Result<NewtonResult, SolverError> {
        let mut u = initial_guess;
        let mut linear_iterations = 0;
        let mut controls_changed = false;
        let (block_size, num_blocks) = problem.block_layout();

        for i in 0..=self.max_iterations {
            let (residual, jacobian) = problem.residual_and_jacobian(&u);
            if !residual.iter().all(|x| x.is_finite()) {
                return Err(SolverError::NumericalBreakdown { iteration: i });
            }

            let report = problem.convergence(&u, &residual);
            debug!(
                "  newton {:2} | CNV {:.3e} | MB {:.3e} | well {:.3e}",
                i,
                report.max_cnv(),
                report.max_mb(),
                report.well
            );
            if i >= self.min_iterations && !controls_changed && report.is_converged(&self.tolerances) {
                return Ok(NewtonResult {
                    solution: u,
                    iterations: i,
                    linear_iterations,
                    report,
                });
            }
            if i == self.max_iterations {
                break;
            }

            let rhs = -&residual;
            let step = linear.solve(&jacobian, &rhs, block_size, num_blocks)?;
            linear_iterations += step.iterations;

            if self.line_search {
                u = self.line_search(problem, &u, &residual, &step.dx, i)?;
            } else {
                problem.apply_update(&mut u, &step.dx);
            }
            controls_changed = problem.update_controls(&u);
        }
        Err(SolverError::NonConvergence {
            iterations: self.max_iterations,
        })
    }

    /// Backtracking on the scaled residual norm.
    fn line_search<P: NonlinearProblem>(
        &self,
        problem: &P,
        u: &DVector<f64>,
        residual: &DVector<f64>,
        du: &DVector<f64>,
        iteration: usize,
    ) -> Result<DVector<f64>, SolverError> {
        let current = self.merit.norm(&problem.scaled_residual(u, residual));
        let mut alpha = 1.0;
        while alpha > self.min_step_size {
            let mut candidate = u.clone();
            problem.apply_update(&mut candidate, &(du * alpha));
            let next_res = problem.residual(&candidate);
            let next = self.merit.norm(&problem.scaled_residual(&candidate, &next_res));

            if next.is_finite() && next < (1.0 - alpha * self.armijo_param) * current {
                if alpha < 1.0 {
                    debug!("  line search accepted alpha = {alpha:.3}");
                }
                return Ok(candidate);
            }
            alpha *= 0.5;
        }
        Err(SolverError::LineSearchFailed { iteration })
    }
}
