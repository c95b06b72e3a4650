use std::sync::Arc;

use kryst::preconditioner::PcSide;
use kryst::solver::LinearSolver as _;
use kryst::{
    parallel::{NoComm, UniverseComm},
    ConvergedReason,
};
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::sparse::{csr_from_triplets, entry, row_entries, to_dense, CsrMatrix};
use super::SolverError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinearSolverKind {
    /// Sparse BiCGStab on the block-Jacobi scaled system. Systems with at
    /// most `dense_limit` unknowns are factorized directly.
    #[default]
    BiCgStab,
    /// Dense LU of the scaled system regardless of size.
    Direct,
}

#[derive(Clone, Debug)]
pub struct LinearSolver {
    pub kind: LinearSolverKind,
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Largest system handed to the dense LU under `BiCgStab`.
    pub dense_limit: usize,
}

impl Default for LinearSolver {
    fn default() -> Self {
        Self {
            kind: LinearSolverKind::BiCgStab,
            tolerance: 1e-8,
            max_iterations: 2000,
            dense_limit: 500,
        }
    }
}

pub struct LinearSolution {
    pub dx: DVector<f64>,
    pub iterations: usize,
}

/// Left block-Jacobi scaling: rows of each node are multiplied by the inverse
/// of the node's diagonal block; remaining rows (well equations) by their
/// largest entry. Singular blocks fall back to row scaling.
pub fn block_jacobi_scale(
    jac: &CsrMatrix,
    rhs: &DVector<f64>,
    block_size: usize,
    num_blocks: usize,
) -> (CsrMatrix, DVector<f64>) {
    let n = jac.nrows();
    let mut triplets = Vec::with_capacity(jac.nnz() * block_size);
    let mut b = DVector::zeros(n);

    for blk in 0..num_blocks {
        let base = blk * block_size;
        let diag = DMatrix::from_fn(block_size, block_size, |i, j| entry(jac, base + i, base + j));
        let inv = diag.try_inverse().filter(|m| m.iter().all(|v| v.is_finite()));
        match inv {
            Some(inv) => {
                for i in 0..block_size {
                    for k in 0..block_size {
                        let w = inv[(i, k)];
                        if w == 0.0 {
                            continue;
                        }
                        b[base + i] += w * rhs[base + k];
                        triplets.extend(row_entries(jac, base + k).map(|(c, v)| (base + i, c, w * v)));
                    }
                }
            }
            None => {
                for r in base..base + block_size {
                    scale_row(jac, rhs, r, &mut triplets, &mut b);
                }
            }
        }
    }
    for r in num_blocks * block_size..n {
        scale_row(jac, rhs, r, &mut triplets, &mut b);
    }
    (csr_from_triplets(n, &mut triplets), b)
}

fn scale_row(
    jac: &CsrMatrix,
    rhs: &DVector<f64>,
    r: usize,
    triplets: &mut Vec<(usize, usize, f64)>,
    b: &mut DVector<f64>,
) {
    let largest = row_entries(jac, r).fold(0.0_f64, |acc, (_, v)| acc.max(v.abs()));
    let w = if largest > 0.0 { 1.0 / largest } else { 1.0 };
    b[r] = w * rhs[r];
    triplets.extend(row_entries(jac, r).map(|(c, v)| (r, c, w * v)));
}

impl LinearSolver {
    pub fn new(kind: LinearSolverKind, tolerance: f64, max_iterations: usize) -> Self {
        Self {
            kind,
            tolerance,
            max_iterations,
            ..Self::default()
        }
    }

    pub fn with_dense_limit(mut self, dense_limit: usize) -> Self {
        self.dense_limit = dense_limit;
        self
    }

    /// Solve `J dx = rhs` after block-Jacobi scaling.
    pub fn solve(
        &self,
        jac: &CsrMatrix,
        rhs: &DVector<f64>,
        block_size: usize,
        num_blocks: usize,
    ) -> Result<LinearSolution, SolverError> {
        let (a, b) = block_jacobi_scale(jac, rhs, block_size, num_blocks);
        let dense = self.kind == LinearSolverKind::Direct || a.nrows() <= self.dense_limit;
        let solution = if dense {
            Self::solve_direct(&a, &b)?
        } else {
            self.solve_bicgstab(a, &b)?
        };
        if !solution.dx.iter().all(|v| v.is_finite()) {
            return Err(SolverError::LinearSolveFailed);
        }
        Ok(solution)
    }

    fn solve_direct(a: &CsrMatrix, b: &DVector<f64>) -> Result<LinearSolution, SolverError> {
        let dx = to_dense(a).lu().solve(b).ok_or(SolverError::LinearSolveFailed)?;
        Ok(LinearSolution { dx, iterations: 1 })
    }

    fn solve_bicgstab(&self, a: CsrMatrix, b: &DVector<f64>) -> Result<LinearSolution, SolverError> {
        let n = a.nrows();
        let op = kryst::matrix::op::CsrOp::new(Arc::new(a));

        let mut solver = kryst::solver::bicgstab::BiCgStabSolver::new(self.tolerance, self.max_iterations);
        let mut workspace = kryst::context::ksp_context::Workspace::new(n);
        solver.setup_workspace(&mut workspace);

        let mut dx = DVector::zeros(n);
        let stats = solver
            .solve(
                &op,
                None,
                b.as_slice(),
                dx.as_mut_slice(),
                PcSide::Left,
                &UniverseComm::NoComm(NoComm {}),
                None,
                Some(&mut workspace),
            )
            .map_err(|e| {
                warn!("BiCGStab failed: {e:?}");
                SolverError::LinearSolveFailed
            })?;

        match stats.reason {
            ConvergedReason::ConvergedRtol
            | ConvergedReason::ConvergedAtol
            | ConvergedReason::ConvergedHappyBreakdown => {
                debug!("  BiCGStab converged in {} iterations", stats.iterations);
                Ok(LinearSolution {
                    dx,
                    iterations: stats.iterations,
                })
            }
            reason => {
                warn!("BiCGStab stopped after {} iterations: {reason:?}", stats.iterations);
                Err(SolverError::LinearSolveFailed)
            }
        }
    }
}
