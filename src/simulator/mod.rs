pub mod forces;
pub mod model;
pub mod state;

use std::collections::BTreeMap;

use log::{error, info};
use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigError, SimulatorConfig};
use crate::constants::GRAVITY;
use crate::models::ModelError;
use crate::numerics::linear::LinearSolver;
use crate::numerics::newton::NewtonSolver;
use crate::numerics::transient::{MinistepOutcome, StepReport, TimestepController};
use crate::numerics::{SolverError, Tolerances};
use crate::physics::sparse::{well_inflow, well_phase_fractions, FlowProblem};
use crate::physics::{FlowSystem, UpdateLimits};
use crate::wells::control::{WellDrive, WellTarget};
use forces::Forces;
use model::ReservoirModel;
use state::State;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("report step {step} failed: {source}")]
    ReportStep {
        step: usize,
        #[source]
        source: SolverError,
    },
}

/// Well quantities at the end of a report step. Rates are signed, positive
/// for injection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WellResult {
    pub bhp: f64,
    /// Total surface rate.
    pub surface_rate: f64,
    pub phase_rates: Vec<f64>,
    /// Component rates in the units of the conserved quantity per second.
    pub component_rates: Vec<f64>,
    pub control: Option<WellTarget>,
}

#[derive(Clone, Debug, Default)]
pub struct SimulationResult {
    /// Time at the end of each report step [s].
    pub times: Vec<f64>,
    pub states: Vec<State>,
    pub wells: Vec<BTreeMap<String, WellResult>>,
    pub reports: Vec<StepReport>,
}

pub struct Simulator<S> {
    model: ReservoirModel<S>,
    config: SimulatorConfig,
    newton: NewtonSolver,
    linear: LinearSolver,
}

impl<S: FlowSystem> Simulator<S> {
    pub fn new(model: ReservoirModel<S>, config: SimulatorConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let n = &config.newton;
        let newton = NewtonSolver {
            max_iterations: n.max_iterations,
            min_iterations: n.min_iterations,
            tolerances: Tolerances {
                cnv: n.tol_cnv,
                mb: n.tol_mb,
                well: n.tol_well,
            },
            line_search: n.line_search,
            merit: n.merit,
            ..NewtonSolver::default()
        };
        let l = &config.linear_solver;
        let linear = LinearSolver::new(l.kind, l.tolerance, l.max_iterations).with_dense_limit(l.dense_limit);
        Ok(Self {
            model,
            config,
            newton,
            linear,
        })
    }

    pub fn model(&self) -> &ReservoirModel<S> {
        &self.model
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    fn gravity(&self) -> f64 {
        if self.config.gravity {
            GRAVITY
        } else {
            0.0
        }
    }

    /// Run the report steps `timesteps` (lengths in seconds). `forces` holds
    /// one entry per report step, or a single entry used for all of them.
    pub fn simulate(
        &self,
        initial: &State,
        timesteps: &[f64],
        forces: &[Forces],
    ) -> Result<SimulationResult, SimulationError> {
        let model = &self.model;
        initial.check(model)?;
        if let Some(dt) = timesteps.iter().find(|dt| !(**dt > 0.0) || !dt.is_finite()) {
            return Err(ModelError::InvalidForces(format!("report step {dt} must be positive")).into());
        }
        if forces.is_empty() || (forces.len() != 1 && forces.len() != timesteps.len()) {
            return Err(ModelError::InvalidForces(format!(
                "{} force entries for {} report steps",
                forces.len(),
                timesteps.len()
            ))
            .into());
        }
        for f in forces {
            f.validate(model)?;
        }

        let limits = UpdateLimits {
            max_dp_rel: self.config.newton.max_dp_rel,
            max_ds: self.config.newton.max_ds,
        };
        let gravity = self.gravity();
        let mut controller = TimestepController::new(self.config.timestepping.clone());
        let mut result = SimulationResult::default();
        let mut u = initial.primary.clone();
        let mut time = 0.0;

        info!(
            "simulating {} report steps over {} cells and {} wells",
            timesteps.len(),
            model.num_cells(),
            model.wells.len()
        );
        for (step, &report_dt) in timesteps.iter().enumerate() {
            let step_forces = if forces.len() == 1 { &forces[0] } else { &forces[step] };
            let boundaries = model.resolve_boundaries(&step_forces.boundaries);
            // each report step starts from the user controls
            let mut drives = step_forces.well_drives(model);

            let report = controller
                .advance(report_dt, |dt| {
                    let mut problem = FlowProblem::new(model, u.as_slice(), dt, drives.clone())
                        .with_gravity(gravity)
                        .with_boundaries(&boundaries)
                        .with_sources(&step_forces.sources)
                        .with_limits(limits);
                    let solved = self.newton.solve(&mut problem, &self.linear, u.clone())?;
                    let max_change = max_fraction_change(model, u.as_slice(), solved.solution.as_slice());
                    u = solved.solution;
                    drives = problem.wells;
                    Ok(MinistepOutcome {
                        newton_iterations: solved.iterations,
                        linear_iterations: solved.linear_iterations,
                        max_change,
                    })
                })
                .map_err(|source| {
                    error!("report step {step} failed: {source}");
                    SimulationError::ReportStep { step, source }
                })?;

            time += report_dt;
            info!(
                "step {:>4} | t = {:.3e} s | {} ministeps | {} newton | {} cuts",
                step + 1,
                time,
                report.ministeps,
                report.newton_iterations,
                report.cuts
            );
            result.wells.push(self.well_results(u.as_slice(), &drives));
            result.states.push(State::from_primary(model, u.clone())?);
            result.reports.push(report);
            result.times.push(time);
        }
        Ok(result)
    }

    fn well_results(&self, u: &[f64], drives: &[WellDrive]) -> BTreeMap<String, WellResult> {
        let model = &self.model;
        let m = model.block_size();
        model
            .wells
            .iter()
            .zip(drives)
            .enumerate()
            .map(|(w, (well, drive))| {
                let top = model.top_node(w);
                let u_top = &u[top * m..(top + 1) * m];
                let q = u[model.rate_index(w)];
                let phase_rates = well_phase_fractions(&model.system, drive, u_top, q)
                    .into_iter()
                    .map(|f| f * q)
                    .collect();
                let result = WellResult {
                    bhp: u_top[0],
                    surface_rate: q,
                    phase_rates,
                    component_rates: well_inflow(&model.system, drive, u_top, q),
                    control: drive.active.clone(),
                };
                (well.name.clone(), result)
            })
            .collect()
    }
}

/// Largest change of any fraction over the reservoir cells.
fn max_fraction_change<S: FlowSystem>(model: &ReservoirModel<S>, before: &[f64], after: &[f64]) -> f64 {
    let m = model.block_size();
    (0..model.num_cells())
        .map(|c| {
            let old = model.system.fractions(&before[c * m..(c + 1) * m]);
            let new = model.system.fractions(&after[c * m..(c + 1) * m]);
            old.iter().zip(&new).fold(0.0_f64, |acc, (a, b)| acc.max((a - b).abs()))
        })
        .fold(0.0, f64::max)
}
