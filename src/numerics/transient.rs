use log::{debug, warn};
use serde::Serialize;

use super::SolverError;
use crate::config::TimesteppingConfig;

/// Outcome of a converged ministep, used to pick the next one.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MinistepOutcome {
    pub newton_iterations: usize,
    pub linear_iterations: usize,
    /// Largest saturation or mole fraction change over the ministep.
    pub max_change: f64,
}

/// Statistics of one report step.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StepReport {
    pub ministeps: usize,
    pub newton_iterations: usize,
    pub linear_iterations: usize,
    pub cuts: usize,
}

/// Splits report steps into ministeps. Failed ministeps are cut, accepted
/// ones pick the next length from the iteration count and the change of
/// the fraction variables.
#[derive(Clone, Debug)]
pub struct TimestepController {
    config: TimesteppingConfig,
    next_dt: Option<f64>,
}

impl TimestepController {
    pub fn new(config: TimesteppingConfig) -> Self {
        Self { config, next_dt: None }
    }

    pub fn config(&self) -> &TimesteppingConfig {
        &self.config
    }

    /// Length proposed for the ministep after an accepted one of length `dt`.
    pub fn select_next(&self, dt: f64, outcome: &MinistepOutcome) -> f64 {
        let c = &self.config;
        let iterations = outcome.newton_iterations.max(1) as f64;
        let mut factor = c.max_growth.min(c.target_iterations as f64 / iterations);
        if let Some(target) = c.target_change {
            if outcome.max_change > 0.0 {
                factor = factor.min(target / outcome.max_change);
            }
        }
        (dt * factor.max(c.cut_factor)).clamp(c.min_dt, c.max_dt)
    }

    /// Advance over `report_dt` seconds. `ministep` solves one ministep of
    /// the given length and must leave the state untouched when it fails.
    pub fn advance<F>(&mut self, report_dt: f64, mut ministep: F) -> Result<StepReport, SolverError>
    where
        F: FnMut(f64) -> Result<MinistepOutcome, SolverError>,
    {
        let c = self.config.clone();
        let mut report = StepReport::default();
        let mut dt = self.next_dt.unwrap_or(c.initial_dt).min(c.max_dt);
        let mut elapsed = 0.0;
        let mut consecutive_cuts = 0;

        while elapsed < report_dt {
            let remaining = report_dt - elapsed;
            // avoid a sliver at the end of the report step
            let step = if dt >= remaining || remaining - dt < 1e-3 * dt {
                remaining
            } else {
                dt
            };

            match ministep(step) {
                Ok(outcome) => {
                    elapsed = if step == remaining { report_dt } else { elapsed + step };
                    report.ministeps += 1;
                    report.newton_iterations += outcome.newton_iterations;
                    report.linear_iterations += outcome.linear_iterations;
                    consecutive_cuts = 0;
                    debug!(
                        "ministep dt = {:.3e} s | {} newton | change {:.3}",
                        step, outcome.newton_iterations, outcome.max_change
                    );
                    // a step shortened to hit the report time keeps dt
                    if step >= dt {
                        dt = self.select_next(step, &outcome);
                    }
                }
                Err(err) => {
                    report.cuts += 1;
                    consecutive_cuts += 1;
                    let cut = step * c.cut_factor;
                    if consecutive_cuts > c.max_cuts {
                        return Err(SolverError::TooManyCuts { cuts: c.max_cuts });
                    }
                    if cut < c.min_dt {
                        return Err(SolverError::TimestepTooSmall {
                            dt: cut,
                            min_dt: c.min_dt,
                        });
                    }
                    warn!("ministep of {step:.3e} s failed ({err}), retrying with {cut:.3e} s");
                    dt = cut;
                }
            }
        }
        self.next_dt = Some(dt);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn controller() -> TimestepController {
        TimestepController::new(TimesteppingConfig {
            initial_dt: 1.0,
            max_dt: 4.0,
            min_dt: 0.01,
            cut_factor: 0.5,
            max_cuts: 3,
            target_iterations: 4,
            target_change: Some(0.2),
            max_growth: 2.0,
        })
    }

    fn easy(_dt: f64) -> Result<MinistepOutcome, SolverError> {
        Ok(MinistepOutcome {
            newton_iterations: 2,
            linear_iterations: 2,
            max_change: 0.01,
        })
    }

    #[test]
    fn ministeps_cover_report_step() {
        let mut ctrl = controller();
        let mut taken = Vec::new();
        let report = ctrl
            .advance(10.0, |dt| {
                taken.push(dt);
                easy(dt)
            })
            .unwrap();
        // 1, 2, 4, then the remaining 3
        assert_eq!(taken, vec![1.0, 2.0, 4.0, 3.0]);
        assert_eq!(report.ministeps, 4);
        assert_relative_eq!(taken.iter().sum::<f64>(), 10.0);
    }

    #[test]
    fn failures_cut_the_step() {
        let mut ctrl = controller();
        let mut taken = Vec::new();
        let report = ctrl
            .advance(1.0, |dt| {
                taken.push(dt);
                if dt > 0.6 {
                    Err(SolverError::NonConvergence { iterations: 20 })
                } else {
                    easy(dt)
                }
            })
            .unwrap();
        assert_eq!(report.cuts, 1);
        assert_eq!(taken, vec![1.0, 0.5, 0.5]);
        assert_eq!(report.ministeps, 2);
    }

    #[test]
    fn gives_up_after_max_cuts() {
        let mut ctrl = controller();
        let err = ctrl
            .advance(1.0, |_| Err(SolverError::LinearSolveFailed))
            .unwrap_err();
        assert!(matches!(err, SolverError::TooManyCuts { cuts: 3 }));
    }

    #[test]
    fn large_changes_shrink_the_next_step() {
        let ctrl = controller();
        let outcome = MinistepOutcome {
            newton_iterations: 2,
            linear_iterations: 2,
            max_change: 0.4,
        };
        assert_relative_eq!(ctrl.select_next(2.0, &outcome), 1.0);
        let slow = MinistepOutcome {
            newton_iterations: 8,
            ..outcome
        };
        assert_relative_eq!(ctrl.select_next(2.0, &slow), 1.0);
    }
}
