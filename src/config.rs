//! Simulator configuration, stored as JSON.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::DAY;
use crate::numerics::linear::LinearSolverKind;
use crate::numerics::ConvergenceMetric;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid value '{key}': {value} - {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: impl ToString, reason: &str) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default)]
    pub newton: NewtonConfig,

    #[serde(default)]
    pub timestepping: TimesteppingConfig,

    #[serde(default)]
    pub linear_solver: LinearSolverConfig,

    #[serde(default)]
    pub output: OutputConfig,

    /// Switch gravity off for horizontal test problems.
    #[serde(default = "default_gravity")]
    pub gravity: bool,
}

fn default_gravity() -> bool {
    true
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            newton: NewtonConfig::default(),
            timestepping: TimesteppingConfig::default(),
            linear_solver: LinearSolverConfig::default(),
            output: OutputConfig::default(),
            gravity: default_gravity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonConfig {
    pub max_iterations: usize,
    pub min_iterations: usize,
    /// Maximum normalized cell residual.
    pub tol_cnv: f64,
    /// Normalized material balance error.
    pub tol_mb: f64,
    /// Scaled well control equations.
    pub tol_well: f64,
    /// Largest relative pressure change per iteration.
    pub max_dp_rel: f64,
    /// Largest saturation or mole fraction change per iteration.
    pub max_ds: f64,
    pub line_search: bool,
    /// Residual norm the line search has to decrease.
    pub merit: ConvergenceMetric,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            min_iterations: 1,
            tol_cnv: 1e-3,
            tol_mb: 1e-7,
            tol_well: 1e-5,
            max_dp_rel: 0.2,
            max_ds: 0.2,
            line_search: false,
            merit: ConvergenceMetric::L2Norm,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimesteppingConfig {
    /// First ministep [s].
    pub initial_dt: f64,
    pub max_dt: f64,
    pub min_dt: f64,
    /// Factor applied to a failed ministep.
    pub cut_factor: f64,
    /// Consecutive cuts tolerated before giving up.
    pub max_cuts: usize,
    /// Newton iterations a ministep should take.
    pub target_iterations: usize,
    /// Saturation or mole fraction change a ministep should produce.
    pub target_change: Option<f64>,
    /// Largest growth of the ministep between two steps.
    pub max_growth: f64,
}

impl Default for TimesteppingConfig {
    fn default() -> Self {
        Self {
            initial_dt: DAY,
            max_dt: 365.0 * DAY,
            min_dt: 1.0,
            cut_factor: 0.5,
            max_cuts: 10,
            target_iterations: 8,
            target_change: Some(0.2),
            max_growth: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearSolverConfig {
    pub kind: LinearSolverKind,
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Systems up to this many unknowns are factorized directly.
    pub dense_limit: usize,
}

impl Default for LinearSolverConfig {
    fn default() -> Self {
        Self {
            kind: LinearSolverKind::BiCgStab,
            tolerance: 1e-8,
            max_iterations: 2000,
            dense_limit: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub write_csv: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
            write_csv: true,
        }
    }
}

impl SimulatorConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = &self.newton;
        if n.max_iterations == 0 {
            return Err(ConfigError::invalid("newton.max_iterations", 0, "must be at least 1"));
        }
        if n.min_iterations > n.max_iterations {
            return Err(ConfigError::invalid(
                "newton.min_iterations",
                n.min_iterations,
                "exceeds newton.max_iterations",
            ));
        }
        for (key, v) in [
            ("newton.tol_cnv", n.tol_cnv),
            ("newton.tol_mb", n.tol_mb),
            ("newton.tol_well", n.tol_well),
            ("newton.max_dp_rel", n.max_dp_rel),
            ("newton.max_ds", n.max_ds),
        ] {
            if !(v > 0.0) || !v.is_finite() {
                return Err(ConfigError::invalid(key, v, "must be positive"));
            }
        }

        let t = &self.timestepping;
        if !(t.min_dt > 0.0) {
            return Err(ConfigError::invalid("timestepping.min_dt", t.min_dt, "must be positive"));
        }
        if !(t.initial_dt >= t.min_dt) {
            return Err(ConfigError::invalid(
                "timestepping.initial_dt",
                t.initial_dt,
                "must be at least min_dt",
            ));
        }
        if !(t.max_dt >= t.initial_dt) {
            return Err(ConfigError::invalid(
                "timestepping.max_dt",
                t.max_dt,
                "must be at least initial_dt",
            ));
        }
        if !(t.cut_factor > 0.0 && t.cut_factor < 1.0) {
            return Err(ConfigError::invalid(
                "timestepping.cut_factor",
                t.cut_factor,
                "must lie in (0, 1)",
            ));
        }
        if t.target_iterations == 0 {
            return Err(ConfigError::invalid("timestepping.target_iterations", 0, "must be at least 1"));
        }
        if let Some(c) = t.target_change {
            if !(c > 0.0) {
                return Err(ConfigError::invalid("timestepping.target_change", c, "must be positive"));
            }
        }
        if !(t.max_growth >= 1.0) {
            return Err(ConfigError::invalid(
                "timestepping.max_growth",
                t.max_growth,
                "must be at least 1",
            ));
        }

        let l = &self.linear_solver;
        if !(l.tolerance > 0.0) || l.max_iterations == 0 {
            return Err(ConfigError::invalid(
                "linear_solver.tolerance",
                l.tolerance,
                "tolerance and max_iterations must be positive",
            ));
        }
        Ok(())
    }
}
