pub mod compositional;
pub mod immiscible;

use thiserror::Error;

use crate::discretization::MeshError;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error("invalid fluid system: {0}")]
    InvalidFluid(String),
    #[error("controls reference unknown well '{0}'")]
    UnknownWell(String),
    #[error("well '{0}' is defined twice")]
    DuplicateWell(String),
    #[error("invalid well '{well}': {reason}")]
    InvalidWell { well: String, reason: String },
    #[error("invalid control for well '{well}': {reason}")]
    InvalidControl { well: String, reason: String },
    #[error("state has {found} {what}, model expects {expected}")]
    StateSize {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("invalid forces: {0}")]
    InvalidForces(String),
}
