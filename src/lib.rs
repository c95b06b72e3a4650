//! Multiphase flow in porous media: two-point flux finite volumes on
//! unstructured meshes, fully implicit Newton with automatic
//! differentiation, and wells coupled through surface-rate unknowns.

pub mod config;
pub mod constants;
pub mod discretization;
pub mod fluid;
pub mod logging;
pub mod models;
pub mod numerics;
pub mod physics;
pub mod processing;
pub mod simulator;
pub mod wells;
