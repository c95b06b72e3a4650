pub mod generator;
pub mod mesh;
pub mod reservoir;
pub mod tpfa;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("mesh has no cells")]
    Empty,
    #[error("cell at position {position} carries id {id}")]
    CellIdMismatch { position: usize, id: usize },
    #[error("cell {cell} has non-positive volume {volume}")]
    NonPositiveVolume { cell: usize, volume: f64 },
    #[error("face {face} has non-positive area {area}")]
    NonPositiveArea { face: usize, area: f64 },
    #[error("face {face} references cell {cell}, mesh has {num_cells} cells")]
    CellOutOfRange {
        face: usize,
        cell: usize,
        num_cells: usize,
    },
    #[error("face {face} connects cell {cell} to itself")]
    SelfConnection { face: usize, cell: usize },
    #[error("boundary tag on face {face}, which is not a boundary face")]
    InvalidBoundaryTag { face: usize },
    #[error("grid nodes along axis {axis} must be strictly increasing")]
    InvalidSpacing { axis: usize },
    #[error("{name} has {found} entries, expected {expected}")]
    PropertyLength {
        name: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("invalid {name} in cell {cell}")]
    InvalidProperty { name: &'static str, cell: usize },
}
