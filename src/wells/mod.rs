pub mod control;

use std::f64::consts::PI;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::discretization::reservoir::Reservoir;
use crate::models::ModelError;

/// Axis the well bore follows through a perforated cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WellDirection {
    X,
    Y,
    #[default]
    Z,
}

/// User description of a well, turned into a [`Well`] by [`setup_well`].
#[derive(Clone, Debug, PartialEq)]
pub struct WellSetup {
    pub name: String,
    /// Bore radius [m].
    pub radius: f64,
    pub skin: f64,
    pub direction: WellDirection,
    /// Depth at which the bottom-hole pressure is measured. Defaults to the
    /// depth of the first perforated cell.
    pub reference_depth: Option<f64>,
    /// One well-bore node per perforation instead of a single node.
    pub multisegment: bool,
    /// Explicit well indices overriding Peaceman.
    pub well_indices: Option<Vec<f64>>,
}

impl WellSetup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            radius: 0.1,
            skin: 0.0,
            direction: WellDirection::Z,
            reference_depth: None,
            multisegment: false,
            well_indices: None,
        }
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_skin(mut self, skin: f64) -> Self {
        self.skin = skin;
        self
    }

    pub fn with_direction(mut self, direction: WellDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_reference_depth(mut self, depth: f64) -> Self {
        self.reference_depth = Some(depth);
        self
    }

    pub fn multisegment(mut self) -> Self {
        self.multisegment = true;
        self
    }

    pub fn with_well_indices(mut self, wi: Vec<f64>) -> Self {
        self.well_indices = Some(wi);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Perforation {
    pub cell: usize,
    pub well_index: f64,
    /// Depth of the perforated cell centroid.
    pub depth: f64,
    /// Well-bore node the perforation is attached to.
    pub node: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WellNode {
    pub depth: f64,
    /// Bore volume lumped into the node [m^3].
    pub volume: f64,
}

/// Hagen-Poiseuille segment between two well-bore nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct WellSegment {
    pub upper: usize,
    pub lower: usize,
    /// `pi r^4 / (8 L)`; divided by the mixture viscosity at run time.
    pub transmissibility: f64,
}

/// A well coupled to the reservoir. Node 0 is the top node where the
/// bottom-hole pressure is defined and the surface rate enters.
#[derive(Clone, Debug, PartialEq)]
pub struct Well {
    pub name: String,
    pub radius: f64,
    pub reference_depth: f64,
    pub perforations: Vec<Perforation>,
    pub nodes: Vec<WellNode>,
    pub segments: Vec<WellSegment>,
}

impl Well {
    pub fn is_multisegment(&self) -> bool {
        !self.segments.is_empty()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn cells(&self) -> impl Iterator<Item = usize> + '_ {
        self.perforations.iter().map(|p| p.cell)
    }
}

/// Peaceman well index for a bore along `direction`.
///
/// `perm` and `extent` are the principal permeabilities and the cell extent
/// along x, y and z.
pub fn peaceman_index(perm: [f64; 3], extent: [f64; 3], radius: f64, skin: f64, direction: WellDirection) -> f64 {
    let (k1, k2, d1, d2, h) = match direction {
        WellDirection::X => (perm[1], perm[2], extent[1], extent[2], extent[0]),
        WellDirection::Y => (perm[0], perm[2], extent[0], extent[2], extent[1]),
        WellDirection::Z => (perm[0], perm[1], extent[0], extent[1], extent[2]),
    };
    let r21 = (k2 / k1).sqrt();
    let r12 = (k1 / k2).sqrt();
    let re = 0.28 * (r21 * d1 * d1 + r12 * d2 * d2).sqrt() / (r21.sqrt() + r12.sqrt());
    2.0 * PI * (k1 * k2).sqrt() * h / ((re / radius).ln() + skin)
}

/// Perforate `cells` and build the well-bore node layout.
pub fn setup_well(reservoir: &Reservoir, cells: &[usize], setup: WellSetup) -> Result<Well, ModelError> {
    let invalid = |reason: String| ModelError::InvalidWell {
        well: setup.name.clone(),
        reason,
    };
    if cells.is_empty() {
        return Err(invalid("no perforated cells".to_string()));
    }
    if !(setup.radius > 0.0) {
        return Err(invalid(format!("radius must be positive, got {}", setup.radius)));
    }
    let mesh = &reservoir.mesh;
    if let Some(&c) = cells.iter().find(|&&c| c >= mesh.num_cells()) {
        return Err(invalid(format!("cell {c} outside the mesh")));
    }
    for (i, c) in cells.iter().enumerate() {
        if cells[..i].contains(c) {
            return Err(invalid(format!("cell {c} perforated twice")));
        }
    }

    let well_indices = match &setup.well_indices {
        Some(wi) if wi.len() != cells.len() => {
            return Err(invalid(format!(
                "{} well indices for {} perforations",
                wi.len(),
                cells.len()
            )))
        }
        Some(wi) => wi.clone(),
        None => cells
            .iter()
            .map(|&c| {
                peaceman_index(
                    reservoir.permeability[c].diagonal(),
                    mesh.cell_extent(c),
                    setup.radius,
                    setup.skin,
                    setup.direction,
                )
            })
            .collect(),
    };
    if let Some(wi) = well_indices.iter().find(|wi| !(**wi > 0.0) || !wi.is_finite()) {
        return Err(invalid(format!("non-positive well index {wi}")));
    }

    let reference_depth = setup.reference_depth.unwrap_or_else(|| mesh.depth(cells[0]));
    let area = PI * setup.radius * setup.radius;

    let mut perforations: Vec<Perforation> = cells
        .iter()
        .zip(&well_indices)
        .map(|(&cell, &well_index)| Perforation {
            cell,
            well_index,
            depth: mesh.depth(cell),
            node: 0,
        })
        .collect();

    let (nodes, segments) = if setup.multisegment {
        let mut top = DVec3::from_array(mesh.cells[cells[0]].centroid);
        top.z = reference_depth;
        let mut nodes = vec![WellNode {
            depth: reference_depth,
            volume: area,
        }];
        let mut segments = Vec::with_capacity(cells.len());
        let mut previous = top;
        for (i, perf) in perforations.iter_mut().enumerate() {
            let position = DVec3::from_array(mesh.cells[perf.cell].centroid);
            let length = previous.distance(position).max(2.0 * setup.radius);
            nodes.push(WellNode {
                depth: perf.depth,
                volume: area * length.max(1.0),
            });
            segments.push(WellSegment {
                upper: i,
                lower: i + 1,
                transmissibility: PI * setup.radius.powi(4) / (8.0 * length),
            });
            perf.node = i + 1;
            previous = position;
        }
        (nodes, segments)
    } else {
        let (lo, hi) = perforations
            .iter()
            .fold((reference_depth, reference_depth), |(lo, hi), p| {
                (lo.min(p.depth), hi.max(p.depth))
            });
        let node = WellNode {
            depth: reference_depth,
            volume: area * (hi - lo).max(1.0),
        };
        (vec![node], Vec::new())
    };

    Ok(Well {
        name: setup.name,
        radius: setup.radius,
        reference_depth,
        perforations,
        nodes,
        segments,
    })
}
