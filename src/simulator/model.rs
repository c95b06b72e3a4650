use std::collections::HashSet;

use log::debug;

use crate::discretization::reservoir::Reservoir;
use crate::models::ModelError;
use crate::physics::bc::BoundaryRegistry;
use crate::physics::sparse::ActiveBoundary;
use crate::physics::FlowSystem;
use crate::wells::Well;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionKind {
    Face(usize),
    Perforation { well: usize, perforation: usize },
    Segment { well: usize, segment: usize },
}

/// Edge of the flow graph. Flux is measured from `left` to `right`; for
/// perforations `left` is the well node.
#[derive(Clone, Debug, PartialEq)]
pub struct Connection {
    pub left: usize,
    pub right: usize,
    pub transmissibility: f64,
    /// Depth of `right` minus depth of `left`.
    pub dz: f64,
    pub kind: ConnectionKind,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoundaryFace {
    pub face: usize,
    pub cell: usize,
    pub half_transmissibility: f64,
    /// Depth of the face centroid minus depth of the cell.
    pub dz: f64,
}

/// Reservoir cells followed by the well-bore nodes of every well, and the
/// connections between them.
#[derive(Clone, Debug)]
pub struct FlowGraph {
    pub num_cells: usize,
    /// Reference pore volume of cells, bore volume of well nodes.
    pub volumes: Vec<f64>,
    pub depths: Vec<f64>,
    pub connections: Vec<Connection>,
    pub boundary_faces: Vec<BoundaryFace>,
    /// First node of each well; the top node.
    pub well_offsets: Vec<usize>,
}

impl FlowGraph {
    pub fn build(reservoir: &Reservoir, wells: &[Well]) -> Self {
        let mesh = &reservoir.mesh;
        let num_cells = mesh.num_cells();
        let mut volumes = reservoir.pore_volume.clone();
        let mut depths: Vec<f64> = (0..num_cells).map(|c| mesh.depth(c)).collect();
        let mut connections = Vec::new();
        let mut boundary_faces = Vec::new();

        for (f, face) in mesh.faces.iter().enumerate() {
            let (l, r) = face.neighbor_cell_ids;
            match r {
                Some(r) => connections.push(Connection {
                    left: l,
                    right: r,
                    transmissibility: reservoir.face_transmissibility(f),
                    dz: depths[r] - depths[l],
                    kind: ConnectionKind::Face(f),
                }),
                None => boundary_faces.push(BoundaryFace {
                    face: f,
                    cell: l,
                    half_transmissibility: reservoir.face_transmissibility(f),
                    dz: face.centroid[2] - depths[l],
                }),
            }
        }

        let mut well_offsets = Vec::with_capacity(wells.len());
        for (w, well) in wells.iter().enumerate() {
            let offset = volumes.len();
            well_offsets.push(offset);
            for node in &well.nodes {
                volumes.push(node.volume);
                depths.push(node.depth);
            }
            for (s, seg) in well.segments.iter().enumerate() {
                let (upper, lower) = (offset + seg.upper, offset + seg.lower);
                connections.push(Connection {
                    left: upper,
                    right: lower,
                    transmissibility: seg.transmissibility,
                    dz: depths[lower] - depths[upper],
                    kind: ConnectionKind::Segment { well: w, segment: s },
                });
            }
            for (p, perf) in well.perforations.iter().enumerate() {
                let node = offset + perf.node;
                connections.push(Connection {
                    left: node,
                    right: perf.cell,
                    transmissibility: perf.well_index,
                    dz: perf.depth - depths[node],
                    kind: ConnectionKind::Perforation { well: w, perforation: p },
                });
            }
        }

        Self {
            num_cells,
            volumes,
            depths,
            connections,
            boundary_faces,
            well_offsets,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_cell(&self, node: usize) -> bool {
        node < self.num_cells
    }
}

/// Reservoir, fluid system and wells, with the derived flow graph.
#[derive(Clone, Debug)]
pub struct ReservoirModel<S> {
    pub reservoir: Reservoir,
    pub system: S,
    pub wells: Vec<Well>,
    pub graph: FlowGraph,
}

pub fn setup_reservoir_model<S: FlowSystem>(
    reservoir: Reservoir,
    system: S,
    wells: Vec<Well>,
) -> Result<ReservoirModel<S>, ModelError> {
    let mut names = HashSet::new();
    for well in &wells {
        if !names.insert(well.name.as_str()) {
            return Err(ModelError::DuplicateWell(well.name.clone()));
        }
        if let Some(c) = well.cells().find(|&c| c >= reservoir.num_cells()) {
            return Err(ModelError::InvalidWell {
                well: well.name.clone(),
                reason: format!("cell {c} outside the mesh"),
            });
        }
    }
    let graph = FlowGraph::build(&reservoir, &wells);
    debug!(
        "flow graph: {} cells, {} well nodes, {} connections, {} boundary faces",
        graph.num_cells,
        graph.num_nodes() - graph.num_cells,
        graph.connections.len(),
        graph.boundary_faces.len()
    );
    Ok(ReservoirModel {
        reservoir,
        system,
        wells,
        graph,
    })
}

impl<S: FlowSystem> ReservoirModel<S> {
    /// Unknowns per node.
    pub fn block_size(&self) -> usize {
        self.system.num_components()
    }

    pub fn num_nodes(&self) -> usize {
        self.graph.num_nodes()
    }

    pub fn num_cells(&self) -> usize {
        self.graph.num_cells
    }

    /// Node unknowns followed by one surface rate per well.
    pub fn num_unknowns(&self) -> usize {
        self.num_nodes() * self.block_size() + self.wells.len()
    }

    pub fn well_index(&self, name: &str) -> Option<usize> {
        self.wells.iter().position(|w| w.name == name)
    }

    pub fn rate_index(&self, well: usize) -> usize {
        self.num_nodes() * self.block_size() + well
    }

    pub fn top_node(&self, well: usize) -> usize {
        self.graph.well_offsets[well]
    }

    /// Boundary faces matched by a rule of the registry.
    pub fn resolve_boundaries(&self, registry: &BoundaryRegistry) -> Vec<ActiveBoundary> {
        if registry.is_empty() {
            return Vec::new();
        }
        let mesh = &self.reservoir.mesh;
        self.graph
            .boundary_faces
            .iter()
            .filter_map(|bf| {
                let face = &mesh.faces[bf.face];
                let label = mesh.boundary_tags.get(&bf.face).map(String::as_str);
                let rule = registry.find_for(label, face.centroid.into(), face.normal.into())?;
                Some(ActiveBoundary {
                    cell: bf.cell,
                    transmissibility: bf.half_transmissibility * rule.trans_multiplier,
                    dz: bf.dz,
                    pressure: rule.pressure,
                    fractions: rule.fractions.clone(),
                })
            })
            .collect()
    }
}
