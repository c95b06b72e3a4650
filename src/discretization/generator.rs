use std::collections::HashMap;

use super::mesh::{Cell, Face, Mesh};
use super::MeshError;

const SIDE_LABELS: [[&str; 2]; 3] = [["xmin", "xmax"], ["ymin", "ymax"], ["zmin", "zmax"]];

/// Logically Cartesian (tensor-product) grid.
///
/// Cells are numbered `i + nx * (j + ny * k)`; `k` indexes depth.
#[derive(Clone, Debug)]
pub struct CartesianGrid {
    pub dims: [usize; 3],
    /// Node coordinates along each axis (`dims[d] + 1` entries each).
    pub nodes: [Vec<f64>; 3],
}

impl CartesianGrid {
    /// Uniform grid with `dims` cells spanning `extent`, origin at zero.
    pub fn new(dims: [usize; 3], extent: [f64; 3]) -> Result<Self, MeshError> {
        let mut nodes: [Vec<f64>; 3] = Default::default();
        for d in 0..3 {
            if dims[d] == 0 {
                return Err(MeshError::Empty);
            }
            if !(extent[d] > 0.0) {
                return Err(MeshError::InvalidSpacing { axis: d });
            }
            let h = extent[d] / dims[d] as f64;
            nodes[d] = (0..=dims[d]).map(|i| i as f64 * h).collect();
        }
        Ok(Self { dims, nodes })
    }

    /// Tensor grid from strictly increasing node coordinates per axis.
    pub fn from_nodes(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Result<Self, MeshError> {
        let nodes = [x, y, z];
        let mut dims = [0; 3];
        for d in 0..3 {
            if nodes[d].len() < 2 {
                return Err(MeshError::Empty);
            }
            if nodes[d].windows(2).any(|w| !(w[1] > w[0])) {
                return Err(MeshError::InvalidSpacing { axis: d });
            }
            dims[d] = nodes[d].len() - 1;
        }
        Ok(Self { dims, nodes })
    }

    pub fn num_cells(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn cell_index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.dims[0] * (j + self.dims[1] * k)
    }

    /// Inverse of [`cell_index`](Self::cell_index).
    pub fn ijk(&self, cell: usize) -> [usize; 3] {
        let i = cell % self.dims[0];
        let j = (cell / self.dims[0]) % self.dims[1];
        let k = cell / (self.dims[0] * self.dims[1]);
        [i, j, k]
    }

    fn spacing(&self, axis: usize, i: usize) -> f64 {
        self.nodes[axis][i + 1] - self.nodes[axis][i]
    }

    fn center(&self, axis: usize, i: usize) -> f64 {
        0.5 * (self.nodes[axis][i + 1] + self.nodes[axis][i])
    }

    /// Build the cell/face mesh. Boundary faces are tagged by side.
    pub fn mesh(&self) -> Mesh {
        let [nx, ny, nz] = self.dims;
        let mut cells = Vec::with_capacity(self.num_cells());
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let id = self.cell_index(i, j, k);
                    cells.push(Cell {
                        id,
                        volume: self.spacing(0, i) * self.spacing(1, j) * self.spacing(2, k),
                        centroid: [self.center(0, i), self.center(1, j), self.center(2, k)],
                        face_ids: Vec::new(),
                    });
                }
            }
        }

        let mut faces = Vec::new();
        let mut tags = HashMap::new();

        for axis in 0..3 {
            let (a1, a2) = ((axis + 1) % 3, (axis + 2) % 3);
            let n = self.dims[axis];
            for idx in 0..self.num_cells() {
                let ijk = self.ijk(idx);
                let area = self.spacing(a1, ijk[a1]) * self.spacing(a2, ijk[a2]);
                let mut centroid = cells[idx].centroid;
                let mut normal = [0.0; 3];
                normal[axis] = 1.0;

                // Lower side of the whole grid.
                if ijk[axis] == 0 {
                    centroid[axis] = self.nodes[axis][0];
                    let mut outward = [0.0; 3];
                    outward[axis] = -1.0;
                    tags.insert(faces.len(), SIDE_LABELS[axis][0].to_string());
                    faces.push(Face {
                        area,
                        normal: outward,
                        neighbor_cell_ids: (idx, None),
                        centroid,
                    });
                }

                centroid[axis] = self.nodes[axis][ijk[axis] + 1];
                if ijk[axis] + 1 < n {
                    let mut next = ijk;
                    next[axis] += 1;
                    let neighbor = self.cell_index(next[0], next[1], next[2]);
                    faces.push(Face {
                        area,
                        normal,
                        neighbor_cell_ids: (idx, Some(neighbor)),
                        centroid,
                    });
                } else {
                    tags.insert(faces.len(), SIDE_LABELS[axis][1].to_string());
                    faces.push(Face {
                        area,
                        normal,
                        neighbor_cell_ids: (idx, None),
                        centroid,
                    });
                }
            }
        }

        // Topology is correct by construction.
        match Mesh::new(cells, faces, tags) {
            Ok(mesh) => mesh,
            Err(e) => unreachable!("Cartesian grid produced an invalid mesh: {e}"),
        }
    }
}
