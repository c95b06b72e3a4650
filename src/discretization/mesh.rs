use std::collections::HashMap;

use super::MeshError;

/// The complete computational grid.
///
/// Pure geometry and topology; rock properties live in
/// [`Reservoir`](super::reservoir::Reservoir). Depth is the third coordinate
/// and grows downward.
#[derive(Clone, Debug)]
pub struct Mesh {
    pub cells: Vec<Cell>,
    pub faces: Vec<Face>,
    /// Labels of boundary faces, e.g. `"xmin"` for the generator's west side.
    pub boundary_tags: HashMap<usize, String>,
}

/// A single control volume.
#[derive(Clone, Debug)]
pub struct Cell {
    pub id: usize,
    pub volume: f64,
    pub centroid: [f64; 3],
    pub face_ids: Vec<usize>,
}

/// An interface between two cells, or between a cell and the outside.
#[derive(Clone, Debug)]
pub struct Face {
    pub area: f64,
    /// Unit normal pointing from the first to the second neighbor, or out of
    /// the domain for boundary faces.
    pub normal: [f64; 3],
    /// Tuple of (cell1_id, optional cell2_id). `None` indicates a boundary face.
    pub neighbor_cell_ids: (usize, Option<usize>),
    pub centroid: [f64; 3],
}

impl Face {
    pub fn is_boundary(&self) -> bool {
        self.neighbor_cell_ids.1.is_none()
    }
}

impl Mesh {
    /// Build a mesh from explicit cells and faces. Each cell's `face_ids` is
    /// rebuilt from the face neighbor lists, so callers may leave it empty.
    pub fn new(
        mut cells: Vec<Cell>,
        faces: Vec<Face>,
        boundary_tags: HashMap<usize, String>,
    ) -> Result<Self, MeshError> {
        if cells.is_empty() {
            return Err(MeshError::Empty);
        }
        let num_cells = cells.len();

        for (i, cell) in cells.iter_mut().enumerate() {
            if cell.id != i {
                return Err(MeshError::CellIdMismatch {
                    position: i,
                    id: cell.id,
                });
            }
            if !(cell.volume > 0.0) || !cell.volume.is_finite() {
                return Err(MeshError::NonPositiveVolume {
                    cell: i,
                    volume: cell.volume,
                });
            }
            cell.face_ids.clear();
        }

        for (face_id, face) in faces.iter().enumerate() {
            let (left, right) = face.neighbor_cell_ids;
            if !(face.area > 0.0) || !face.area.is_finite() {
                return Err(MeshError::NonPositiveArea {
                    face: face_id,
                    area: face.area,
                });
            }
            for cell in std::iter::once(left).chain(right) {
                if cell >= num_cells {
                    return Err(MeshError::CellOutOfRange {
                        face: face_id,
                        cell,
                        num_cells,
                    });
                }
            }
            if right == Some(left) {
                return Err(MeshError::SelfConnection {
                    face: face_id,
                    cell: left,
                });
            }
            cells[left].face_ids.push(face_id);
            if let Some(r) = right {
                cells[r].face_ids.push(face_id);
            }
        }

        for &face_id in boundary_tags.keys() {
            match faces.get(face_id) {
                Some(face) if face.is_boundary() => {}
                _ => return Err(MeshError::InvalidBoundaryTag { face: face_id }),
            }
        }

        Ok(Self {
            cells,
            faces,
            boundary_tags,
        })
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Indices of faces shared by two cells.
    pub fn interior_faces(&self) -> impl Iterator<Item = usize> + '_ {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.is_boundary())
            .map(|(i, _)| i)
    }

    /// Boundary faces carrying the given label.
    pub fn tagged_faces(&self, label: &str) -> Vec<usize> {
        let mut ids: Vec<usize> = self
            .boundary_tags
            .iter()
            .filter(|(_, l)| l.as_str() == label)
            .map(|(&id, _)| id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Axis-aligned extent of a cell, measured from its face centroids.
    /// Exact for hexahedral Cartesian cells.
    pub fn cell_extent(&self, cell: usize) -> [f64; 3] {
        let mut lo = [f64::INFINITY; 3];
        let mut hi = [f64::NEG_INFINITY; 3];
        for &f in &self.cells[cell].face_ids {
            let c = self.faces[f].centroid;
            for d in 0..3 {
                lo[d] = lo[d].min(c[d]);
                hi[d] = hi[d].max(c[d]);
            }
        }
        let mut extent = [0.0; 3];
        for d in 0..3 {
            extent[d] = if hi[d] > lo[d] { hi[d] - lo[d] } else { 0.0 };
        }
        extent
    }

    pub fn depth(&self, cell: usize) -> f64 {
        self.cells[cell].centroid[2]
    }

    pub fn total_volume(&self) -> f64 {
        self.cells.iter().map(|c| c.volume).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_cells() -> (Vec<Cell>, Vec<Face>) {
        let cells = vec![
            Cell {
                id: 0,
                volume: 1.0,
                centroid: [0.5, 0.5, 0.5],
                face_ids: vec![],
            },
            Cell {
                id: 1,
                volume: 1.0,
                centroid: [1.5, 0.5, 0.5],
                face_ids: vec![],
            },
        ];
        let faces = vec![
            Face {
                area: 1.0,
                normal: [1.0, 0.0, 0.0],
                neighbor_cell_ids: (0, Some(1)),
                centroid: [1.0, 0.5, 0.5],
            },
            Face {
                area: 1.0,
                normal: [-1.0, 0.0, 0.0],
                neighbor_cell_ids: (0, None),
                centroid: [0.0, 0.5, 0.5],
            },
        ];
        (cells, faces)
    }

    #[test]
    fn rebuilds_face_lists() {
        let (cells, faces) = two_cells();
        let mesh = Mesh::new(cells, faces, HashMap::new()).unwrap();
        assert_eq!(mesh.cells[0].face_ids, vec![0, 1]);
        assert_eq!(mesh.cells[1].face_ids, vec![0]);
        assert_eq!(mesh.interior_faces().count(), 1);
    }

    #[test]
    fn rejects_out_of_range_neighbor() {
        let (cells, mut faces) = two_cells();
        faces[0].neighbor_cell_ids = (0, Some(7));
        let err = Mesh::new(cells, faces, HashMap::new()).unwrap_err();
        assert!(matches!(err, MeshError::CellOutOfRange { cell: 7, .. }));
    }

    #[test]
    fn rejects_tag_on_interior_face() {
        let (cells, faces) = two_cells();
        let mut tags = HashMap::new();
        tags.insert(0, "left".to_string());
        assert!(Mesh::new(cells, faces, tags).is_err());
    }
}
