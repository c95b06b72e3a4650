use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};

use super::mesh::{Cell, Face, Mesh};

/// Cell permeability [m^2].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Permeability {
    Isotropic(f64),
    /// Principal values along x, y and z.
    Diagonal([f64; 3]),
    /// Full symmetric tensor, row-major.
    Tensor([[f64; 3]; 3]),
}

impl Permeability {
    pub fn tensor(&self) -> DMat3 {
        match *self {
            Permeability::Isotropic(k) => DMat3::from_diagonal(DVec3::splat(k)),
            Permeability::Diagonal(k) => DMat3::from_diagonal(DVec3::from_array(k)),
            Permeability::Tensor(rows) => DMat3::from_cols_array_2d(&rows).transpose(),
        }
    }

    /// Diagonal of the tensor, used by the Peaceman well index.
    pub fn diagonal(&self) -> [f64; 3] {
        match *self {
            Permeability::Isotropic(k) => [k; 3],
            Permeability::Diagonal(k) => k,
            Permeability::Tensor(rows) => [rows[0][0], rows[1][1], rows[2][2]],
        }
    }

    /// Positive diagonal and a symmetric tensor.
    pub fn is_valid(&self) -> bool {
        let diag_ok = self.diagonal().iter().all(|&k| k > 0.0 && k.is_finite());
        match *self {
            Permeability::Tensor(rows) => {
                diag_ok
                    && (0..3).all(|i| {
                        (0..3).all(|j| {
                            let scale = rows[i][i].max(rows[j][j]);
                            (rows[i][j] - rows[j][i]).abs() <= 1e-12 * scale
                        })
                    })
            }
            _ => diag_ok,
        }
    }
}

/// One-sided transmissibility `A |c . K n| / |c|^2` with `c` the vector from
/// cell centroid to face centroid.
pub fn half_transmissibility(face: &Face, cell: &Cell, perm: &Permeability) -> f64 {
    let c = DVec3::from_array(face.centroid) - DVec3::from_array(cell.centroid);
    let dist2 = c.length_squared();
    if dist2 <= 0.0 {
        return 0.0;
    }
    let kn = perm.tensor() * DVec3::from_array(face.normal);
    face.area * c.dot(kn).abs() / dist2
}

#[inline]
pub fn harmonic_combination(t1: f64, t2: f64) -> f64 {
    if t1 <= 0.0 || t2 <= 0.0 {
        0.0
    } else {
        t1 * t2 / (t1 + t2)
    }
}

/// Transmissibility of every face. Interior faces get the harmonic
/// combination of both half transmissibilities, boundary faces keep the
/// half transmissibility of their only cell.
pub fn compute_transmissibilities(mesh: &Mesh, permeability: &[Permeability]) -> Vec<f64> {
    mesh.faces
        .iter()
        .map(|face| {
            let (left, right) = face.neighbor_cell_ids;
            let t_left = half_transmissibility(face, &mesh.cells[left], &permeability[left]);
            match right {
                Some(r) => harmonic_combination(
                    t_left,
                    half_transmissibility(face, &mesh.cells[r], &permeability[r]),
                ),
                None => t_left,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::CartesianGrid;
    use approx::assert_relative_eq;

    #[test]
    fn uniform_grid_gives_k_a_over_dx() {
        let grid = CartesianGrid::new([4, 1, 1], [40.0, 5.0, 2.0]).unwrap();
        let mesh = grid.mesh();
        let k = 1e-13;
        let trans = compute_transmissibilities(&mesh, &vec![Permeability::Isotropic(k); 4]);
        for f in mesh.interior_faces() {
            assert_relative_eq!(trans[f], k * 10.0 / 10.0, max_relative = 1e-12);
        }
        // half cell distance on the boundary
        for f in mesh.tagged_faces("xmin") {
            assert_relative_eq!(trans[f], k * 10.0 / 5.0, max_relative = 1e-12);
        }
    }

    #[test]
    fn heterogeneous_pair_is_harmonic() {
        let grid = CartesianGrid::new([2, 1, 1], [2.0, 1.0, 1.0]).unwrap();
        let mesh = grid.mesh();
        let perm = vec![Permeability::Isotropic(1.0), Permeability::Isotropic(3.0)];
        let trans = compute_transmissibilities(&mesh, &perm);
        let f = mesh.interior_faces().next().unwrap();
        // half transmissibilities 2 and 6
        assert_relative_eq!(trans[f], 12.0 / 8.0, max_relative = 1e-12);
    }

    #[test]
    fn diagonal_tensor_uses_normal_component() {
        let grid = CartesianGrid::new([1, 2, 1], [1.0, 2.0, 1.0]).unwrap();
        let mesh = grid.mesh();
        let perm = vec![Permeability::Diagonal([5.0, 2.0, 7.0]); 2];
        let trans = compute_transmissibilities(&mesh, &perm);
        let f = mesh.interior_faces().next().unwrap();
        assert_relative_eq!(trans[f], 2.0, max_relative = 1e-12);
    }

    #[test]
    fn asymmetric_tensor_is_invalid() {
        let k = Permeability::Tensor([[1.0, 0.5, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        assert!(!k.is_valid());
        assert!(Permeability::Diagonal([1.0, 1.0, 0.1]).is_valid());
        assert!(!Permeability::Isotropic(-1.0).is_valid());
    }
}
