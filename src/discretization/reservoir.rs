use super::mesh::Mesh;
use super::tpfa::{compute_transmissibilities, Permeability};
use super::MeshError;
use crate::fluid::pvt::RockCompressibility;

/// Mesh plus static rock properties and the derived transmissibilities.
#[derive(Clone, Debug)]
pub struct Reservoir {
    pub mesh: Mesh,
    pub porosity: Vec<f64>,
    pub permeability: Vec<Permeability>,
    pub rock: RockCompressibility,
    /// Reference pore volume per cell.
    pub pore_volume: Vec<f64>,
    /// Per face; boundary faces hold the half transmissibility of their cell.
    pub transmissibility: Vec<f64>,
    pub multipliers: Vec<f64>,
}

impl Reservoir {
    pub fn new(
        mesh: Mesh,
        porosity: Vec<f64>,
        permeability: Vec<Permeability>,
    ) -> Result<Self, MeshError> {
        let n = mesh.num_cells();
        if porosity.len() != n {
            return Err(MeshError::PropertyLength {
                name: "porosity",
                expected: n,
                found: porosity.len(),
            });
        }
        if permeability.len() != n {
            return Err(MeshError::PropertyLength {
                name: "permeability",
                expected: n,
                found: permeability.len(),
            });
        }
        if let Some(cell) = porosity.iter().position(|&phi| !(phi > 0.0 && phi <= 1.0)) {
            return Err(MeshError::InvalidProperty {
                name: "porosity",
                cell,
            });
        }
        if let Some(cell) = permeability.iter().position(|k| !k.is_valid()) {
            return Err(MeshError::InvalidProperty {
                name: "permeability",
                cell,
            });
        }

        let pore_volume = mesh
            .cells
            .iter()
            .zip(&porosity)
            .map(|(c, phi)| c.volume * phi)
            .collect();
        let transmissibility = compute_transmissibilities(&mesh, &permeability);
        let multipliers = vec![1.0; mesh.num_faces()];
        Ok(Self {
            mesh,
            porosity,
            permeability,
            rock: RockCompressibility::default(),
            pore_volume,
            transmissibility,
            multipliers,
        })
    }

    pub fn uniform(mesh: Mesh, porosity: f64, permeability: Permeability) -> Result<Self, MeshError> {
        let n = mesh.num_cells();
        Self::new(mesh, vec![porosity; n], vec![permeability; n])
    }

    pub fn with_rock_compressibility(mut self, compressibility: f64, reference_pressure: f64) -> Self {
        self.rock = RockCompressibility {
            compressibility,
            reference_pressure,
        };
        self
    }

    /// Scale the transmissibility of selected faces, e.g. to model a sealing fault.
    pub fn set_transmissibility_multiplier(&mut self, face: usize, multiplier: f64) -> Result<(), MeshError> {
        if face >= self.mesh.num_faces() {
            return Err(MeshError::PropertyLength {
                name: "face multiplier index",
                expected: self.mesh.num_faces(),
                found: face + 1,
            });
        }
        if !(multiplier >= 0.0) || !multiplier.is_finite() {
            return Err(MeshError::InvalidProperty {
                name: "transmissibility multiplier",
                cell: self.mesh.faces[face].neighbor_cell_ids.0,
            });
        }
        self.multipliers[face] = multiplier;
        Ok(())
    }

    #[inline]
    pub fn face_transmissibility(&self, face: usize) -> f64 {
        self.transmissibility[face] * self.multipliers[face]
    }

    pub fn num_cells(&self) -> usize {
        self.mesh.num_cells()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::CartesianGrid;
    use approx::assert_relative_eq;

    #[test]
    fn pore_volume_and_multiplier() {
        let mesh = CartesianGrid::new([2, 1, 1], [2.0, 1.0, 1.0]).unwrap().mesh();
        let mut res = Reservoir::uniform(mesh, 0.25, Permeability::Isotropic(1.0)).unwrap();
        assert_relative_eq!(res.pore_volume.iter().sum::<f64>(), 0.5);
        let f = res.mesh.interior_faces().next().unwrap();
        let t = res.face_transmissibility(f);
        res.set_transmissibility_multiplier(f, 0.1).unwrap();
        assert_relative_eq!(res.face_transmissibility(f), 0.1 * t);
    }

    #[test]
    fn rejects_bad_porosity() {
        let mesh = CartesianGrid::new([2, 1, 1], [2.0, 1.0, 1.0]).unwrap().mesh();
        let err = Reservoir::new(mesh, vec![0.2, 0.0], vec![Permeability::Isotropic(1.0); 2]);
        assert!(matches!(err, Err(MeshError::InvalidProperty { cell: 1, .. })));
    }
}
