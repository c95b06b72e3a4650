use std::collections::BTreeMap;

use super::model::ReservoirModel;
use crate::models::ModelError;
use crate::physics::bc::{BoundaryRegistry, FlowBoundaryCondition, SourceTerm};
use crate::physics::FlowSystem;
use crate::wells::control::{WellControl, WellDrive};

/// Drive of one report step. Wells without a control are shut.
#[derive(Clone, Debug, Default)]
pub struct Forces {
    pub controls: BTreeMap<String, WellControl>,
    pub sources: Vec<SourceTerm>,
    pub boundaries: BoundaryRegistry,
}

impl Forces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_control(mut self, well: impl Into<String>, control: WellControl) -> Self {
        self.controls.insert(well.into(), control);
        self
    }

    pub fn with_source(mut self, source: SourceTerm) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_boundary(mut self, condition: FlowBoundaryCondition) -> Self {
        self.boundaries.add(condition);
        self
    }

    pub fn validate<S: FlowSystem>(&self, model: &ReservoirModel<S>) -> Result<(), ModelError> {
        let system = &model.system;
        let nc = system.num_components();
        for (name, control) in &self.controls {
            if model.well_index(name).is_none() {
                return Err(ModelError::UnknownWell(name.clone()));
            }
            control.validate(name, nc, system.num_phases())?;
        }

        for src in &self.sources {
            if src.cell >= model.num_cells() {
                return Err(ModelError::InvalidForces(format!(
                    "source in cell {} outside the mesh",
                    src.cell
                )));
            }
            if !src.rate.is_finite() {
                return Err(ModelError::InvalidForces(format!("source rate {} is not finite", src.rate)));
            }
            if let Some(f) = &src.fractions {
                if f.len() != nc || f.iter().any(|&v| v < 0.0) || !(f.iter().sum::<f64>() > 0.0) {
                    return Err(ModelError::InvalidForces(format!("invalid source composition {f:?}")));
                }
            }
        }

        for rule in self.boundaries.rules() {
            if !(rule.pressure > 0.0) {
                return Err(ModelError::InvalidForces(format!(
                    "boundary pressure {} must be positive",
                    rule.pressure
                )));
            }
            if !(rule.trans_multiplier >= 0.0) {
                return Err(ModelError::InvalidForces(format!(
                    "boundary multiplier {} must be non-negative",
                    rule.trans_multiplier
                )));
            }
            if let Some(f) = &rule.fractions {
                if !system.validate_fractions(f) {
                    return Err(ModelError::InvalidForces(format!("invalid boundary fractions {f:?}")));
                }
            }
        }
        Ok(())
    }

    /// Drives of all model wells at the user controls.
    pub fn well_drives<S: FlowSystem>(&self, model: &ReservoirModel<S>) -> Vec<WellDrive> {
        model
            .wells
            .iter()
            .map(|w| {
                let control = self.controls.get(&w.name).cloned().unwrap_or(WellControl::Disabled);
                WellDrive::new(&model.system, control)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::CartesianGrid;
    use crate::discretization::reservoir::Reservoir;
    use crate::discretization::tpfa::Permeability;
    use crate::fluid::pvt::{DensityModel, PhasePvt};
    use crate::fluid::Phase;
    use crate::models::immiscible::ImmiscibleSystem;
    use crate::physics::bc::BoundarySelector;
    use crate::simulator::model::setup_reservoir_model;
    use crate::wells::control::WellTarget;
    use crate::wells::{setup_well, WellSetup};

    fn model() -> ReservoirModel<ImmiscibleSystem> {
        let grid = CartesianGrid::new([3, 1, 1], [30.0, 10.0, 10.0]).unwrap();
        let res = Reservoir::uniform(grid.mesh(), 0.2, Permeability::Isotropic(1e-13)).unwrap();
        let sys =
            ImmiscibleSystem::single_phase(Phase::Aqueous, PhasePvt::new(DensityModel::Constant(1000.0), 1e-3)).unwrap();
        let well = setup_well(&res, &[2], WellSetup::new("P")).unwrap();
        setup_reservoir_model(res, sys, vec![well]).unwrap()
    }

    #[test]
    fn unknown_well_is_rejected() {
        let model = model();
        let forces = Forces::new().with_control("Q", WellControl::producer(WellTarget::Bhp(1e7)));
        let err = forces.validate(&model).unwrap_err();
        assert!(matches!(err, ModelError::UnknownWell(name) if name == "Q"));
    }

    #[test]
    fn missing_controls_shut_the_well() {
        let model = model();
        let forces = Forces::new().with_source(SourceTerm::new(0, 1e-3).with_fractions(vec![1.0]));
        forces.validate(&model).unwrap();
        let drives = forces.well_drives(&model);
        assert_eq!(drives.len(), 1);
        assert_eq!(drives[0].control, WellControl::Disabled);
        assert_eq!(drives[0].active, None);
    }

    #[test]
    fn invalid_boundary_fractions() {
        let model = model();
        let forces = Forces::new()
            .with_boundary(FlowBoundaryCondition::pressure(BoundarySelector::label("xmin"), 1e7).with_fractions(vec![0.5]));
        assert!(forces.validate(&model).is_err());
        let bad_cell = Forces::new().with_source(SourceTerm::new(7, 1.0));
        assert!(bad_cell.validate(&model).is_err());
    }
}
