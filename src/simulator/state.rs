use std::collections::BTreeMap;

use nalgebra::DVector;

use super::model::ReservoirModel;
use crate::constants::GRAVITY;
use crate::models::ModelError;
use crate::physics::FlowSystem;

/// Primary unknowns of the model: per node pressure and fractions, then one
/// surface rate per well.
#[derive(Clone, Debug, PartialEq)]
pub struct State {
    pub(crate) primary: DVector<f64>,
    block_size: usize,
    num_cells: usize,
    num_nodes: usize,
}

impl State {
    /// Same pressure and fractions everywhere.
    pub fn uniform<S: FlowSystem>(model: &ReservoirModel<S>, pressure: f64, fractions: &[f64]) -> Result<Self, ModelError> {
        let n = model.num_cells();
        Self::from_cell_values(model, &vec![pressure; n], &vec![fractions.to_vec(); n])
    }

    /// Pressure in hydrostatic equilibrium with the fluid of the given
    /// fractions, anchored at `datum_pressure` at `datum_depth`.
    pub fn hydrostatic<S: FlowSystem>(
        model: &ReservoirModel<S>,
        datum_depth: f64,
        datum_pressure: f64,
        fractions: &[f64],
    ) -> Result<Self, ModelError> {
        check_fractions(model, fractions)?;
        let system = &model.system;
        let mesh = &model.reservoir.mesh;
        let density = |p: f64| {
            system
                .phase_state(&system.primary_from(p, fractions))
                .mixture_mass_density()
        };
        let pressure: Vec<f64> = (0..model.num_cells())
            .map(|c| {
                let dz = mesh.depth(c) - datum_depth;
                // fixed point on the mean density between datum and cell
                let mut p = datum_pressure;
                for _ in 0..20 {
                    let rho = 0.5 * (density(datum_pressure) + density(p));
                    p = datum_pressure + rho * GRAVITY * dz;
                }
                p
            })
            .collect();
        Self::from_cell_values(model, &pressure, &vec![fractions.to_vec(); model.num_cells()])
    }

    /// Build from per-cell pressures and fractions. Well nodes start from
    /// the cell they are perforated in, well rates from zero.
    pub fn from_cell_values<S: FlowSystem>(
        model: &ReservoirModel<S>,
        pressure: &[f64],
        fractions: &[Vec<f64>],
    ) -> Result<Self, ModelError> {
        let nc = model.num_cells();
        if pressure.len() != nc {
            return Err(ModelError::StateSize {
                what: "pressure values",
                expected: nc,
                found: pressure.len(),
            });
        }
        if fractions.len() != nc {
            return Err(ModelError::StateSize {
                what: "fraction rows",
                expected: nc,
                found: fractions.len(),
            });
        }
        if let Some(c) = pressure.iter().position(|p| !(*p > 0.0) || !p.is_finite()) {
            return Err(ModelError::InvalidState(format!(
                "pressure {} in cell {c} must be positive",
                pressure[c]
            )));
        }
        for f in fractions {
            check_fractions(model, f)?;
        }

        let system = &model.system;
        let m = model.block_size();
        let mut primary = Vec::with_capacity(model.num_unknowns());
        for c in 0..nc {
            primary.extend(system.primary_from(pressure[c], &fractions[c]));
        }
        for well in &model.wells {
            for node in 0..well.num_nodes() {
                // the top node takes the first perforation
                let cell = well
                    .perforations
                    .iter()
                    .find(|p| p.node == node)
                    .or(well.perforations.first())
                    .map_or(0, |p| p.cell);
                primary.extend_from_within(cell * m..(cell + 1) * m);
            }
        }
        primary.extend(std::iter::repeat(0.0).take(model.wells.len()));

        Ok(Self {
            primary: DVector::from_vec(primary),
            block_size: m,
            num_cells: nc,
            num_nodes: model.num_nodes(),
        })
    }

    /// Wrap a primary vector, checking its length against the model.
    pub fn from_primary<S: FlowSystem>(model: &ReservoirModel<S>, primary: DVector<f64>) -> Result<Self, ModelError> {
        if primary.len() != model.num_unknowns() {
            return Err(ModelError::StateSize {
                what: "unknowns",
                expected: model.num_unknowns(),
                found: primary.len(),
            });
        }
        Ok(Self {
            primary,
            block_size: model.block_size(),
            num_cells: model.num_cells(),
            num_nodes: model.num_nodes(),
        })
    }

    pub fn primary(&self) -> &DVector<f64> {
        &self.primary
    }

    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    pub fn node(&self, node: usize) -> &[f64] {
        let m = self.block_size;
        &self.primary.as_slice()[node * m..(node + 1) * m]
    }

    /// Cell pressures.
    pub fn pressure(&self) -> Vec<f64> {
        (0..self.num_cells).map(|c| self.node(c)[0]).collect()
    }

    /// Surface rate unknown of a well.
    pub fn well_rate(&self, well: usize) -> f64 {
        self.primary[self.num_nodes * self.block_size + well]
    }

    /// Check that this state belongs to `model`.
    pub fn check<S: FlowSystem>(&self, model: &ReservoirModel<S>) -> Result<(), ModelError> {
        if self.primary.len() != model.num_unknowns() || self.block_size != model.block_size() {
            return Err(ModelError::StateSize {
                what: "unknowns",
                expected: model.num_unknowns(),
                found: self.primary.len(),
            });
        }
        Ok(())
    }

    /// Named per-cell fields: `Pressure`, the fractions (e.g.
    /// `Saturation:Aqueous`), component masses and system specific outputs.
    pub fn fields<S: FlowSystem>(&self, model: &ReservoirModel<S>) -> BTreeMap<String, Vec<f64>> {
        let system = &model.system;
        let names = system.component_names();
        let labels = system.fraction_labels();
        let nc = self.num_cells;
        let mut out: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        out.insert("Pressure".to_string(), self.pressure());

        for c in 0..nc {
            let u = self.node(c);
            for (label, f) in labels.iter().zip(system.fractions(u)) {
                push(&mut out, format!("{}:{}", system.fraction_field(), label), f, nc);
            }
            let state = system.phase_state(u);
            let pv = model.reservoir.rock.pore_volume(model.reservoir.pore_volume[c], u[0]);
            for (name, amount) in names.iter().zip(state.concentrations()) {
                push(&mut out, format!("ComponentMass:{name}"), amount * pv, nc);
            }
            for (key, v) in system.additional_outputs(u) {
                push(&mut out, key, v, nc);
            }
        }
        out
    }
}

fn push(out: &mut BTreeMap<String, Vec<f64>>, key: String, value: f64, capacity: usize) {
    out.entry(key)
        .or_insert_with(|| Vec::with_capacity(capacity))
        .push(value);
}

fn check_fractions<S: FlowSystem>(model: &ReservoirModel<S>, fractions: &[f64]) -> Result<(), ModelError> {
    if model.system.validate_fractions(fractions) {
        Ok(())
    } else {
        Err(ModelError::InvalidState(format!(
            "fractions {fractions:?} must be {} values in [0, 1] summing to one",
            model.system.num_components()
        )))
    }
}
