use num_dual::DualNum;

use super::ModelError;
use crate::constants::{STANDARD_PRESSURE, STANDARD_TEMPERATURE};
use crate::fluid::eos::{PengRobinson, Root};
use crate::fluid::flash::{flash, KValueModel};
use crate::fluid::relperm::CoreyRelPerm;
use crate::fluid::Phase;
use crate::physics::{FlowSystem, PhaseProperties, PhaseState};

const PHASES: [Phase; 2] = [Phase::Liquid, Phase::Vapor];

/// Isothermal two-phase (liquid/vapor) compositional system.
///
/// Node unknowns are pressure and the overall mole fractions of all
/// components but the last. Conserved quantities are moles; the surface
/// measure of a fluid is its total number of moles.
#[derive(Clone, Debug)]
pub struct CompositionalSystem {
    eos: PengRobinson,
    k_values: KValueModel,
    temperature: f64,
    /// Liquid and vapor viscosity [Pa s].
    viscosity: [f64; 2],
    relperm: [CoreyRelPerm; 2],
}

impl CompositionalSystem {
    pub fn new(
        eos: PengRobinson,
        k_values: KValueModel,
        temperature: f64,
        viscosity: [f64; 2],
        relperm: [CoreyRelPerm; 2],
    ) -> Result<Self, ModelError> {
        let nc = eos.num_components();
        if nc < 2 {
            return Err(ModelError::InvalidFluid(
                "compositional system needs at least two components".to_string(),
            ));
        }
        if let Some(c) = eos.components.iter().find(|c| !c.is_valid()) {
            return Err(ModelError::InvalidFluid(format!("invalid component {}", c.name)));
        }
        if let KValueModel::Constant(k) = &k_values {
            if k.len() != nc || k.iter().any(|&v| !(v > 0.0)) {
                return Err(ModelError::InvalidFluid(format!(
                    "need {nc} positive K-values, got {k:?}"
                )));
            }
        }
        if !(temperature > 0.0) || viscosity.iter().any(|&mu| !(mu > 0.0)) {
            return Err(ModelError::InvalidFluid(
                "temperature and viscosities must be positive".to_string(),
            ));
        }
        if relperm.iter().any(|kr| !kr.is_valid()) {
            return Err(ModelError::InvalidFluid("invalid relative permeability".to_string()));
        }
        Ok(Self {
            eos,
            k_values,
            temperature,
            viscosity,
            relperm,
        })
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn eos(&self) -> &PengRobinson {
        &self.eos
    }

    fn overall_composition<T: DualNum<f64>>(&self, u: &[T]) -> Vec<T> {
        let nc = self.eos.num_components();
        let mut z: Vec<T> = u[1..nc].to_vec();
        let last = z.iter().fold(T::from(1.0), |acc, v| acc - v.clone());
        z.push(last);
        z
    }
}

impl FlowSystem for CompositionalSystem {
    fn num_components(&self) -> usize {
        self.eos.num_components()
    }

    fn phases(&self) -> &[Phase] {
        &PHASES
    }

    fn component_names(&self) -> Vec<String> {
        self.eos.components.iter().map(|c| c.name.clone()).collect()
    }

    fn fraction_field(&self) -> &'static str {
        "OverallMoleFraction"
    }

    fn fraction_labels(&self) -> Vec<String> {
        self.component_names()
    }

    fn phase_state<T: DualNum<f64>>(&self, u: &[T]) -> PhaseState<T> {
        let p = u[0].clone();
        let z = self.overall_composition(u);
        let k = self
            .k_values
            .k_values(&self.eos.components, p.clone(), self.temperature);
        let split = flash(&z, &k);

        let xi_l = self
            .eos
            .molar_density(&split.liquid, p.clone(), self.temperature, Root::Liquid);
        let xi_v = self
            .eos
            .molar_density(&split.vapor, p.clone(), self.temperature, Root::Vapor);

        let v = split.vapor_fraction;
        let vol_v = v.clone() / xi_v.clone();
        let vol_l = (-v + 1.0) / xi_l.clone();
        let s_v = vol_v.clone() / (vol_v + vol_l);
        let s_l = -s_v.clone() + 1.0;

        let total_residual = self.relperm[0].residual + self.relperm[1].residual;
        let make = |s: T, xi: T, x: Vec<T>, i: usize| {
            let mass_density = xi.clone() * self.eos.molar_mass(&x);
            let kr = self.relperm[i].evaluate(s.clone(), total_residual);
            PhaseProperties {
                saturation: s,
                density: xi,
                mass_density,
                mobility: kr / self.viscosity[i],
                viscosity: T::from(self.viscosity[i]),
                fractions: x,
            }
        };
        let liquid = make(s_l, xi_l, split.liquid, 0);
        let vapor = make(s_v, xi_v, split.vapor, 1);
        PhaseState {
            pressure: p,
            phases: vec![liquid, vapor],
        }
    }

    fn surface_volume<T: DualNum<f64>>(&self, amounts: &[T]) -> T {
        amounts.iter().fold(T::from(0.0), |acc, n| acc + n.clone())
    }

    /// Molar split of a separator flash at standard conditions.
    fn surface_phase_fractions<T: DualNum<f64>>(&self, amounts: &[T]) -> Vec<T> {
        let total = self.surface_volume(amounts);
        if total.re() <= 0.0 {
            return vec![T::from(0.0); 2];
        }
        let z: Vec<T> = amounts.iter().map(|n| n.clone() / total.clone()).collect();
        let k = self.k_values.k_values(
            &self.eos.components,
            T::from(STANDARD_PRESSURE),
            STANDARD_TEMPERATURE,
        );
        let v = flash(&z, &k).vapor_fraction;
        vec![-v.clone() + 1.0, v]
    }

    fn injection_stream(&self, composition: &[f64]) -> Vec<f64> {
        let total: f64 = composition.iter().sum();
        composition.iter().map(|c| c / total).collect()
    }

    fn additional_outputs(&self, u: &[f64]) -> Vec<(String, f64)> {
        let state = self.phase_state(u);
        let mut out = Vec::new();
        for (phase, props) in PHASES.iter().zip(&state.phases) {
            for (name, x) in self.component_names().iter().zip(&props.fractions) {
                out.push((format!("MoleFraction:{phase}:{name}"), *x));
            }
        }
        out
    }
}
