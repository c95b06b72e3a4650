use num_dual::DualNum;

use super::ModelError;
use crate::fluid::pvt::PhasePvt;
use crate::fluid::relperm::CoreyRelPerm;
use crate::fluid::Phase;
use crate::physics::{FlowSystem, PhaseProperties, PhaseState};

/// One to three immiscible phases, one component per phase.
///
/// Node unknowns are pressure and the saturations of all phases but the last.
#[derive(Clone, Debug)]
pub struct ImmiscibleSystem {
    phases: Vec<Phase>,
    pvt: Vec<PhasePvt>,
    relperm: Vec<CoreyRelPerm>,
    total_residual: f64,
}

impl ImmiscibleSystem {
    pub fn new(phases: Vec<Phase>, pvt: Vec<PhasePvt>, relperm: Vec<CoreyRelPerm>) -> Result<Self, ModelError> {
        let n = phases.len();
        if !(1..=3).contains(&n) {
            return Err(ModelError::InvalidFluid(format!(
                "expected 1 to 3 phases, got {n}"
            )));
        }
        if pvt.len() != n || relperm.len() != n {
            return Err(ModelError::InvalidFluid(format!(
                "{n} phases but {} PVT and {} relative permeability entries",
                pvt.len(),
                relperm.len()
            )));
        }
        for (i, ph) in phases.iter().enumerate() {
            if phases[..i].contains(ph) {
                return Err(ModelError::InvalidFluid(format!("phase {ph} listed twice")));
            }
        }
        if let Some(p) = pvt
            .iter()
            .find(|p| !p.density.is_valid() || !(p.viscosity > 0.0) || !(p.surface_density > 0.0))
        {
            return Err(ModelError::InvalidFluid(format!("invalid PVT {p:?}")));
        }
        if let Some(kr) = relperm.iter().find(|kr| !kr.is_valid()) {
            return Err(ModelError::InvalidFluid(format!(
                "invalid relative permeability {kr:?}"
            )));
        }
        let total_residual: f64 = relperm.iter().map(|kr| kr.residual).sum();
        if total_residual >= 1.0 {
            return Err(ModelError::InvalidFluid(
                "residual saturations sum to one or more".to_string(),
            ));
        }
        Ok(Self {
            phases,
            pvt,
            relperm,
            total_residual,
        })
    }

    pub fn single_phase(phase: Phase, pvt: PhasePvt) -> Result<Self, ModelError> {
        Self::new(vec![phase], vec![pvt], vec![CoreyRelPerm::linear()])
    }

    pub fn pvt(&self) -> &[PhasePvt] {
        &self.pvt
    }
}

impl FlowSystem for ImmiscibleSystem {
    fn num_components(&self) -> usize {
        self.phases.len()
    }

    fn phases(&self) -> &[Phase] {
        &self.phases
    }

    fn component_names(&self) -> Vec<String> {
        self.phases.iter().map(|p| p.name().to_string()).collect()
    }

    fn fraction_field(&self) -> &'static str {
        "Saturation"
    }

    fn fraction_labels(&self) -> Vec<String> {
        self.component_names()
    }

    fn phase_state<T: DualNum<f64>>(&self, u: &[T]) -> PhaseState<T> {
        let n = self.phases.len();
        let p = u[0].clone();
        let mut saturations: Vec<T> = u[1..n].to_vec();
        let last = saturations
            .iter()
            .fold(T::from(1.0), |acc, s| acc - s.clone());
        saturations.push(last);

        let phases = saturations
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                let rho = self.pvt[i].density.density(p.clone());
                let kr = self.relperm[i].evaluate(s.clone(), self.total_residual);
                let mu = self.pvt[i].viscosity;
                let mut fractions = vec![T::from(0.0); n];
                fractions[i] = T::from(1.0);
                PhaseProperties {
                    saturation: s,
                    density: rho.clone(),
                    mass_density: rho,
                    mobility: kr / mu,
                    viscosity: T::from(mu),
                    fractions,
                }
            })
            .collect();
        PhaseState { pressure: p, phases }
    }

    fn surface_volume<T: DualNum<f64>>(&self, amounts: &[T]) -> T {
        amounts
            .iter()
            .zip(&self.pvt)
            .fold(T::from(0.0), |acc, (m, pvt)| acc + m.clone() / pvt.surface_density)
    }

    fn surface_phase_fractions<T: DualNum<f64>>(&self, amounts: &[T]) -> Vec<T> {
        let total = self.surface_volume(amounts);
        amounts
            .iter()
            .zip(&self.pvt)
            .map(|(m, pvt)| {
                if total.re() > 0.0 {
                    m.clone() / pvt.surface_density / total.clone()
                } else {
                    T::from(0.0)
                }
            })
            .collect()
    }

    fn injection_stream(&self, composition: &[f64]) -> Vec<f64> {
        composition
            .iter()
            .zip(&self.pvt)
            .map(|(c, pvt)| c * pvt.surface_density)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::pvt::DensityModel;
    use approx::assert_relative_eq;

    fn water_oil() -> ImmiscibleSystem {
        ImmiscibleSystem::new(
            vec![Phase::Aqueous, Phase::Liquid],
            vec![
                PhasePvt::new(DensityModel::Constant(1000.0), 1e-3),
                PhasePvt::new(DensityModel::Constant(800.0), 5e-3),
            ],
            vec![CoreyRelPerm::new(2.0, 0.2, 1.0), CoreyRelPerm::new(2.0, 0.2, 1.0)],
        )
        .unwrap()
    }

    #[test]
    fn mobilities_follow_corey() {
        let sys = water_oil();
        let st = sys.phase_state(&[1e7, 0.5]);
        // normalized saturation (0.5 - 0.2) / 0.6 = 0.5 for both phases
        assert_relative_eq!(st.phases[0].mobility, 0.25 / 1e-3);
        assert_relative_eq!(st.phases[1].mobility, 0.25 / 5e-3);
    }

    #[test]
    fn surface_conversion_round_trip() {
        let sys = water_oil();
        let stream = sys.injection_stream(&[1.0, 0.0]);
        assert_relative_eq!(sys.surface_volume(&stream), 1.0);
        let f = sys.surface_phase_fractions(&[500.0, 400.0]);
        assert_relative_eq!(f[0], 0.5);
        assert_relative_eq!(f[1], 0.5);
    }

    #[test]
    fn rejects_inconsistent_input() {
        let err = ImmiscibleSystem::new(
            vec![Phase::Aqueous, Phase::Aqueous],
            vec![PhasePvt::new(DensityModel::Constant(1000.0), 1e-3); 2],
            vec![CoreyRelPerm::default(); 2],
        );
        assert!(matches!(err, Err(ModelError::InvalidFluid(_))));
    }
}
