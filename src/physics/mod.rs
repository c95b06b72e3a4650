pub mod bc;
pub mod kernels;
pub mod sparse;

use num_dual::DualNum;

use crate::constants::BAR;
use crate::fluid::Phase;
use bc::Field;

/// Properties of one phase at a node.
#[derive(Clone, Debug)]
pub struct PhaseProperties<T> {
    pub saturation: T,
    /// Density in the units of the conserved quantity (kg/m^3 or mol/m^3).
    pub density: T,
    /// Mass density [kg/m^3], drives the gravity head.
    pub mass_density: T,
    pub mobility: T,
    pub viscosity: T,
    /// Fraction of each component in the phase.
    pub fractions: Vec<T>,
}

/// Everything the kernels need to know about a node.
#[derive(Clone, Debug)]
pub struct PhaseState<T> {
    pub pressure: T,
    pub phases: Vec<PhaseProperties<T>>,
}

impl<T: DualNum<f64>> PhaseState<T> {
    pub fn num_components(&self) -> usize {
        self.phases.first().map_or(0, |ph| ph.fractions.len())
    }

    pub fn total_mobility(&self) -> T {
        self.phases
            .iter()
            .fold(T::from(0.0), |acc, ph| acc + ph.mobility.clone())
    }

    /// Amount of each component per unit pore volume: `sum_a S_a rho_a X_ca`.
    pub fn concentrations(&self) -> Vec<T> {
        let mut c = vec![T::from(0.0); self.num_components()];
        for ph in &self.phases {
            let s_rho = ph.saturation.clone() * ph.density.clone();
            for (ci, x) in c.iter_mut().zip(&ph.fractions) {
                *ci += s_rho.clone() * x.clone();
            }
        }
        c
    }

    /// Amount of each component per unit volume of flowing fluid, weighting
    /// phases by fractional flow.
    pub fn mobility_weighted_concentrations(&self) -> Vec<T> {
        let lt = self.total_mobility();
        let mut c = vec![T::from(0.0); self.num_components()];
        if lt.re() <= 0.0 {
            return self.concentrations();
        }
        for ph in &self.phases {
            let w = ph.mobility.clone() * ph.density.clone() / lt.clone();
            for (ci, x) in c.iter_mut().zip(&ph.fractions) {
                *ci += w.clone() * x.clone();
            }
        }
        c
    }

    /// Saturation-weighted mass density [kg/m^3].
    pub fn mixture_mass_density(&self) -> T {
        self.phases.iter().fold(T::from(0.0), |acc, ph| {
            acc + ph.saturation.clone() * ph.mass_density.clone()
        })
    }

    pub fn mixture_viscosity(&self) -> T {
        self.phases.iter().fold(T::from(0.0), |acc, ph| {
            acc + ph.saturation.clone() * ph.viscosity.clone()
        })
    }

    /// `sum_a S_a rho_a`, used to scale residuals.
    pub fn total_density(&self) -> T {
        self.phases.iter().fold(T::from(0.0), |acc, ph| {
            acc + ph.saturation.clone() * ph.density.clone()
        })
    }
}

/// Limits applied to a Newton update, node by node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UpdateLimits {
    /// Largest pressure change relative to the current pressure.
    pub max_dp_rel: f64,
    /// Largest change of a saturation or mole fraction.
    pub max_ds: f64,
}

/// A fluid system with `m` conserved components and the node layout
/// `[p, f_0, .., f_{m-2}]`, where `f` are the fractions (saturations or
/// overall mole fractions) and the last fraction is implied.
pub trait FlowSystem {
    fn num_components(&self) -> usize;

    fn phases(&self) -> &[Phase];

    fn num_phases(&self) -> usize {
        self.phases().len()
    }

    fn component_names(&self) -> Vec<String>;

    /// Name of the fraction variable, e.g. `Saturation`.
    fn fraction_field(&self) -> &'static str;

    /// Labels of the fractions, one per component.
    fn fraction_labels(&self) -> Vec<String>;

    fn primary_variables(&self) -> Vec<Field> {
        let mut fields = vec![Field::from("Pressure")];
        let labels = self.fraction_labels();
        let m = self.num_components();
        fields.extend(
            labels
                .iter()
                .take(m.saturating_sub(1))
                .map(|l| Field::from(format!("{}:{}", self.fraction_field(), l))),
        );
        fields
    }

    fn phase_state<T: DualNum<f64>>(&self, u: &[T]) -> PhaseState<T>;

    /// Surface measure (surface volume or moles) of the given component amounts.
    fn surface_volume<T: DualNum<f64>>(&self, amounts: &[T]) -> T;

    /// Fraction of the surface measure falling in each phase after separation.
    fn surface_phase_fractions<T: DualNum<f64>>(&self, amounts: &[T]) -> Vec<T>;

    /// Component amounts carried by one unit of surface measure of an
    /// injected fluid with the given surface composition.
    fn injection_stream(&self, composition: &[f64]) -> Vec<f64>;

    fn primary_from(&self, pressure: f64, fractions: &[f64]) -> Vec<f64> {
        let m = self.num_components();
        let mut u = Vec::with_capacity(m);
        u.push(pressure);
        u.extend_from_slice(&fractions[..m - 1]);
        u
    }

    /// All fractions of a node, including the implied last one.
    fn fractions(&self, u: &[f64]) -> Vec<f64> {
        let m = self.num_components();
        let mut f: Vec<f64> = u[1..m].to_vec();
        f.push(1.0 - f.iter().sum::<f64>());
        f
    }

    fn validate_fractions(&self, fractions: &[f64]) -> bool {
        fractions.len() == self.num_components()
            && fractions.iter().all(|f| (0.0..=1.0).contains(f))
            && (fractions.iter().sum::<f64>() - 1.0).abs() < 1e-8
    }

    /// Apply a Newton increment to one node: relative pressure chop, uniform
    /// scaling of the fraction change, clamping to the admissible set.
    fn apply_update(&self, u: &mut [f64], du: &[f64], limits: &UpdateLimits) {
        let m = self.num_components();
        let max_dp = limits.max_dp_rel * u[0].abs().max(BAR);
        u[0] += du[0].clamp(-max_dp, max_dp);

        if m > 1 {
            let implied: f64 = -du[1..m].iter().sum::<f64>();
            let largest = du[1..m].iter().fold(implied.abs(), |acc, d| acc.max(d.abs()));
            let w = if largest > limits.max_ds {
                limits.max_ds / largest
            } else {
                1.0
            };
            for j in 1..m {
                u[j] = (u[j] + w * du[j]).clamp(0.0, 1.0);
            }
            let sum: f64 = u[1..m].iter().sum();
            if sum > 1.0 {
                for v in u[1..m].iter_mut() {
                    *v /= sum;
                }
            }
        }
    }

    /// Extra per-node values exported with the state, beyond pressure and fractions.
    fn additional_outputs(&self, _u: &[f64]) -> Vec<(String, f64)> {
        Vec::new()
    }
}
