//! Peng-Robinson cubic equation of state.

use num_dual::DualNum;
use serde::{Deserialize, Serialize};

use crate::constants::GAS_CONSTANT;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    /// [Pa]
    pub critical_pressure: f64,
    /// [K]
    pub critical_temperature: f64,
    pub acentric_factor: f64,
    /// [kg/mol]
    pub molar_mass: f64,
}

impl Component {
    pub fn new(
        name: impl Into<String>,
        critical_pressure: f64,
        critical_temperature: f64,
        acentric_factor: f64,
        molar_mass: f64,
    ) -> Self {
        Self {
            name: name.into(),
            critical_pressure,
            critical_temperature,
            acentric_factor,
            molar_mass,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.critical_pressure > 0.0 && self.critical_temperature > 0.0 && self.molar_mass > 0.0
    }
}

/// Which root of the cubic a phase takes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Root {
    Liquid,
    Vapor,
}

#[derive(Clone, Debug)]
pub struct PengRobinson {
    pub components: Vec<Component>,
    /// Symmetric binary interaction coefficients.
    pub binary_interaction: Vec<Vec<f64>>,
}

const OMEGA_A: f64 = 0.457_235_529;
const OMEGA_B: f64 = 0.077_796_074;

impl PengRobinson {
    pub fn new(components: Vec<Component>) -> Self {
        let n = components.len();
        Self {
            components,
            binary_interaction: vec![vec![0.0; n]; n],
        }
    }

    pub fn with_binary_interaction(mut self, i: usize, j: usize, k: f64) -> Self {
        self.binary_interaction[i][j] = k;
        self.binary_interaction[j][i] = k;
        self
    }

    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    /// Pure component attraction and covolume at temperature `t`.
    fn pure_parameters(&self, i: usize, t: f64) -> (f64, f64) {
        let c = &self.components[i];
        let w = c.acentric_factor;
        let kappa = 0.37464 + 1.54226 * w - 0.26992 * w * w;
        let alpha = (1.0 + kappa * (1.0 - (t / c.critical_temperature).sqrt())).powi(2);
        let rtc = GAS_CONSTANT * c.critical_temperature;
        let a = OMEGA_A * rtc * rtc / c.critical_pressure * alpha;
        let b = OMEGA_B * rtc / c.critical_pressure;
        (a, b)
    }

    /// Dimensionless mixture parameters `A = a p / (RT)^2`, `B = b p / (RT)`
    /// from van der Waals mixing rules.
    pub fn mixture_parameters<T: DualNum<f64>>(&self, x: &[T], p: T, t: f64) -> (T, T) {
        let n = self.num_components();
        let pure: Vec<(f64, f64)> = (0..n).map(|i| self.pure_parameters(i, t)).collect();
        let mut a_mix = T::from(0.0);
        let mut b_mix = T::from(0.0);
        for i in 0..n {
            b_mix += x[i].clone() * pure[i].1;
            for j in 0..n {
                let a_ij = (pure[i].0 * pure[j].0).sqrt() * (1.0 - self.binary_interaction[i][j]);
                a_mix += x[i].clone() * x[j].clone() * a_ij;
            }
        }
        let rt = GAS_CONSTANT * t;
        let a = a_mix * p.clone() / (rt * rt);
        let b = b_mix * p / rt;
        (a, b)
    }

    /// Compressibility factor of the selected root.
    ///
    /// The root is located in `f64`; one Newton correction carried out in `T`
    /// attaches the derivatives of the implicit root.
    pub fn compressibility<T: DualNum<f64>>(&self, x: &[T], p: T, t: f64, root: Root) -> T {
        let (a, b) = self.mixture_parameters(x, p, t);
        let (c2, c1, c0) = cubic_coefficients(a.clone(), b.clone());
        let z0 = select_root(c2.re(), c1.re(), c0.re(), b.re(), root);

        let z = T::from(z0);
        let f = z.clone() * z.clone() * z.clone() + c2.clone() * z.clone() * z.clone() + c1.clone() * z.clone() + c0;
        let df = z.clone() * z.clone() * 3.0 + c2 * z.clone() * 2.0 + c1;
        if df.re().abs() < f64::EPSILON {
            return z;
        }
        z - f / T::from(df.re())
    }

    /// Molar density `p / (Z R T)` [mol/m^3].
    pub fn molar_density<T: DualNum<f64>>(&self, x: &[T], p: T, t: f64, root: Root) -> T {
        let z = self.compressibility(x, p.clone(), t, root);
        p / (z * (GAS_CONSTANT * t))
    }

    /// Molar mass of a mixture [kg/mol].
    pub fn molar_mass<T: DualNum<f64>>(&self, x: &[T]) -> T {
        x.iter()
            .zip(&self.components)
            .fold(T::from(0.0), |acc, (xi, c)| acc + xi.clone() * c.molar_mass)
    }
}

/// Coefficients of `Z^3 + c2 Z^2 + c1 Z + c0 = 0`.
fn cubic_coefficients<T: DualNum<f64>>(a: T, b: T) -> (T, T, T) {
    let c2 = b.clone() - 1.0;
    let c1 = a.clone() - b.clone() * b.clone() * 3.0 - b.clone() * 2.0;
    let c0 = -(a * b.clone() - b.clone() * b.clone() - b.clone() * b.clone() * b);
    (c2, c1, c0)
}

/// Real roots of a monic cubic, polished by Newton.
pub fn cubic_roots(c2: f64, c1: f64, c0: f64) -> Vec<f64> {
    let shift = c2 / 3.0;
    let p = c1 - c2 * c2 / 3.0;
    let q = 2.0 * c2.powi(3) / 27.0 - c2 * c1 / 3.0 + c0;
    let disc = (q / 2.0).powi(2) + (p / 3.0).powi(3);

    let mut roots = if disc > 0.0 || p >= 0.0 {
        let s = disc.max(0.0).sqrt();
        vec![(-q / 2.0 + s).cbrt() + (-q / 2.0 - s).cbrt() - shift]
    } else {
        let r = 2.0 * (-p / 3.0).sqrt();
        let arg = (3.0 * q / (2.0 * p) * (-3.0 / p).sqrt()).clamp(-1.0, 1.0);
        let phi = arg.acos() / 3.0;
        (0..3)
            .map(|k| r * (phi - 2.0 * std::f64::consts::PI * k as f64 / 3.0).cos() - shift)
            .collect()
    };

    for z in roots.iter_mut() {
        for _ in 0..3 {
            let f = ((*z + c2) * *z + c1) * *z + c0;
            let df = (3.0 * *z + 2.0 * c2) * *z + c1;
            if df.abs() < f64::EPSILON {
                break;
            }
            *z -= f / df;
        }
    }
    roots
}

fn select_root(c2: f64, c1: f64, c0: f64, b: f64, root: Root) -> f64 {
    let roots = cubic_roots(c2, c1, c0);
    let admissible = roots.iter().copied().filter(|&z| z > b);
    let chosen = match root {
        Root::Liquid => admissible.fold(f64::NAN, f64::min),
        Root::Vapor => admissible.fold(f64::NAN, f64::max),
    };
    if chosen.is_nan() {
        roots.into_iter().fold(b, f64::max)
    } else {
        chosen
    }
}
