//! Two-phase (liquid/vapor) flash on K-values.

use num_dual::DualNum;
use serde::{Deserialize, Serialize};

use super::eos::Component;

/// Source of equilibrium ratios `K_i = y_i / x_i`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum KValueModel {
    /// `K = pc / p * exp(5.373 (1 + w) (1 - Tc / T))`
    Wilson,
    Constant(Vec<f64>),
}

impl KValueModel {
    pub fn k_values<T: DualNum<f64>>(&self, components: &[Component], p: T, temperature: f64) -> Vec<T> {
        match self {
            KValueModel::Wilson => components
                .iter()
                .map(|c| {
                    let e = (5.373 * (1.0 + c.acentric_factor) * (1.0 - c.critical_temperature / temperature)).exp();
                    p.clone().recip() * (c.critical_pressure * e)
                })
                .collect(),
            KValueModel::Constant(k) => k.iter().map(|&v| T::from(v)).collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseRegime {
    Liquid,
    Vapor,
    TwoPhase,
}

#[derive(Clone, Debug)]
pub struct FlashResult<T> {
    pub regime: PhaseRegime,
    /// Molar vapor fraction `V`.
    pub vapor_fraction: T,
    pub liquid: Vec<T>,
    pub vapor: Vec<T>,
}

/// Rachford-Rice function `g(V) = sum z_i (K_i - 1) / (1 + V (K_i - 1))` and
/// its derivative.
fn rachford_rice(z: &[f64], k: &[f64], v: f64) -> (f64, f64) {
    z.iter().zip(k).fold((0.0, 0.0), |(g, dg), (&zi, &ki)| {
        let d = 1.0 + v * (ki - 1.0);
        (g + zi * (ki - 1.0) / d, dg - zi * (ki - 1.0).powi(2) / (d * d))
    })
}

/// Vapor fraction in `[0, 1]` solving Rachford-Rice, or the single-phase
/// regime when the root lies outside.
pub fn solve_vapor_fraction(z: &[f64], k: &[f64]) -> (PhaseRegime, f64) {
    let (g0, _) = rachford_rice(z, k, 0.0);
    if g0 <= 0.0 {
        return (PhaseRegime::Liquid, 0.0);
    }
    let (g1, _) = rachford_rice(z, k, 1.0);
    if g1 >= 0.0 {
        return (PhaseRegime::Vapor, 1.0);
    }

    // g decreases monotonically on [0, 1]; safeguarded Newton.
    let (mut lo, mut hi) = (0.0, 1.0);
    let mut v = 0.5;
    for _ in 0..100 {
        let (g, dg) = rachford_rice(z, k, v);
        if g.abs() < 1e-14 {
            break;
        }
        if g > 0.0 {
            lo = v;
        } else {
            hi = v;
        }
        let newton = v - g / dg;
        v = if dg < 0.0 && newton > lo && newton < hi {
            newton
        } else {
            0.5 * (lo + hi)
        };
        if hi - lo < 1e-15 {
            break;
        }
    }
    (PhaseRegime::TwoPhase, v)
}

/// Flash overall composition `z` with equilibrium ratios `k`.
///
/// The vapor fraction is found in `f64` and corrected by one Newton step in
/// `T` so the result carries derivatives of the implicit solution. In a
/// single-phase regime the absent phase gets the normalized trial composition.
pub fn flash<T: DualNum<f64>>(z: &[T], k: &[T]) -> FlashResult<T> {
    let z_re: Vec<f64> = z.iter().map(|v| v.re()).collect();
    let k_re: Vec<f64> = k.iter().map(|v| v.re()).collect();
    let (regime, v0) = solve_vapor_fraction(&z_re, &k_re);

    match regime {
        PhaseRegime::TwoPhase => {
            let v = T::from(v0);
            let mut g = T::from(0.0);
            for (zi, ki) in z.iter().zip(k) {
                let km1 = ki.clone() - 1.0;
                g += zi.clone() * km1.clone() / (v.clone() * km1 + 1.0);
            }
            let (_, dg) = rachford_rice(&z_re, &k_re, v0);
            let v = v - g / dg;

            let liquid: Vec<T> = z
                .iter()
                .zip(k)
                .map(|(zi, ki)| zi.clone() / (v.clone() * (ki.clone() - 1.0) + 1.0))
                .collect();
            let vapor = liquid.iter().zip(k).map(|(xi, ki)| xi.clone() * ki.clone()).collect();
            FlashResult {
                regime,
                vapor_fraction: v,
                liquid,
                vapor,
            }
        }
        PhaseRegime::Liquid => {
            let trial: Vec<T> = z.iter().zip(k).map(|(zi, ki)| zi.clone() * ki.clone()).collect();
            FlashResult {
                regime,
                vapor_fraction: T::from(0.0),
                liquid: z.to_vec(),
                vapor: normalize(trial),
            }
        }
        PhaseRegime::Vapor => {
            let trial: Vec<T> = z.iter().zip(k).map(|(zi, ki)| zi.clone() / ki.clone()).collect();
            FlashResult {
                regime,
                vapor_fraction: T::from(1.0),
                liquid: normalize(trial),
                vapor: z.to_vec(),
            }
        }
    }
}

fn normalize<T: DualNum<f64>>(x: Vec<T>) -> Vec<T> {
    let total = x.iter().fold(T::from(0.0), |acc, v| acc + v.clone());
    if total.re() <= 0.0 {
        return x;
    }
    x.into_iter().map(|v| v / total.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use num_dual::Dual64;

    #[test]
    fn symmetric_binary_splits_evenly() {
        let res = flash(&[0.5, 0.5], &[2.0, 0.5]);
        assert_eq!(res.regime, PhaseRegime::TwoPhase);
        assert_relative_eq!(res.vapor_fraction, 0.5, epsilon = 1e-12);
        assert_relative_eq!(res.liquid[0], 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(res.liquid[1], 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(res.vapor[0], 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(res.vapor[1], 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn detects_single_phase() {
        // all K below one: no vapor
        let res = flash(&[0.3, 0.7], &[0.9, 0.2]);
        assert_eq!(res.regime, PhaseRegime::Liquid);
        assert_eq!(res.vapor_fraction, 0.0);
        assert_relative_eq!(res.vapor.iter().sum::<f64>(), 1.0, epsilon = 1e-12);

        let res = flash(&[0.3, 0.7], &[5.0, 1.5]);
        assert_eq!(res.regime, PhaseRegime::Vapor);
        assert_eq!(res.vapor_fraction, 1.0);
    }

    #[test]
    fn vapor_fraction_derivative_matches_finite_difference() {
        let k = [Dual64::from_re(3.0), Dual64::from_re(0.2)];
        let z0 = 0.4;
        let res = flash(&[Dual64::new(z0, 1.0), Dual64::new(1.0 - z0, -1.0)], &k);
        let h = 1e-6;
        let (_, vp) = solve_vapor_fraction(&[z0 + h, 1.0 - z0 - h], &[3.0, 0.2]);
        let (_, vm) = solve_vapor_fraction(&[z0 - h, 1.0 - z0 + h], &[3.0, 0.2]);
        assert_relative_eq!(res.vapor_fraction.eps, (vp - vm) / (2.0 * h), max_relative = 1e-6);
    }

    #[test]
    fn wilson_k_values_decrease_with_pressure() {
        let c = [Component::new("propane", 4.248e6, 369.8, 0.152, 0.044_1)];
        let k1: Vec<f64> = KValueModel::Wilson.k_values(&c, 1e6, 350.0);
        let k2: Vec<f64> = KValueModel::Wilson.k_values(&c, 2e6, 350.0);
        assert_relative_eq!(k1[0], 2.0 * k2[0], max_relative = 1e-12);
    }
}
