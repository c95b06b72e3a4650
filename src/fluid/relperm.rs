use num_dual::DualNum;
use serde::{Deserialize, Serialize};

/// Brooks-Corey relative permeability for one phase.
///
/// `kr = endpoint * s_n^exponent` with the normalized saturation
/// `s_n = (s - residual) / (1 - total_residual)` clamped to `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoreyRelPerm {
    pub exponent: f64,
    pub residual: f64,
    pub endpoint: f64,
}

impl Default for CoreyRelPerm {
    fn default() -> Self {
        Self {
            exponent: 2.0,
            residual: 0.0,
            endpoint: 1.0,
        }
    }
}

impl CoreyRelPerm {
    pub fn new(exponent: f64, residual: f64, endpoint: f64) -> Self {
        Self {
            exponent,
            residual,
            endpoint,
        }
    }

    pub fn linear() -> Self {
        Self::new(1.0, 0.0, 1.0)
    }

    pub fn evaluate<T: DualNum<f64>>(&self, saturation: T, total_residual: f64) -> T {
        let mobile = (1.0 - total_residual).max(f64::EPSILON);
        let s_n = (saturation - self.residual) / mobile;
        if s_n.re() <= 0.0 {
            T::from(0.0)
        } else if s_n.re() >= 1.0 {
            T::from(self.endpoint)
        } else {
            s_n.powf(self.exponent) * self.endpoint
        }
    }

    pub fn is_valid(&self) -> bool {
        self.exponent >= 1.0
            && (0.0..1.0).contains(&self.residual)
            && self.endpoint > 0.0
            && self.endpoint <= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use num_dual::Dual64;

    #[test]
    fn corey_with_residuals() {
        let kr = CoreyRelPerm::new(2.0, 0.2, 0.8);
        // total residual 0.4: s_n = (0.5 - 0.2) / 0.6
        let s = Dual64::new(0.5, 1.0);
        let v = kr.evaluate(s, 0.4);
        assert_relative_eq!(v.re, 0.8 * 0.25, max_relative = 1e-12);
        assert_relative_eq!(v.eps, 0.8 * 2.0 * 0.5 / 0.6, max_relative = 1e-12);
        assert_eq!(kr.evaluate(0.1, 0.4), 0.0);
        assert_eq!(kr.evaluate(0.95, 0.4), 0.8);
    }
}
