use num_dual::DualNum;
use serde::{Deserialize, Serialize};

/// Phase density as a function of pressure [kg/m^3].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum DensityModel {
    Constant(f64),
    /// `rho_ref * exp(c (p - p_ref))`
    Compressible {
        reference_density: f64,
        compressibility: f64,
        reference_pressure: f64,
    },
}

impl DensityModel {
    pub fn density<T: DualNum<f64>>(&self, p: T) -> T {
        match *self {
            DensityModel::Constant(rho) => T::from(rho),
            DensityModel::Compressible {
                reference_density,
                compressibility,
                reference_pressure,
            } => ((p - reference_pressure) * compressibility).exp() * reference_density,
        }
    }

    pub fn is_valid(&self) -> bool {
        match *self {
            DensityModel::Constant(rho) => rho > 0.0 && rho.is_finite(),
            DensityModel::Compressible {
                reference_density,
                compressibility,
                reference_pressure,
            } => {
                reference_density > 0.0
                    && compressibility >= 0.0
                    && compressibility.is_finite()
                    && reference_pressure.is_finite()
            }
        }
    }
}

/// Black-oil style properties of one immiscible phase.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhasePvt {
    pub density: DensityModel,
    /// [Pa s]
    pub viscosity: f64,
    /// Density at surface conditions, converts mass to surface volume.
    pub surface_density: f64,
}

impl PhasePvt {
    pub fn new(density: DensityModel, viscosity: f64) -> Self {
        let surface_density = match density {
            DensityModel::Constant(rho) => rho,
            DensityModel::Compressible {
                reference_density, ..
            } => reference_density,
        };
        Self {
            density,
            viscosity,
            surface_density,
        }
    }

    pub fn with_surface_density(mut self, rho: f64) -> Self {
        self.surface_density = rho;
        self
    }
}

/// Linear rock compressibility: `pv = pv_ref (1 + c_r (p - p_ref))`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RockCompressibility {
    pub compressibility: f64,
    pub reference_pressure: f64,
}

impl Default for RockCompressibility {
    fn default() -> Self {
        Self {
            compressibility: 0.0,
            reference_pressure: crate::constants::STANDARD_PRESSURE,
        }
    }
}

impl RockCompressibility {
    pub fn pore_volume<T: DualNum<f64>>(&self, reference_pore_volume: f64, p: T) -> T {
        ((p - self.reference_pressure) * self.compressibility + 1.0) * reference_pore_volume
    }
}
