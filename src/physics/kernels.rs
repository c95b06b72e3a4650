//! Local residual kernels, generic over the scalar so the same code yields
//! plain residuals (`f64`) and Jacobian rows (dual numbers).

use num_dual::DualNum;

use super::PhaseState;

/// Component amounts stored in a node: `PV * sum_a S_a rho_a X_ca`.
pub fn accumulation<T: DualNum<f64>>(state: &PhaseState<T>, pore_volume: T) -> Vec<T> {
    state
        .concentrations()
        .into_iter()
        .map(|c| c * pore_volume.clone())
        .collect()
}

/// Two-point phase-potential-upwinded component flux from `left` to `right`.
///
/// `dz` is the depth of `right` minus the depth of `left`.
pub fn tpfa_flux<T: DualNum<f64>>(
    left: &PhaseState<T>,
    right: &PhaseState<T>,
    trans: f64,
    dz: f64,
    gravity: f64,
) -> Vec<T> {
    let nc = left.num_components();
    let mut flux = vec![T::from(0.0); nc];
    let dp = left.pressure.clone() - right.pressure.clone();
    for (pl, pr) in left.phases.iter().zip(&right.phases) {
        let rho_avg = (pl.mass_density.clone() + pr.mass_density.clone()) * 0.5;
        let potential = dp.clone() + rho_avg * (gravity * dz);
        let up = if potential.re() >= 0.0 { pl } else { pr };
        let phase_flux = potential * up.mobility.clone() * trans;
        let rho_flux = phase_flux * up.density.clone();
        for (f, x) in flux.iter_mut().zip(&up.fractions) {
            *f += rho_flux.clone() * x.clone();
        }
    }
    flux
}

/// Flow from a well-bore node into a perforated cell (negative when producing).
///
/// The hydrostatic head inside the bore uses the mixture density of the well
/// node. Injection carries the bore mixture with the total mobility of the
/// cell; production takes each phase with its own cell mobility.
pub fn perforation_flux<T: DualNum<f64>>(
    well: &PhaseState<T>,
    cell: &PhaseState<T>,
    well_index: f64,
    dz: f64,
    gravity: f64,
) -> Vec<T> {
    let nc = cell.num_components();
    let head = well.mixture_mass_density() * (gravity * dz);
    let drawdown = well.pressure.clone() + head - cell.pressure.clone();
    if drawdown.re() > 0.0 {
        let q = drawdown * cell.total_mobility() * well_index;
        well.concentrations()
            .into_iter()
            .map(|c| c * q.clone())
            .collect()
    } else {
        let mut flux = vec![T::from(0.0); nc];
        for ph in &cell.phases {
            let q = drawdown.clone() * ph.mobility.clone() * well_index * ph.density.clone();
            for (f, x) in flux.iter_mut().zip(&ph.fractions) {
                *f += q.clone() * x.clone();
            }
        }
        flux
    }
}

/// Homogeneous mixture flow along a well segment from `upper` to `lower`.
///
/// `trans` is the geometric Hagen-Poiseuille factor; it is divided by the
/// mixture viscosity of the upstream node.
pub fn segment_flux<T: DualNum<f64>>(
    upper: &PhaseState<T>,
    lower: &PhaseState<T>,
    trans: f64,
    dz: f64,
    gravity: f64,
) -> Vec<T> {
    let rho_avg = (upper.mixture_mass_density() + lower.mixture_mass_density()) * 0.5;
    let potential = upper.pressure.clone() - lower.pressure.clone() + rho_avg * (gravity * dz);
    let up = if potential.re() >= 0.0 { upper } else { lower };
    let q = potential * trans / up.mixture_viscosity();
    up.concentrations()
        .into_iter()
        .map(|c| c * q.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::pvt::{DensityModel, PhasePvt};
    use crate::fluid::relperm::CoreyRelPerm;
    use crate::fluid::Phase;
    use crate::models::immiscible::ImmiscibleSystem;
    use crate::physics::FlowSystem;
    use approx::assert_relative_eq;

    fn water_oil() -> ImmiscibleSystem {
        ImmiscibleSystem::new(
            vec![Phase::Aqueous, Phase::Liquid],
            vec![
                PhasePvt::new(DensityModel::Constant(1000.0), 1e-3),
                PhasePvt::new(DensityModel::Constant(500.0), 1e-3),
            ],
            vec![CoreyRelPerm::linear(); 2],
        )
        .unwrap()
    }

    #[test]
    fn flux_is_antisymmetric() {
        let sys = water_oil();
        let a = sys.phase_state(&[2e5, 0.7]);
        let b = sys.phase_state(&[1e5, 0.2]);
        let f_ab = tpfa_flux(&a, &b, 1e-12, 3.0, 9.81);
        let f_ba = tpfa_flux(&b, &a, 1e-12, -3.0, 9.81);
        for (x, y) in f_ab.iter().zip(&f_ba) {
            assert_relative_eq!(*x, -*y, max_relative = 1e-12);
        }
    }

    #[test]
    fn gravity_segregates_mixture() {
        let sys = water_oil();
        // lower node is 1 m deeper and on the mixture gradient of 750 kg/m^3:
        // water sinks, oil rises
        let upper = sys.phase_state(&[1e5, 0.5]);
        let lower = sys.phase_state(&[1e5 + 7500.0, 0.5]);
        let f = tpfa_flux(&upper, &lower, 1.0, 1.0, 10.0);
        assert!(f[0] > 0.0);
        assert!(f[1] < 0.0);
        assert_relative_eq!(f[0], 2500.0 * 0.5 / 1e-3 * 1000.0, max_relative = 1e-12);
    }

    #[test]
    fn perforation_direction_follows_drawdown() {
        let sys = water_oil();
        let cell = sys.phase_state(&[2e5, 0.5]);
        let well = sys.phase_state(&[1e5, 1.0]);
        let f = perforation_flux(&well, &cell, 1e-12, 0.0, 9.81);
        assert!(f[0] < 0.0 && f[1] < 0.0);

        let well = sys.phase_state(&[3e5, 1.0]);
        let f = perforation_flux(&well, &cell, 1e-12, 0.0, 9.81);
        assert!(f[0] > 0.0);
        assert_eq!(f[1], 0.0);
    }
}
