//! Residual and Jacobian assembly over the flow graph.
//!
//! Each kernel is evaluated on dual numbers seeded only with the unknowns it
//! touches (node: m, connection: 2m, well: m + 1) and its gradient is
//! scattered into CSR triplets.

use log::warn;
use nalgebra::{DVector, Dyn, U1};
use num_dual::{Derivative, DualDVec64, DualNum};

use super::bc::{ghost_values, SourceTerm};
use super::kernels::{accumulation, perforation_flux, segment_flux, tpfa_flux};
use super::{FlowSystem, UpdateLimits};
use crate::numerics::newton::NonlinearProblem;
use crate::numerics::sparse::{csr_from_triplets, CsrMatrix};
use crate::numerics::ConvergenceReport;
use crate::simulator::model::{Connection, ConnectionKind, ReservoirModel};
use crate::wells::control::{control_equation, WellDrive, WellTarget};

/// A flow boundary matched to a boundary face for the current report step.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveBoundary {
    pub cell: usize,
    /// Half transmissibility times the rule's multiplier.
    pub transmissibility: f64,
    pub dz: f64,
    pub pressure: f64,
    pub fractions: Option<Vec<f64>>,
}

/// Component amounts stored in a node.
pub fn node_accumulation<S: FlowSystem, T: DualNum<f64>>(model: &ReservoirModel<S>, node: usize, u: &[T]) -> Vec<T> {
    let state = model.system.phase_state(u);
    let volume = model.graph.volumes[node];
    let pv = if model.graph.is_cell(node) {
        model.reservoir.rock.pore_volume(volume, u[0].clone())
    } else {
        T::from(volume)
    };
    accumulation(&state, pv)
}

/// True when the surface rate carries the injection stream into the bore.
/// Any other flow, including crossflow against the well type, moves the bore
/// mixture.
#[inline]
fn injects(drive: &WellDrive, q: f64) -> bool {
    drive.is_injector() && q >= 0.0
}

/// Component inflow at the top node of a well for the surface rate `q`.
pub fn well_inflow<S: FlowSystem, T: DualNum<f64>>(system: &S, drive: &WellDrive, u_top: &[T], q: T) -> Vec<T> {
    if injects(drive, q.re()) {
        return drive.stream.iter().map(|&s| q.clone() * s).collect();
    }
    let c = system.phase_state(u_top).concentrations();
    let sv = system.surface_volume(&c);
    if sv.re() <= 0.0 {
        return vec![T::from(0.0); c.len()];
    }
    c.into_iter().map(|ci| q.clone() * ci / sv.clone()).collect()
}

/// Surface phase split of the fluid a well moves.
pub fn well_phase_fractions<S: FlowSystem, T: DualNum<f64>>(
    system: &S,
    drive: &WellDrive,
    u_top: &[T],
    q: f64,
) -> Vec<T> {
    if injects(drive, q) {
        let stream: Vec<T> = drive.stream.iter().map(|&s| T::from(s)).collect();
        system.surface_phase_fractions(&stream)
    } else {
        system.surface_phase_fractions(&system.phase_state(u_top).concentrations())
    }
}

fn well_equation<S: FlowSystem, T: DualNum<f64>>(system: &S, drive: &WellDrive, u_top: &[T], q: T) -> T {
    let fractions = match drive.active {
        Some(WellTarget::SurfacePhaseRate { .. }) => well_phase_fractions(system, drive, u_top, q.re()),
        _ => Vec::new(),
    };
    control_equation(drive.active.as_ref(), u_top[0].clone(), q, &fractions)
}

/// Component inflow of a source term into its cell.
pub fn source_inflow<S: FlowSystem, T: DualNum<f64>>(system: &S, source: &SourceTerm, u_cell: &[T]) -> Vec<T> {
    match &source.fractions {
        Some(f) => system
            .injection_stream(f)
            .into_iter()
            .map(|s| T::from(source.rate * s))
            .collect(),
        None => {
            let c = system.phase_state(u_cell).mobility_weighted_concentrations();
            let sv = system.surface_volume(&c);
            if sv.re() <= 0.0 {
                return vec![T::from(0.0); c.len()];
            }
            c.into_iter().map(|ci| ci * source.rate / sv.clone()).collect()
        }
    }
}

#[inline]
fn seed(values: &[f64], size: usize, offset: usize) -> Vec<DualDVec64> {
    values
        .iter()
        .enumerate()
        .map(|(j, &v)| DualDVec64::new(v, Derivative::derivative_generic(Dyn(size), U1, offset + j)))
        .collect()
}

/// Add `sign * values` to consecutive rows starting at `row`.
#[inline]
fn scatter(
    residual: &mut [f64],
    triplets: &mut Vec<(usize, usize, f64)>,
    row: usize,
    sign: f64,
    values: &[DualDVec64],
    cols: &[usize],
) {
    for (i, v) in values.iter().enumerate() {
        residual[row + i] += sign * v.re;
        let grad = v.eps.clone().unwrap_generic(Dyn(cols.len()), U1);
        for (k, &c) in cols.iter().enumerate() {
            let g = grad[(k, 0)];
            if g != 0.0 {
                triplets.push((row + i, c, sign * g));
            }
        }
    }
}

/// Nonlinear system of one ministep.
pub struct FlowProblem<'a, S> {
    pub model: &'a ReservoirModel<S>,
    pub dt: f64,
    pub gravity: f64,
    pub boundaries: &'a [ActiveBoundary],
    pub sources: &'a [SourceTerm],
    pub wells: Vec<WellDrive>,
    pub limits: UpdateLimits,
    accumulation_old: Vec<f64>,
}

impl<'a, S: FlowSystem> FlowProblem<'a, S> {
    /// `u_old` is the converged state at the start of the ministep.
    pub fn new(model: &'a ReservoirModel<S>, u_old: &[f64], dt: f64, wells: Vec<WellDrive>) -> Self {
        let m = model.block_size();
        let accumulation_old = (0..model.num_nodes())
            .flat_map(|node| node_accumulation(model, node, &u_old[node * m..(node + 1) * m]))
            .collect();
        Self {
            model,
            dt,
            gravity: 0.0,
            boundaries: &[],
            sources: &[],
            wells,
            limits: UpdateLimits {
                max_dp_rel: 0.2,
                max_ds: 0.2,
            },
            accumulation_old,
        }
    }

    pub fn with_gravity(mut self, gravity: f64) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_boundaries(mut self, boundaries: &'a [ActiveBoundary]) -> Self {
        self.boundaries = boundaries;
        self
    }

    pub fn with_sources(mut self, sources: &'a [SourceTerm]) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_limits(mut self, limits: UpdateLimits) -> Self {
        self.limits = limits;
        self
    }

    #[inline]
    fn block<'b, T>(&self, u: &'b [T], node: usize) -> &'b [T] {
        let m = self.model.block_size();
        &u[node * m..(node + 1) * m]
    }

    fn connection_flux<T: DualNum<f64>>(&self, conn: &Connection, ul: &[T], ur: &[T]) -> Vec<T> {
        let system = &self.model.system;
        let left = system.phase_state(ul);
        let right = system.phase_state(ur);
        let (t, dz, g) = (conn.transmissibility, conn.dz, self.gravity);
        match conn.kind {
            ConnectionKind::Face(_) => tpfa_flux(&left, &right, t, dz, g),
            ConnectionKind::Perforation { .. } => perforation_flux(&left, &right, t, dz, g),
            ConnectionKind::Segment { .. } => segment_flux(&left, &right, t, dz, g),
        }
    }

    fn boundary_flux<T: DualNum<f64>>(&self, bc: &ActiveBoundary, u_cell: &[T]) -> Vec<T> {
        let system = &self.model.system;
        let ghost = ghost_values(u_cell, bc.pressure, bc.fractions.as_deref());
        tpfa_flux(
            &system.phase_state(u_cell),
            &system.phase_state(&ghost),
            bc.transmissibility,
            bc.dz,
            self.gravity,
        )
    }

    /// Residual without derivatives, used by the line search.
    pub fn residual_values(&self, u: &[f64]) -> Vec<f64> {
        let model = self.model;
        let m = model.block_size();
        let mut r = vec![0.0; model.num_unknowns()];

        for node in 0..model.num_nodes() {
            let acc = node_accumulation(model, node, self.block(u, node));
            for c in 0..m {
                r[node * m + c] += (acc[c] - self.accumulation_old[node * m + c]) / self.dt;
            }
        }
        for conn in &model.graph.connections {
            let flux = self.connection_flux(conn, self.block(u, conn.left), self.block(u, conn.right));
            for c in 0..m {
                r[conn.left * m + c] += flux[c];
                r[conn.right * m + c] -= flux[c];
            }
        }
        for bc in self.boundaries {
            let flux = self.boundary_flux(bc, self.block(u, bc.cell));
            for c in 0..m {
                r[bc.cell * m + c] += flux[c];
            }
        }
        for src in self.sources {
            let inflow = source_inflow(&model.system, src, self.block(u, src.cell));
            for c in 0..m {
                r[src.cell * m + c] -= inflow[c];
            }
        }
        for (w, drive) in self.wells.iter().enumerate() {
            let top = model.top_node(w);
            let ri = model.rate_index(w);
            let u_top = self.block(u, top);
            let inflow = well_inflow(&model.system, drive, u_top, u[ri]);
            for c in 0..m {
                r[top * m + c] -= inflow[c];
            }
            r[ri] = well_equation(&model.system, drive, u_top, u[ri]);
        }
        r
    }

    /// Residual and Jacobian by local forward-mode AD.
    pub fn assemble(&self, u: &[f64]) -> (DVector<f64>, CsrMatrix) {
        let model = self.model;
        let m = model.block_size();
        let n = model.num_unknowns();
        let mut residual = vec![0.0; n];
        let mut triplets: Vec<(usize, usize, f64)> = Vec::with_capacity(n * 8 * m);
        let cols_of = |node: usize| (node * m..(node + 1) * m).collect::<Vec<usize>>();

        for node in 0..model.num_nodes() {
            let ud = seed(self.block(u, node), m, 0);
            let acc: Vec<DualDVec64> = node_accumulation(model, node, &ud)
                .into_iter()
                .enumerate()
                .map(|(c, a)| (a - self.accumulation_old[node * m + c]) / self.dt)
                .collect();
            scatter(&mut residual, &mut triplets, node * m, 1.0, &acc, &cols_of(node));
        }

        for conn in &model.graph.connections {
            let ul = seed(self.block(u, conn.left), 2 * m, 0);
            let ur = seed(self.block(u, conn.right), 2 * m, m);
            let flux = self.connection_flux(conn, &ul, &ur);
            let mut cols = cols_of(conn.left);
            cols.extend(cols_of(conn.right));
            scatter(&mut residual, &mut triplets, conn.left * m, 1.0, &flux, &cols);
            scatter(&mut residual, &mut triplets, conn.right * m, -1.0, &flux, &cols);
        }

        for bc in self.boundaries {
            let uc = seed(self.block(u, bc.cell), m, 0);
            let flux = self.boundary_flux(bc, &uc);
            scatter(&mut residual, &mut triplets, bc.cell * m, 1.0, &flux, &cols_of(bc.cell));
        }

        for src in self.sources {
            let uc = seed(self.block(u, src.cell), m, 0);
            let inflow = source_inflow(&model.system, src, &uc);
            scatter(&mut residual, &mut triplets, src.cell * m, -1.0, &inflow, &cols_of(src.cell));
        }

        for (w, drive) in self.wells.iter().enumerate() {
            let top = model.top_node(w);
            let ri = model.rate_index(w);
            let ut = seed(self.block(u, top), m + 1, 0);
            let q = DualDVec64::new(u[ri], Derivative::derivative_generic(Dyn(m + 1), U1, m));
            let mut cols = cols_of(top);
            cols.push(ri);

            let inflow = well_inflow(&model.system, drive, &ut, q.clone());
            scatter(&mut residual, &mut triplets, top * m, -1.0, &inflow, &cols);
            let eq = well_equation(&model.system, drive, &ut, q);
            scatter(&mut residual, &mut triplets, ri, 1.0, &[eq], &cols);
        }

        (
            DVector::from_vec(residual),
            csr_from_triplets(n, &mut triplets),
        )
    }

    /// `dt / (pv rho_t)` per node, converting residuals to saturation units.
    fn residual_scales(&self, u: &[f64]) -> Vec<f64> {
        let model = self.model;
        (0..model.num_nodes())
            .map(|node| {
                let ub = self.block(u, node);
                let rho = model.system.phase_state(ub).total_density();
                let volume = model.graph.volumes[node];
                let pv = if model.graph.is_cell(node) {
                    model.reservoir.rock.pore_volume(volume, ub[0])
                } else {
                    volume
                };
                self.dt / (pv * rho).max(f64::MIN_POSITIVE)
            })
            .collect()
    }
}

impl<S: FlowSystem> NonlinearProblem for FlowProblem<'_, S> {
    fn residual(&self, u: &DVector<f64>) -> DVector<f64> {
        DVector::from_vec(self.residual_values(u.as_slice()))
    }

    fn residual_and_jacobian(&self, u: &DVector<f64>) -> (DVector<f64>, CsrMatrix) {
        self.assemble(u.as_slice())
    }

    fn convergence(&self, u: &DVector<f64>, residual: &DVector<f64>) -> ConvergenceReport {
        let model = self.model;
        let m = model.block_size();
        let u = u.as_slice();
        let scales = self.residual_scales(u);

        let mut cnv = vec![0.0_f64; m];
        let mut mb_sum = vec![0.0_f64; m];
        let mut pore_mass = 0.0;
        for (node, scale) in scales.iter().enumerate() {
            for c in 0..m {
                let r = residual[node * m + c];
                cnv[c] = cnv[c].max(r.abs() * scale);
                if model.graph.is_cell(node) {
                    mb_sum[c] += r;
                }
            }
            if model.graph.is_cell(node) {
                pore_mass += self.dt / scale;
            }
        }
        let mb = mb_sum
            .iter()
            .map(|s| s.abs() * self.dt / pore_mass.max(f64::MIN_POSITIVE))
            .collect();
        let well = (0..self.wells.len())
            .map(|w| residual[model.rate_index(w)].abs())
            .fold(0.0, f64::max);
        ConvergenceReport { cnv, mb, well }
    }

    fn scaled_residual(&self, u: &DVector<f64>, residual: &DVector<f64>) -> DVector<f64> {
        let m = self.model.block_size();
        let scales = self.residual_scales(u.as_slice());
        DVector::from_iterator(
            residual.len(),
            residual.iter().enumerate().map(|(i, r)| match scales.get(i / m) {
                Some(s) => r * s,
                None => *r,
            }),
        )
    }

    fn apply_update(&self, u: &mut DVector<f64>, du: &DVector<f64>) {
        let model = self.model;
        let m = model.block_size();
        let (u, du) = (u.as_mut_slice(), du.as_slice());
        for node in 0..model.num_nodes() {
            let range = node * m..(node + 1) * m;
            model
                .system
                .apply_update(&mut u[range.clone()], &du[range], &self.limits);
        }
        for w in 0..self.wells.len() {
            let ri = model.rate_index(w);
            u[ri] += du[ri];
        }
    }

    fn update_controls(&mut self, u: &DVector<f64>) -> bool {
        let model = self.model;
        let m = model.block_size();
        let mut changed = false;
        for (w, drive) in self.wells.iter_mut().enumerate() {
            let top = model.top_node(w);
            let u_top = &u.as_slice()[top * m..(top + 1) * m];
            let rate = u[model.rate_index(w)];
            let phase_rates: Vec<f64> = well_phase_fractions(&model.system, drive, u_top, rate)
                .into_iter()
                .map(|f| f * rate)
                .collect();
            if let Some(target) = drive.update(u_top[0], rate, &phase_rates) {
                warn!("well '{}' switched to {:?}", model.wells[w].name, target);
                changed = true;
            }
        }
        changed
    }

    fn block_layout(&self) -> (usize, usize) {
        (self.model.block_size(), self.model.num_nodes())
    }
}
