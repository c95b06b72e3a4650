use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use resflow::constants::DAY;
use resflow::discretization::generator::CartesianGrid;
use resflow::discretization::reservoir::Reservoir;
use resflow::discretization::tpfa::{compute_transmissibilities, Permeability};
use resflow::fluid::pvt::{DensityModel, PhasePvt};
use resflow::fluid::relperm::CoreyRelPerm;
use resflow::fluid::Phase;
use resflow::models::immiscible::ImmiscibleSystem;
use resflow::numerics::linear::LinearSolver;
use resflow::numerics::newton::NewtonSolver;
use resflow::physics::sparse::FlowProblem;
use resflow::simulator::forces::Forces;
use resflow::simulator::model::{setup_reservoir_model, ReservoirModel};
use resflow::simulator::state::State;
use resflow::wells::control::{WellControl, WellTarget};
use resflow::wells::{setup_well, WellSetup};

fn problem_sizes() -> Vec<usize> {
    vec![10, 30]
}

fn solver_sizes() -> Vec<usize> {
    // 20 and 40 exceed the dense limit and run BiCGStab
    vec![10, 20, 40]
}

/// Quarter five-spot on an `n x n` grid.
fn five_spot(n: usize) -> (ReservoirModel<ImmiscibleSystem>, Forces, State) {
    let grid = CartesianGrid::new([n, n, 1], [10.0 * n as f64, 10.0 * n as f64, 10.0]).unwrap();
    let reservoir = Reservoir::uniform(grid.mesh(), 0.2, Permeability::Isotropic(1e-13)).unwrap();
    let system = ImmiscibleSystem::new(
        vec![Phase::Aqueous, Phase::Liquid],
        vec![
            PhasePvt::new(DensityModel::Constant(1000.0), 1e-3),
            PhasePvt::new(DensityModel::Constant(800.0), 5e-3),
        ],
        vec![CoreyRelPerm::default(); 2],
    )
    .unwrap();
    let inj = setup_well(&reservoir, &[0], WellSetup::new("INJ")).unwrap();
    let prod = setup_well(&reservoir, &[grid.cell_index(n - 1, n - 1, 0)], WellSetup::new("PROD")).unwrap();
    let model = setup_reservoir_model(reservoir, system, vec![inj, prod]).unwrap();
    let forces = Forces::new()
        .with_control("INJ", WellControl::injector(WellTarget::TotalRate(1e-3), vec![1.0, 0.0]))
        .with_control("PROD", WellControl::producer(WellTarget::Bhp(1e7)));
    let state = State::uniform(&model, 1e7, &[0.2, 0.8]).unwrap();
    (model, forces, state)
}

fn bench_sparse_jacobian(c: &mut Criterion) {
    let mut group = c.benchmark_group("sparse_jacobian");
    for &size in &problem_sizes() {
        let (model, forces, state) = five_spot(size);
        let u = state.primary().as_slice();
        let problem = FlowProblem::new(&model, u, DAY, forces.well_drives(&model));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter(|| {
                let (_res, jac) = problem.assemble(std::hint::black_box(u));
                std::hint::black_box(jac.nnz());
            });
        });
    }
    group.finish();
}

fn bench_transmissibilities(c: &mut Criterion) {
    let mut group = c.benchmark_group("transmissibilities");
    for &size in &problem_sizes() {
        let grid = CartesianGrid::new([size, size, size], [1.0, 1.0, 1.0]).unwrap();
        let mesh = grid.mesh();
        let perm = vec![Permeability::Diagonal([1e-13, 1e-13, 1e-14]); mesh.num_cells()];
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter(|| {
                let t = compute_transmissibilities(std::hint::black_box(&mesh), &perm);
                std::hint::black_box(t);
            });
        });
    }
    group.finish();
}

fn bench_linear_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("linear_solve");
    for &size in &solver_sizes() {
        let (model, forces, state) = five_spot(size);
        let u = state.primary().as_slice();
        let problem = FlowProblem::new(&model, u, DAY, forces.well_drives(&model));
        let (res, jac) = problem.assemble(u);
        let rhs = -res;
        let solver = LinearSolver::default();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter(|| {
                let dx = solver.solve(&jac, &rhs, model.block_size(), model.num_nodes());
                std::hint::black_box(dx.is_ok());
            });
        });
    }
    group.finish();
}

fn bench_ministep(c: &mut Criterion) {
    let mut group = c.benchmark_group("ministep");
    for &size in &solver_sizes() {
        let (model, forces, state) = five_spot(size);
        let u = state.primary().clone();
        let newton = NewtonSolver::default();
        let linear = LinearSolver::default();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter_batched(
                || FlowProblem::new(&model, u.as_slice(), DAY, forces.well_drives(&model)),
                |mut problem| {
                    let _ = newton.solve(&mut problem, &linear, u.clone());
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_sparse_jacobian,
    bench_transmissibilities,
    bench_linear_solve,
    bench_ministep
);
criterion_main!(benches);
