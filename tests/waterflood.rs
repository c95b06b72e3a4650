use approx::assert_relative_eq;
use resflow::config::SimulatorConfig;
use resflow::constants::DAY;
use resflow::discretization::generator::CartesianGrid;
use resflow::discretization::reservoir::Reservoir;
use resflow::discretization::tpfa::Permeability;
use resflow::fluid::pvt::{DensityModel, PhasePvt};
use resflow::fluid::relperm::CoreyRelPerm;
use resflow::fluid::Phase;
use resflow::models::immiscible::ImmiscibleSystem;
use resflow::numerics::linear::LinearSolverKind;
use resflow::numerics::ConvergenceMetric;
use resflow::physics::sparse::node_accumulation;
use resflow::simulator::forces::Forces;
use resflow::simulator::model::{setup_reservoir_model, ReservoirModel};
use resflow::simulator::state::State;
use resflow::simulator::{SimulationResult, Simulator};
use resflow::wells::control::{WellControl, WellTarget};
use resflow::wells::{setup_well, WellSetup};

const NX: usize = 20;
const RATE: f64 = 1e-4;

fn water_oil() -> ImmiscibleSystem {
    ImmiscibleSystem::new(
        vec![Phase::Aqueous, Phase::Liquid],
        vec![
            PhasePvt::new(DensityModel::Constant(1000.0), 1e-3),
            PhasePvt::new(DensityModel::Constant(800.0), 2e-3),
        ],
        vec![CoreyRelPerm::default(); 2],
    )
    .unwrap()
}

fn setup() -> (ReservoirModel<ImmiscibleSystem>, Forces) {
    let grid = CartesianGrid::new([NX, 1, 1], [200.0, 10.0, 10.0]).unwrap();
    let reservoir = Reservoir::uniform(grid.mesh(), 0.2, Permeability::Isotropic(1e-13)).unwrap();
    let inj = setup_well(&reservoir, &[0], WellSetup::new("INJ")).unwrap();
    let prod = setup_well(&reservoir, &[NX - 1], WellSetup::new("PROD")).unwrap();
    let model = setup_reservoir_model(reservoir, water_oil(), vec![inj, prod]).unwrap();
    let forces = Forces::new()
        .with_control("INJ", WellControl::injector(WellTarget::TotalRate(RATE), vec![1.0, 0.0]))
        .with_control("PROD", WellControl::producer(WellTarget::Bhp(1e7)));
    (model, forces)
}

fn run(days: usize) -> (Simulator<ImmiscibleSystem>, State, SimulationResult) {
    run_with(days, SimulatorConfig::default())
}

fn run_with(days: usize, config: SimulatorConfig) -> (Simulator<ImmiscibleSystem>, State, SimulationResult) {
    let (model, forces) = setup();
    let initial = State::uniform(&model, 1e7, &[0.0, 1.0]).unwrap();
    let sim = Simulator::new(model, config).unwrap();
    let result = sim.simulate(&initial, &vec![DAY; days], &[forces]).unwrap();
    (sim, initial, result)
}

/// Water in cells and well bores.
fn water_in_place(model: &ReservoirModel<ImmiscibleSystem>, state: &State) -> f64 {
    (0..model.num_nodes())
        .map(|node| node_accumulation(model, node, state.node(node))[0])
        .sum()
}

#[test]
fn saturations_stay_physical_and_front_is_monotone() {
    let (sim, _, result) = run(30);
    let fields = result.states.last().unwrap().fields(sim.model());
    let sw = &fields["Saturation:Aqueous"];
    assert_eq!(sw.len(), NX);
    assert!(sw.iter().all(|&s| (0.0..=1.0).contains(&s)));
    for w in sw.windows(2) {
        assert!(w[1] <= w[0] + 1e-6, "non-monotone front {sw:?}");
    }
    assert!(sw[0] > 0.3);
    assert!(sw[NX - 1] < 1e-3);
}

#[test]
fn injected_water_is_accounted_for() {
    let days = 30;
    let (sim, initial, result) = run(days);
    let before = water_in_place(sim.model(), &initial);
    let after = water_in_place(sim.model(), result.states.last().unwrap());

    // the producer sees no water before breakthrough
    let prod = &result.wells.last().unwrap()["PROD"];
    assert!(prod.component_rates[0].abs() < 1e-9);
    assert!(prod.surface_rate < 0.0);

    let injected = RATE * 1000.0 * days as f64 * DAY;
    assert_relative_eq!(after - before, injected, max_relative = 1e-3);
}

#[test]
fn injector_holds_its_rate() {
    let (_, _, result) = run(5);
    for wells in &result.wells {
        let inj = &wells["INJ"];
        assert_relative_eq!(inj.surface_rate, RATE, max_relative = 1e-6);
        assert_relative_eq!(inj.phase_rates[0], RATE, max_relative = 1e-6);
        assert_eq!(inj.phase_rates[1], 0.0);
        assert!(inj.bhp > 1e7);
        assert_eq!(inj.control, Some(WellTarget::TotalRate(RATE)));
    }
    assert_eq!(result.times.len(), 5);
    assert_relative_eq!(result.times[4], 5.0 * DAY);
}

fn final_saturation(sim: &Simulator<ImmiscibleSystem>, result: &SimulationResult) -> Vec<f64> {
    result.states.last().unwrap().fields(sim.model())["Saturation:Aqueous"].clone()
}

#[test]
fn line_search_reaches_the_same_solution() {
    let (sim, _, plain) = run(10);
    let mut config = SimulatorConfig::default();
    config.newton.line_search = true;
    config.newton.merit = ConvergenceMetric::MaxNorm;
    let (searched_sim, _, searched) = run_with(10, config);

    let a = final_saturation(&sim, &plain);
    let b = final_saturation(&searched_sim, &searched);
    for (x, y) in a.iter().zip(&b) {
        assert_relative_eq!(*x, *y, epsilon = 5e-3);
    }
    let prod = &searched.wells.last().unwrap()["PROD"];
    assert_relative_eq!(prod.bhp, 1e7, max_relative = 1e-9);
}

#[test]
fn bicgstab_matches_direct_solution() {
    let mut direct = SimulatorConfig::default();
    direct.linear_solver.kind = LinearSolverKind::Direct;
    let mut iterative = SimulatorConfig::default();
    iterative.linear_solver.kind = LinearSolverKind::BiCgStab;
    iterative.linear_solver.tolerance = 1e-10;
    iterative.linear_solver.dense_limit = 0;

    let (direct_sim, _, expected) = run_with(5, direct);
    let (iterative_sim, _, actual) = run_with(5, iterative);

    let a = final_saturation(&direct_sim, &expected);
    let b = final_saturation(&iterative_sim, &actual);
    for (x, y) in a.iter().zip(&b) {
        assert_relative_eq!(*x, *y, epsilon = 1e-4);
    }
    let pa = expected.states.last().unwrap().pressure();
    let pb = actual.states.last().unwrap().pressure();
    for (x, y) in pa.iter().zip(&pb) {
        assert_relative_eq!(*x, *y, max_relative = 1e-5);
    }

    let newton: usize = actual.reports.iter().map(|r| r.newton_iterations).sum();
    let linear: usize = actual.reports.iter().map(|r| r.linear_iterations).sum();
    assert!(linear > newton, "{linear} Krylov iterations for {newton} Newton steps");
}
