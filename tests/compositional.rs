use approx::assert_relative_eq;
use resflow::config::SimulatorConfig;
use resflow::constants::DAY;
use resflow::discretization::generator::CartesianGrid;
use resflow::discretization::reservoir::Reservoir;
use resflow::discretization::tpfa::Permeability;
use resflow::fluid::eos::{Component, PengRobinson};
use resflow::fluid::flash::{solve_vapor_fraction, KValueModel, PhaseRegime};
use resflow::fluid::relperm::CoreyRelPerm;
use resflow::models::compositional::CompositionalSystem;
use resflow::physics::FlowSystem;
use resflow::simulator::forces::Forces;
use resflow::simulator::model::setup_reservoir_model;
use resflow::simulator::state::State;
use resflow::simulator::Simulator;
use resflow::wells::control::{WellControl, WellTarget};
use resflow::wells::{setup_well, WellSetup};

const K: [f64; 2] = [3.0, 0.1];

/// Linear relative permeabilities and equal viscosities: phases flow in
/// proportion to their saturation, so a cell produces its overall composition.
fn methane_decane() -> CompositionalSystem {
    let eos = PengRobinson::new(vec![
        Component::new("methane", 4.599e6, 190.56, 0.011, 0.016_04),
        Component::new("decane", 2.103e6, 617.7, 0.4884, 0.142_28),
    ]);
    CompositionalSystem::new(
        eos,
        KValueModel::Constant(K.to_vec()),
        350.0,
        [2e-4, 2e-4],
        [CoreyRelPerm::linear(); 2],
    )
    .unwrap()
}

#[test]
fn constant_k_flash_splits_an_equimolar_mixture() {
    // g(V) = 0 gives V = 0.55 / 1.8 for z = [0.5, 0.5]
    let (regime, v) = solve_vapor_fraction(&[0.5, 0.5], &K);
    assert_eq!(regime, PhaseRegime::TwoPhase);
    assert_relative_eq!(v, 0.55 / 1.8, max_relative = 1e-8);

    let sys = methane_decane();
    let out: std::collections::BTreeMap<String, f64> = sys.additional_outputs(&[1e7, 0.5]).into_iter().collect();
    let x = 0.5 / (1.0 + 2.0 * v);
    assert_relative_eq!(out["MoleFraction:Liquid:methane"], x, max_relative = 1e-8);
    assert_relative_eq!(out["MoleFraction:Vapor:methane"], 3.0 * x, max_relative = 1e-8);
    assert_relative_eq!(
        out["MoleFraction:Vapor:methane"] + out["MoleFraction:Vapor:decane"],
        1.0,
        max_relative = 1e-10
    );
}

#[test]
fn lean_and_rich_mixtures_are_single_phase() {
    // bubble point at z = 0.31, dew point at z = 0.931
    assert_eq!(solve_vapor_fraction(&[0.2, 0.8], &K).0, PhaseRegime::Liquid);
    assert_eq!(solve_vapor_fraction(&[0.97, 0.03], &K).0, PhaseRegime::Vapor);
}

#[test]
fn gas_injection_enriches_the_near_well_cells() {
    let grid = CartesianGrid::new([5, 1, 1], [50.0, 10.0, 10.0]).unwrap();
    let reservoir = Reservoir::uniform(grid.mesh(), 0.2, Permeability::Isotropic(1e-13)).unwrap();
    let inj = setup_well(&reservoir, &[0], WellSetup::new("INJ")).unwrap();
    let prod = setup_well(&reservoir, &[4], WellSetup::new("PROD")).unwrap();
    let model = setup_reservoir_model(reservoir, methane_decane(), vec![inj, prod]).unwrap();

    // both streams lie inside the two-phase envelope
    let forces = Forces::new()
        .with_control("INJ", WellControl::injector(WellTarget::TotalRate(1.0), vec![0.8, 0.2]))
        .with_control("PROD", WellControl::producer(WellTarget::Bhp(9e6)));
    let initial = State::uniform(&model, 1e7, &[0.5, 0.5]).unwrap();

    let sim = Simulator::new(model, SimulatorConfig::default()).unwrap();
    let result = sim.simulate(&initial, &[DAY; 5], &[forces]).unwrap();
    assert_eq!(result.states.len(), 5);

    let fields = result.states.last().unwrap().fields(sim.model());
    let z = &fields["OverallMoleFraction:methane"];
    assert!(fields.contains_key("MoleFraction:Vapor:decane"));
    assert!(z.iter().all(|&v| (0.0..=1.0).contains(&v)));
    assert!(z[0] > 0.5);
    assert!(z[0] > z[4]);

    let wells = result.wells.last().unwrap();
    assert_relative_eq!(wells["INJ"].surface_rate, 1.0, max_relative = 1e-6);
    // injected moles split by the stream composition
    assert_relative_eq!(wells["INJ"].component_rates[0], 0.8, max_relative = 1e-6);
    assert!(wells["PROD"].surface_rate < 0.0);
    assert_relative_eq!(wells["PROD"].bhp, 9e6, max_relative = 1e-9);
}
