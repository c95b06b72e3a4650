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
use resflow::physics::sparse::node_accumulation;
use resflow::physics::FlowSystem;
use resflow::simulator::forces::Forces;
use resflow::simulator::model::{setup_reservoir_model, ReservoirModel};
use resflow::simulator::state::State;
use resflow::simulator::Simulator;
use resflow::wells::control::{WellControl, WellTarget};
use resflow::wells::{setup_well, WellSetup};

const NX: usize = 10;
const GAS_RATE: f64 = 5e-6;
const GAS_SURFACE_DENSITY: f64 = 100.0;

fn water_oil_gas() -> ImmiscibleSystem {
    ImmiscibleSystem::new(
        vec![Phase::Aqueous, Phase::Liquid, Phase::Vapor],
        vec![
            PhasePvt::new(DensityModel::Constant(1000.0), 1e-3),
            PhasePvt::new(DensityModel::Constant(800.0), 2e-3),
            PhasePvt::new(
                DensityModel::Compressible {
                    reference_density: GAS_SURFACE_DENSITY,
                    compressibility: 1e-8,
                    reference_pressure: 1e7,
                },
                2e-5,
            ),
        ],
        vec![CoreyRelPerm::default(); 3],
    )
    .unwrap()
}

fn mass_in_place(model: &ReservoirModel<ImmiscibleSystem>, state: &State, component: usize) -> f64 {
    (0..model.num_nodes())
        .map(|node| node_accumulation(model, node, state.node(node))[component])
        .sum()
}

#[test]
fn gas_injection_into_oil_with_connate_water() {
    let grid = CartesianGrid::new([NX, 1, 1], [100.0, 10.0, 10.0]).unwrap();
    let reservoir = Reservoir::uniform(grid.mesh(), 0.2, Permeability::Isotropic(1e-13))
        .unwrap()
        .with_rock_compressibility(1e-9, 1e7);
    let inj = setup_well(&reservoir, &[0], WellSetup::new("INJ")).unwrap();
    let prod = setup_well(&reservoir, &[NX - 1], WellSetup::new("PROD")).unwrap();
    let model = setup_reservoir_model(reservoir, water_oil_gas(), vec![inj, prod]).unwrap();
    assert_eq!(model.system.num_components(), 3);
    assert_eq!(model.block_size(), 3);

    let forces = Forces::new()
        .with_control("INJ", WellControl::injector(WellTarget::TotalRate(GAS_RATE), vec![0.0, 0.0, 1.0]))
        .with_control("PROD", WellControl::producer(WellTarget::Bhp(1e7)));
    let initial = State::uniform(&model, 1e7, &[0.2, 0.8, 0.0]).unwrap();

    let days = 10;
    let sim = Simulator::new(model, SimulatorConfig::default()).unwrap();
    let result = sim.simulate(&initial, &vec![DAY; days], &[forces]).unwrap();
    let last = result.states.last().unwrap();

    let fields = last.fields(sim.model());
    let (sw, so, sg) = (
        &fields["Saturation:Aqueous"],
        &fields["Saturation:Liquid"],
        &fields["Saturation:Vapor"],
    );
    for i in 0..NX {
        for s in [sw[i], so[i], sg[i]] {
            assert!((0.0..=1.0).contains(&s), "saturation {s} out of range in cell {i}");
        }
        assert_relative_eq!(sw[i] + so[i] + sg[i], 1.0, epsilon = 1e-10);
    }
    assert!(sg[0] > 0.01);
    assert!(sg[0] > sg[NX - 1]);

    let wells = result.wells.last().unwrap();
    assert_relative_eq!(wells["INJ"].surface_rate, GAS_RATE, max_relative = 1e-6);
    assert_relative_eq!(wells["INJ"].phase_rates[2], GAS_RATE, max_relative = 1e-6);
    assert!(wells["PROD"].surface_rate < 0.0);
    // the gas front is still far from the producer
    assert!(wells["PROD"].component_rates[2].abs() < 1e-2 * GAS_RATE * GAS_SURFACE_DENSITY);

    let injected = GAS_RATE * GAS_SURFACE_DENSITY * days as f64 * DAY;
    let gained = mass_in_place(sim.model(), last, 2) - mass_in_place(sim.model(), &initial, 2);
    assert_relative_eq!(gained, injected, max_relative = 5e-3);
}
