use anyhow::{Context, Result};
use log::info;

use resflow::config::SimulatorConfig;
use resflow::constants::{BAR, CENTIPOISE, DAY, MILLIDARCY};
use resflow::discretization::generator::CartesianGrid;
use resflow::discretization::reservoir::Reservoir;
use resflow::discretization::tpfa::Permeability;
use resflow::fluid::pvt::{DensityModel, PhasePvt};
use resflow::fluid::relperm::CoreyRelPerm;
use resflow::fluid::Phase;
use resflow::logging::init_logging;
use resflow::models::immiscible::ImmiscibleSystem;
use resflow::processing::results::write_all;
use resflow::simulator::forces::Forces;
use resflow::simulator::model::setup_reservoir_model;
use resflow::simulator::state::State;
use resflow::simulator::Simulator;
use resflow::wells::control::{WellControl, WellLimits, WellTarget};
use resflow::wells::{setup_well, WellSetup};

/// Quarter five-spot waterflood: water injected in one corner, oil and
/// water produced at the opposite corner.
fn main() -> Result<()> {
    init_logging(None);

    let config = match std::env::args().nth(1) {
        Some(path) => SimulatorConfig::from_file(&path).with_context(|| format!("reading config {path}"))?,
        None => SimulatorConfig::default(),
    };

    let n = 20;
    let grid = CartesianGrid::new([n, n, 1], [500.0, 500.0, 10.0])?;
    let reservoir = Reservoir::uniform(grid.mesh(), 0.2, Permeability::Isotropic(100.0 * MILLIDARCY))?
        .with_rock_compressibility(1e-10, 200.0 * BAR);

    let system = ImmiscibleSystem::new(
        vec![Phase::Aqueous, Phase::Liquid],
        vec![
            PhasePvt::new(
                DensityModel::Compressible {
                    reference_density: 1000.0,
                    compressibility: 4e-10,
                    reference_pressure: 200.0 * BAR,
                },
                CENTIPOISE,
            ),
            PhasePvt::new(
                DensityModel::Compressible {
                    reference_density: 850.0,
                    compressibility: 1e-9,
                    reference_pressure: 200.0 * BAR,
                },
                5.0 * CENTIPOISE,
            ),
        ],
        vec![CoreyRelPerm::new(2.0, 0.2, 1.0), CoreyRelPerm::new(2.0, 0.2, 1.0)],
    )?;

    let injector = setup_well(&reservoir, &[grid.cell_index(0, 0, 0)], WellSetup::new("INJ"))?;
    let producer = setup_well(&reservoir, &[grid.cell_index(n - 1, n - 1, 0)], WellSetup::new("PROD"))?;
    let model = setup_reservoir_model(reservoir, system, vec![injector, producer])?;

    let pore_volume: f64 = model.reservoir.pore_volume.iter().sum();
    let total_time = 2.0 * 365.0 * DAY;
    // one pore volume over the simulated period
    let rate = pore_volume / total_time;

    let forces = Forces::new()
        .with_control(
            "INJ",
            WellControl::injector(WellTarget::TotalRate(rate), vec![1.0, 0.0]).with_limits(WellLimits {
                bhp: Some(500.0 * BAR),
                rate: None,
            }),
        )
        .with_control("PROD", WellControl::producer(WellTarget::Bhp(150.0 * BAR)));

    let initial = State::uniform(&model, 200.0 * BAR, &[0.2, 0.8])?;
    let timesteps = vec![total_time / 24.0; 24];

    let output = config.output.clone();
    let simulator = Simulator::new(model, config)?;
    let result = simulator.simulate(&initial, &timesteps, &[forces])?;

    if let Some(wells) = result.wells.last() {
        for (name, w) in wells {
            info!(
                "{name}: bhp {:.1} bar, surface rate {:.3e} m3/s, phase rates {:?}",
                w.bhp / BAR,
                w.surface_rate,
                w.phase_rates
            );
        }
    }
    if output.write_csv {
        write_all(&output.directory, simulator.model(), &result)
            .with_context(|| format!("writing results to {}", output.directory.display()))?;
    }
    Ok(())
}
