//! CSV export of simulation results.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use log::info;

use super::csv_writer::write_columns;
use crate::numerics::transient::StepReport;
use crate::physics::FlowSystem;
use crate::simulator::model::ReservoirModel;
use crate::simulator::{SimulationResult, WellResult};

/// One row per report step: time, then BHP, surface rate and surface phase
/// rates of every well.
pub fn write_well_results<P: AsRef<Path>, S: FlowSystem>(
    path: P,
    model: &ReservoirModel<S>,
    result: &SimulationResult,
) -> io::Result<()> {
    let mut headers = vec!["time".to_string()];
    let mut columns = vec![result.times.clone()];
    for well in &model.wells {
        let series = |f: &dyn Fn(&WellResult) -> f64| -> Vec<f64> {
            result.wells.iter().map(|step| step.get(&well.name).map_or(0.0, f)).collect()
        };
        headers.push(format!("{}:bhp", well.name));
        columns.push(series(&|w| w.bhp));
        headers.push(format!("{}:surface_rate", well.name));
        columns.push(series(&|w| w.surface_rate));
        for (i, phase) in model.system.phases().iter().enumerate() {
            headers.push(format!("{}:rate:{}", well.name, phase));
            columns.push(series(&|w| w.phase_rates.get(i).copied().unwrap_or(0.0)));
        }
    }
    write_columns(path, &headers, &columns)
}

/// One row per cell with every named field.
pub fn write_fields<P: AsRef<Path>>(path: P, fields: &BTreeMap<String, Vec<f64>>) -> io::Result<()> {
    let n = fields.values().next().map_or(0, Vec::len);
    let mut headers = vec!["cell".to_string()];
    let mut columns = vec![(0..n).map(|c| c as f64).collect::<Vec<f64>>()];
    for (key, values) in fields {
        headers.push(key.clone());
        columns.push(values.clone());
    }
    write_columns(path, &headers, &columns)
}

/// Solver statistics per report step.
pub fn write_step_reports<P: AsRef<Path>>(path: P, result: &SimulationResult) -> io::Result<()> {
    let column = |f: fn(&StepReport) -> usize| -> Vec<f64> {
        result.reports.iter().map(|r| f(r) as f64).collect()
    };
    write_columns(
        path,
        &["time", "ministeps", "newton_iterations", "linear_iterations", "cuts"],
        &[
            result.times.clone(),
            column(|r| r.ministeps),
            column(|r| r.newton_iterations),
            column(|r| r.linear_iterations),
            column(|r| r.cuts),
        ],
    )
}

/// Write `wells.csv`, `steps.csv` and `fields.csv` (final state) into `dir`.
pub fn write_all<P: AsRef<Path>, S: FlowSystem>(
    dir: P,
    model: &ReservoirModel<S>,
    result: &SimulationResult,
) -> io::Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    write_well_results(dir.join("wells.csv"), model, result)?;
    write_step_reports(dir.join("steps.csv"), result)?;
    if let Some(last) = result.states.last() {
        write_fields(dir.join("fields.csv"), &last.fields(model))?;
    }
    info!("results written to {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_get_a_cell_column() {
        let path = std::env::temp_dir().join("resflow_fields.csv");
        let mut fields = BTreeMap::new();
        fields.insert("Pressure".to_string(), vec![1e7, 2e7, 3e7]);
        fields.insert("Saturation:Aqueous".to_string(), vec![0.1, 0.2, 0.3]);
        write_fields(&path, &fields).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("cell,Pressure,Saturation:Aqueous\n"));
        assert_eq!(content.lines().count(), 4);
        fs::remove_file(path).ok();
    }
}
