// kalmanloads_sim/src/simulation/core/pipeline.rs

use std::path::PathBuf;

use kalmanloads_core::prelude::*;

use crate::error::Result;
use crate::simulation::config::RunConfig;
use crate::simulation::core::prng::SimulationRng;
use crate::simulation::io::aero_tables::load_files;
use crate::simulation::io::export::{write_results, ResultsTable};
use crate::simulation::io::measurements::{read_measurements, LoadOptions};
use crate::simulation::io::model::load_turbine_model;

/// Reference and estimated fore-aft bending moments [kNm], one series per gauge.
#[derive(Debug, Clone, PartialEq)]
pub struct TowerMoments {
    /// Recorded moments; a gauge without a recorded column is all NaN.
    pub reference: Vec<Vec<f64>>,
    pub estimate: Vec<Vec<f64>>,
}

/// Everything a run produced, stage by stage.
#[derive(Debug)]
pub struct RunArtifacts {
    pub loaded: LoadedMeasurements,
    pub prepared: PreparedMeasurements,
    pub run: FilterRun,
    pub moments: TowerMoments,
    pub rms: Vec<(Channel, f64)>,
    /// The results file, if one was written.
    pub output: Option<PathBuf>,
}

/// Column holding the recorded bending moment of gauge `i` (1-based).
pub fn moment_column(i: usize) -> String {
    format!("TwHt{i}MLyt")
}

/// Runs one estimation end to end:
/// model → estimator → measurements → noise model → filter input → time loop
/// → tower moments → export.
pub fn run_simulation(config: &RunConfig) -> Result<RunArtifacts> {
    let files = &config.files;

    // --- 1. Model and estimator ---
    let model = load_turbine_model(&files.model)?;
    let tables = load_files(&files.aero_tables_base, &files.aero_tables_suffix)?;
    let wse = TabulatedWsEstimator::new(model.rotor, tables)?;
    let estimator = TowerNacelleEstimator::new(&model, Box::new(wse), config.filter.clone())?;

    // --- 2. Measurements ---
    let table = read_measurements(
        &files.measurements,
        &LoadOptions {
            time_range: config.measurements.time_range,
            under_sampling: config.measurements.under_sampling,
            gear_ratio: model.gear_ratio,
        },
    )?;
    let channel_map = ChannelMap::with_overrides(&config.channels);
    let loaded = estimator.load_measurements(&table, &channel_map)?;

    // --- 3. Filter preparation ---
    let noise = estimator.prepare_time_stepping(&loaded, &config.sigmas)?;
    let mut rng = SimulationRng::from_seed(config.seed());
    let prepared = estimator.prepare_measurements(
        &loaded,
        noise,
        &config.measurements.options(),
        &mut rng.0,
    )?;

    // --- 4. Time loop ---
    let run = estimator.time_loop(&loaded, &prepared)?;
    let rms = run.rms_errors(&loaded);
    for (channel, err) in &rms {
        log::info!("RMS error {:>7}: {:e}", channel.label(), err);
    }

    // --- 5. Tower moments ---
    let ut1 = run.states.require(Channel::TowerTopDisplacement)?;
    let ut1_hat: Vec<f64> = run.x_hat.row(ut1).iter().copied().collect();
    let estimate = model.bending_moments(&ut1_hat);
    let reference = (1..=estimate.len())
        .map(|i| match table.column(&moment_column(i)) {
            Some(values) => values.to_vec(),
            None => {
                log::warn!("No `{}` column; reference moment left empty", moment_column(i));
                vec![f64::NAN; loaded.nt()]
            }
        })
        .collect();
    let moments = TowerMoments {
        reference,
        estimate,
    };

    // --- 6. Export ---
    let output = if config.export {
        let path = config.output_path();
        write_results(&path, &results_table(&loaded, &prepared, &run, &moments)?)?;
        Some(path)
    } else {
        None
    };

    Ok(RunArtifacts {
        loaded,
        prepared,
        run,
        moments,
        rms,
        output,
    })
}

/// Column order: time, reference states, estimated states, reference
/// measurements (the filter input), estimated measurements, reference
/// moments, estimated moments.
pub fn results_table(
    loaded: &LoadedMeasurements,
    prepared: &PreparedMeasurements,
    run: &FilterRun,
    moments: &TowerMoments,
) -> Result<ResultsTable> {
    let mut out = ResultsTable::new();
    out.push("time", loaded.time().to_vec())?;

    let row = |m: &Trajectory, i: usize| -> Vec<f64> { m.row(i).iter().copied().collect() };
    let blocks = [
        (&run.states, loaded.x_clean(), "ref"),
        (&run.states, &run.x_hat, "est"),
        (&run.measurements, prepared.y(), "ref"),
        (&run.measurements, &run.y_hat, "est"),
    ];
    for (layout, values, tag) in blocks {
        for (i, label) in layout.labels().enumerate() {
            out.push(format!("{label}_{tag}"), row(values, i))?;
        }
    }
    for (tag, series) in [("ref", &moments.reference), ("est", &moments.estimate)] {
        for (j, values) in series.iter().enumerate() {
            out.push(format!("My_{tag}{j}"), values.clone())?;
        }
    }
    Ok(out)
}
