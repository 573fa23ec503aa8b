// kalmanloads_core/tests/tower_nacelle.rs

use std::collections::BTreeMap;
use std::f64::consts::TAU;
use std::sync::Mutex;

use approx::assert_relative_eq;
use kalmanloads_core::prelude::*;
use nalgebra::{DMatrix, SymmetricEigen};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// --- Scenario: turbine at a steady operating point ---

const MASS: f64 = 4.0e5;
const STIFFNESS: f64 = 1.6e6;
const DAMPING: f64 = 2.0e3;
const THRUST: f64 = 3.2e5;
const TORQUE: f64 = 2.0e6;
const WIND_SPEED: f64 = 11.0;
const OMEGA: f64 = 1.2;
const PITCH: f64 = 2.5;
const DT: f64 = 0.05;

fn model() -> TurbineModel {
    TurbineModel {
        mass: vec![vec![MASS, 0.0], vec![0.0, 3.5e7]],
        damping: vec![vec![DAMPING, 0.0], vec![0.0, 0.0]],
        stiffness: vec![vec![STIFFNESS, 0.0], vec![0.0, 0.0]],
        gear_ratio: 97.0,
        tower_base_height: 0.0,
        rotor: RotorParameters {
            radius: 63.0,
            air_density: 1.225,
        },
        tower: TowerGeometry {
            span: vec![0.0, 90.0],
            bending_stiffness: vec![5.0e11, 1.0e11],
            curvature: vec![3.0e-4, 0.0],
        },
        gauge_heights: vec![20.0],
    }
}

/// Clean records of the steady operating point, in the columns named by the
/// default channel map. The rotor turns through several revolutions.
fn steady_table(nt: usize) -> TimeSeriesTable {
    let time: Vec<f64> = (0..nt).map(|i| i as f64 * DT).collect();
    let mut table = TimeSeriesTable::new(time.clone());
    let constant = |v: f64| vec![v; nt];
    let columns = [
        ("TTDspFA", constant(THRUST / STIFFNESS)),
        ("Azimuth", time.iter().map(|t| (OMEGA * t).rem_euclid(TAU)).collect()),
        ("NcIMUTVxs", constant(0.0)),
        ("RotSpeed", constant(OMEGA)),
        ("RtAeroFxh", constant(THRUST)),
        ("RtAeroMxh", constant(TORQUE)),
        ("GenTq", constant(TORQUE)),
        ("RtVAvgxh", constant(WIND_SPEED)),
        ("BldPitch1", constant(PITCH)),
        ("NcIMUTAxs", constant(0.0)),
    ];
    for (name, values) in columns {
        table.insert(name, values).unwrap();
    }
    table
}

#[derive(Debug)]
struct ConstantWse;

impl WindSpeedEstimator for ConstantWse {
    fn estimate(&self, _: f64, _: f64, _: f64, _: f64, _: f64) -> Result<f64> {
        Ok(WIND_SPEED)
    }

    fn thrust(&self, _: f64, _: f64, _: f64) -> Result<f64> {
        Ok(THRUST)
    }
}

/// Records every query it receives.
#[derive(Debug, Default)]
struct RecordingWse {
    queries: Mutex<Vec<[f64; 5]>>,
}

impl WindSpeedEstimator for RecordingWse {
    fn estimate(&self, q: f64, pitch: f64, omega: f64, ws0: f64, relax: f64) -> Result<f64> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push([q, pitch, omega, ws0, relax]);
        }
        Ok(WIND_SPEED)
    }

    fn thrust(&self, _: f64, _: f64, _: f64) -> Result<f64> {
        Ok(THRUST)
    }
}

#[derive(Debug)]
struct NanWse;

impl WindSpeedEstimator for NanWse {
    fn estimate(&self, _: f64, _: f64, _: f64, _: f64, _: f64) -> Result<f64> {
        Ok(f64::NAN)
    }

    fn thrust(&self, _: f64, _: f64, _: f64) -> Result<f64> {
        Ok(THRUST)
    }
}

#[derive(Debug)]
struct UnreachableTorqueWse;

impl WindSpeedEstimator for UnreachableTorqueWse {
    fn estimate(&self, q: f64, pitch: f64, omega: f64, _: f64, _: f64) -> Result<f64> {
        Err(EstimatorError::TorqueOutOfRange {
            aero_torque: q,
            pitch,
            rotor_speed: omega,
        })
    }

    fn thrust(&self, _: f64, _: f64, _: f64) -> Result<f64> {
        Ok(THRUST)
    }
}

fn estimator(wse: Box<dyn WindSpeedEstimator>) -> TowerNacelleEstimator {
    TowerNacelleEstimator::new(&model(), wse, FilterConfig::default()).unwrap()
}

fn run(
    est: &TowerNacelleEstimator,
    table: &TimeSeriesTable,
    overrides: &SigmaOverrides,
    options: &MeasurementOptions,
    seed: u64,
) -> Result<(LoadedMeasurements, PreparedMeasurements, FilterRun)> {
    let loaded = est.load_measurements(table, &ChannelMap::default())?;
    let noise = est.prepare_time_stepping(&loaded, overrides)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let prepared = est.prepare_measurements(&loaded, noise, options, &mut rng)?;
    let run = est.time_loop(&loaded, &prepared)?;
    Ok((loaded, prepared, run))
}

fn assert_tracks(loaded: &LoadedMeasurements, run: &FilterRun, tol: f64) {
    let psi = run.states.find_idx(Channel::Azimuth).unwrap();
    for it in 0..loaded.nt() {
        for (i, &channel) in run.states.channels().iter().enumerate() {
            let est = run.x_hat[(i, it)];
            let reference = loaded.x_clean()[(i, it)];
            let err = if i == psi {
                let d = (est - reference).rem_euclid(TAU);
                d.min(TAU - d)
            } else {
                (est - reference).abs()
            };
            assert!(
                err <= tol * reference.abs().max(1.0),
                "{channel} at step {it}: estimate {est}, reference {reference}"
            );
        }
    }
}

#[test]
fn tracks_noise_free_steady_state() {
    let est = estimator(Box::new(ConstantWse));
    let table = steady_table(600);
    let (loaded, _, run) = run(
        &est,
        &table,
        &SigmaOverrides::default(),
        &MeasurementOptions::default(),
        0,
    )
    .unwrap();

    assert_eq!(run.x_hat.shape(), (8, 600));
    assert_eq!(run.y_hat.shape(), (4, 600));
    assert_tracks(&loaded, &run, 1e-6);

    // Estimated measurements reproduce the clean ones.
    for it in 1..loaded.nt() {
        for i in 0..4 {
            let reference = loaded.y_clean()[(i, it)];
            assert!((run.y_hat[(i, it)] - reference).abs() <= 1e-6 * reference.abs().max(1.0));
        }
    }

    let rms = run.rms_errors(&loaded);
    assert_eq!(rms.len(), 8);
    assert!(rms.iter().all(|(_, e)| *e < 1e-6));
}

#[test]
fn azimuth_stays_in_one_revolution() {
    let est = estimator(Box::new(ConstantWse));
    // 30 s at 1.2 rad/s is more than five revolutions.
    let (_, _, run) = run(
        &est,
        &steady_table(600),
        &SigmaOverrides::default(),
        &MeasurementOptions::default(),
        0,
    )
    .unwrap();
    let psi = run.states.find_idx(Channel::Azimuth).unwrap();
    assert!(run.x_hat.row(psi).iter().all(|v| (0.0..TAU).contains(v)));
}

#[test]
fn covariance_stays_symmetric_positive_semidefinite() {
    let est = estimator(Box::new(ConstantWse));
    let options = MeasurementOptions {
        noise_r_factor: 1.0,
        ..MeasurementOptions::default()
    };
    let (_, _, run) = run(&est, &steady_table(300), &SigmaOverrides::default(), &options, 3)
        .unwrap();

    assert_relative_eq!(run.p.clone(), run.p.transpose());
    let eig = SymmetricEigen::new(run.p.clone());
    let largest = eig.eigenvalues.max();
    assert!(eig.eigenvalues.iter().all(|l| *l >= -1e-9 * largest));
}

#[test]
fn near_perfect_measurements_track_reference() {
    let est = estimator(Box::new(ConstantWse));
    let overrides = SigmaOverrides {
        states: BTreeMap::new(),
        measurements: BTreeMap::from([
            (Channel::TowerTopAcceleration, 1e-6),
            (Channel::RotorSpeed, 1e-6),
            (Channel::GeneratorTorque, 1e-6),
            (Channel::Pitch, 1e-6),
        ]),
    };
    let (loaded, prepared, run) = run(
        &est,
        &steady_table(200),
        &overrides,
        &MeasurementOptions::default(),
        0,
    )
    .unwrap();
    assert_relative_eq!(prepared.noise().r[(0, 0)], 1e-12);
    assert_tracks(&loaded, &run, 1e-6);
}

#[test]
fn seeded_runs_are_reproducible() {
    let est = estimator(Box::new(ConstantWse));
    let table = steady_table(200);
    let options = MeasurementOptions {
        noise_r_factor: 1.0,
        filter_acceleration: true,
        filter_window: 5,
    };
    let overrides = SigmaOverrides::default();
    let (_, prep_a, a) = run(&est, &table, &overrides, &options, 42).unwrap();
    let (_, prep_b, b) = run(&est, &table, &overrides, &options, 42).unwrap();
    let (_, prep_c, c) = run(&est, &table, &overrides, &options, 43).unwrap();

    assert_eq!(prep_a.y(), prep_b.y());
    assert_eq!(a.x_hat, b.x_hat);
    assert_eq!(a.y_hat, b.y_hat);
    assert_ne!(prep_a.y(), prep_c.y());
    assert_ne!(a.x_hat, c.x_hat);
}

#[test]
fn wind_speed_estimator_sees_filtered_state() {
    let wse = std::sync::Arc::new(RecordingWse::default());
    let est = estimator(Box::new(SharedWse(wse.clone())));
    let nt = 20;
    run(
        &est,
        &steady_table(nt),
        &SigmaOverrides::default(),
        &MeasurementOptions::default(),
        0,
    )
    .unwrap();

    let queries = wse.queries.lock().unwrap();
    assert_eq!(queries.len(), nt - 1);
    let [q, pitch, omega, ws0, relax] = queries[0];
    assert_relative_eq!(q, TORQUE, max_relative = 1e-9);
    assert_eq!(pitch, PITCH);
    assert_relative_eq!(omega, OMEGA, max_relative = 1e-9);
    assert_relative_eq!(ws0, WIND_SPEED, max_relative = 1e-9);
    assert_eq!(relax, 0.0);
}

#[derive(Debug)]
struct SharedWse(std::sync::Arc<RecordingWse>);

impl WindSpeedEstimator for SharedWse {
    fn estimate(&self, q: f64, pitch: f64, omega: f64, ws0: f64, relax: f64) -> Result<f64> {
        self.0.estimate(q, pitch, omega, ws0, relax)
    }

    fn thrust(&self, ws: f64, pitch: f64, omega: f64) -> Result<f64> {
        self.0.thrust(ws, pitch, omega)
    }
}

#[test]
fn damping_factor_scales_structural_damping() {
    let est = estimator(Box::new(ConstantWse));
    // Row/column of ut1dot in the state vector.
    let v = est.layout().states.find_idx(Channel::TowerTopVelocity).unwrap();
    assert_relative_eq!(est.system().xx[(v, v)], -3.5 * DAMPING / MASS, max_relative = 1e-12);

    let undamped = TowerNacelleEstimator::new(
        &model(),
        Box::new(ConstantWse),
        FilterConfig {
            aero_damping_factor: 1.0,
            ..FilterConfig::default()
        },
    )
    .unwrap();
    assert_relative_eq!(undamped.system().xx[(v, v)], -DAMPING / MASS, max_relative = 1e-12);
}

// --- Failure semantics ---

#[test]
fn two_tower_shapes_are_rejected() {
    let config = FilterConfig {
        n_tower_shapes: 2,
        ..FilterConfig::default()
    };
    let err = TowerNacelleEstimator::new(&model(), Box::new(ConstantWse), config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedConfiguration);
}

#[test]
fn thrust_as_input_is_rejected() {
    let config = FilterConfig {
        thrust_in_states: false,
        ..FilterConfig::default()
    };
    let err = TowerNacelleEstimator::new(&model(), Box::new(ConstantWse), config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedConfiguration);
}

#[test]
fn non_finite_state_aborts_at_first_step() {
    let est = estimator(Box::new(NanWse));
    let err = run(
        &est,
        &steady_table(10),
        &SigmaOverrides::default(),
        &MeasurementOptions::default(),
        0,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NumericalFailure);
    assert_eq!(err.step(), Some(0));
    assert!(matches!(
        err,
        EstimatorError::StepFailed { source, .. }
            if *source == EstimatorError::NonFinite { what: "state" }
    ));
}

/// Table-backed estimator with constant coefficients over the whole grid.
fn tabulated_wse() -> TabulatedWsEstimator {
    let tables = AeroTables {
        lambda: (1..=20).map(f64::from).collect(),
        pitch: vec![-5.0, 0.0, 10.0, 30.0],
        cp: DMatrix::from_element(20, 4, 0.45),
        ct: DMatrix::from_element(20, 4, 0.8),
    };
    TabulatedWsEstimator::new(model().rotor, tables).unwrap()
}

#[test]
fn nan_measurement_is_a_numerical_failure_not_a_lookup_failure() {
    let est = estimator(Box::new(tabulated_wse()));
    let mut table = steady_table(10);
    let mut acc = vec![0.0; 10];
    acc[0] = f64::NAN;
    table.insert("NcIMUTAxs", acc).unwrap();

    let err = run(
        &est,
        &table,
        &SigmaOverrides::default(),
        &MeasurementOptions::default(),
        0,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NumericalFailure);
    assert_eq!(err.step(), Some(0));
    assert!(matches!(
        err,
        EstimatorError::StepFailed { source, .. }
            if *source == EstimatorError::NonFinite { what: "state" }
    ));
}

#[test]
fn progress_reports_the_state_entering_the_step() {
    let est = estimator(Box::new(ConstantWse));
    let loaded = est
        .load_measurements(&steady_table(10), &ChannelMap::default())
        .unwrap();
    let x0 = loaded.x_clean().column(0).into_owned();

    let line = est.progress_line(0, 10, 0.0, &x0).unwrap();
    assert!(line.contains("WS = 11.00 m/s"), "{line}");
    assert!(line.contains("thrust = 320.0 kN"), "{line}");
    assert!(est.progress_line(1, 10, DT, &x0).is_none());
    assert!(est.progress_line(500, 1000, 25.0, &x0).is_some());
}

#[test]
fn lookup_failure_carries_query_values() {
    let est = estimator(Box::new(UnreachableTorqueWse));
    let err = run(
        &est,
        &steady_table(10),
        &SigmaOverrides::default(),
        &MeasurementOptions::default(),
        0,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LookupFailure);
    assert_eq!(err.step(), Some(0));
    match err {
        EstimatorError::StepFailed { source, .. } => match *source {
            EstimatorError::TorqueOutOfRange { pitch, .. } => assert_eq!(pitch, PITCH),
            other => panic!("unexpected source {other:?}"),
        },
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn data_preconditions_are_checked_before_the_loop() {
    let est = estimator(Box::new(ConstantWse));

    let mut table = steady_table(10);
    table.retain_rows(|i, _| i != 4);
    let err = est
        .load_measurements(&table, &ChannelMap::default())
        .unwrap_err();
    assert!(matches!(err, EstimatorError::NonUniformSampling { index: 4, .. }));

    let map = ChannelMap::with_overrides(&BTreeMap::from([(
        Channel::TowerTopAcceleration,
        "TwrTopAcc".to_string(),
    )]));
    let err = est.load_measurements(&steady_table(10), &map).unwrap_err();
    assert_eq!(
        err,
        EstimatorError::MissingChannel {
            name: "TwrTopAcc".into()
        }
    );
    assert_eq!(err.kind(), ErrorKind::DataPrecondition);
}
