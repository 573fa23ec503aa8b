// kalmanloads_core/src/estimation/tower_nacelle.rs

use std::f64::consts::{PI, TAU};

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::aero::WindSpeedEstimator;
use crate::channels::layout::{tower_nacelle_layout, FilterLayout, StateTopology};
use crate::channels::{Channel, ChannelLayout};
use crate::error::{EstimatorError, Result};
use crate::estimation::covariance::{apply_overrides, sigmas_from_clean, NoiseModel, SigmaOverrides};
use crate::estimation::kalman::estimate_time_step;
use crate::estimation::series::{ChannelMap, TimeSeriesTable};
use crate::estimation::signal::{add_measurement_noise, moving_average};
use crate::models::system::{build_linear_system, BuildMethod, DiscreteSystem, Discretization, LinearSystem};
use crate::models::tower_nacelle::tower_nacelle_connections;
use crate::models::turbine::TurbineModel;
use crate::types::Trajectory;

// =========================================================================
// == Configuration ==
// =========================================================================

/// Construction-time parameters of the tower/nacelle estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FilterConfig {
    /// Estimate thrust as an augmented state (the only implemented topology).
    pub thrust_in_states: bool,
    /// Number of tower fore-aft shapes in the model (only 1 is implemented).
    pub n_tower_shapes: usize,
    /// Multiplier on the structural damping matrix standing in for
    /// aerodynamic damping. Tuned for one turbine; revisit per model.
    pub aero_damping_factor: f64,
    /// Weight of the previous wind speed in each new estimate.
    pub wse_relaxation: f64,
    pub discretization: Discretization,
    /// Log a progress line every this many steps (0 disables it).
    pub progress_interval: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            thrust_in_states: true,
            n_tower_shapes: 1,
            aero_damping_factor: 3.5,
            wse_relaxation: 0.0,
            discretization: Discretization::Exponential,
            progress_interval: 500,
        }
    }
}

impl FilterConfig {
    fn validate(&self) -> Result<()> {
        if !self.aero_damping_factor.is_finite() || self.aero_damping_factor < 0.0 {
            return Err(EstimatorError::InvalidParameter {
                name: "aero_damping_factor",
                value: self.aero_damping_factor,
                reason: "must be finite and non-negative",
            });
        }
        if !(0.0..=1.0).contains(&self.wse_relaxation) {
            return Err(EstimatorError::InvalidParameter {
                name: "wse_relaxation",
                value: self.wse_relaxation,
                reason: "must lie in [0, 1]",
            });
        }
        Ok(())
    }
}

/// How the filter input is derived from the clean measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementOptions {
    /// Scale on the measurement sigmas for the injected noise (0 = clean).
    pub noise_r_factor: f64,
    /// Smooth the tower-top acceleration with a trailing moving average.
    pub filter_acceleration: bool,
    pub filter_window: usize,
}

impl Default for MeasurementOptions {
    fn default() -> Self {
        Self {
            noise_r_factor: 0.0,
            filter_acceleration: false,
            filter_window: 15,
        }
    }
}

// =========================================================================
// == Stage outputs ==
// =========================================================================

/// Output of [`TowerNacelleEstimator::load_measurements`]: the discretised
/// system and the clean trajectories.
#[derive(Debug, Clone)]
pub struct LoadedMeasurements {
    time: Vec<f64>,
    discrete: DiscreteSystem,
    x_clean: Trajectory,
    y_clean: Trajectory,
    u_clean: Trajectory,
    sigma_x: DVector<f64>,
    sigma_y: DVector<f64>,
}

impl LoadedMeasurements {
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn nt(&self) -> usize {
        self.time.len()
    }

    pub fn dt(&self) -> f64 {
        self.discrete.dt
    }

    pub fn discrete_system(&self) -> &DiscreteSystem {
        &self.discrete
    }

    pub fn x_clean(&self) -> &Trajectory {
        &self.x_clean
    }

    pub fn y_clean(&self) -> &Trajectory {
        &self.y_clean
    }

    pub fn u_clean(&self) -> &Trajectory {
        &self.u_clean
    }

    /// Data-derived state noise levels, before overrides.
    pub fn sigma_x(&self) -> &DVector<f64> {
        &self.sigma_x
    }

    pub fn sigma_y(&self) -> &DVector<f64> {
        &self.sigma_y
    }
}

/// Output of [`TowerNacelleEstimator::prepare_measurements`]: everything the
/// time loop consumes.
#[derive(Debug, Clone)]
pub struct PreparedMeasurements {
    noise: NoiseModel,
    y: Trajectory,
    u: Trajectory,
}

impl PreparedMeasurements {
    pub fn noise(&self) -> &NoiseModel {
        &self.noise
    }

    /// The filter's measurement input (noisy, optionally smoothed).
    pub fn y(&self) -> &Trajectory {
        &self.y
    }

    pub fn u(&self) -> &Trajectory {
        &self.u
    }
}

/// Result of [`TowerNacelleEstimator::time_loop`].
#[derive(Debug, Clone)]
pub struct FilterRun {
    pub states: ChannelLayout,
    pub measurements: ChannelLayout,
    pub x_hat: Trajectory,
    pub y_hat: Trajectory,
    /// Covariance after the last step.
    pub p: DMatrix<f64>,
}

impl FilterRun {
    /// Root-mean-square error of every estimated state against its clean
    /// reference. Azimuth errors are taken on the circle.
    pub fn rms_errors(&self, loaded: &LoadedMeasurements) -> Vec<(Channel, f64)> {
        let nt = self.x_hat.ncols().max(1) as f64;
        self.states
            .channels()
            .iter()
            .enumerate()
            .map(|(i, &channel)| {
                let sum: f64 = self
                    .x_hat
                    .row(i)
                    .iter()
                    .zip(loaded.x_clean.row(i).iter())
                    .map(|(est, reference)| {
                        let mut e = est - reference;
                        if channel == Channel::Azimuth {
                            e = (e + PI).rem_euclid(TAU) - PI;
                        }
                        e * e
                    })
                    .sum();
                (channel, (sum / nt).sqrt())
            })
            .collect()
    }
}

// =========================================================================
// == Estimator ==
// =========================================================================

/// Slots touched by the per-step correction, resolved once at construction.
#[derive(Debug, Clone, Copy)]
struct CorrectionSlots {
    x_psi: usize,
    x_omega: usize,
    x_thrust: usize,
    x_qaero: usize,
    x_ws: usize,
    y_pitch: usize,
    y_acc: usize,
}

/// Kalman estimator of tower-top motion, rotor loads and wind speed, with
/// thrust and wind speed corrected by a wind-speed estimator after every step.
///
/// A run goes through four stages, each consuming the previous one's output:
/// [`load_measurements`](Self::load_measurements) →
/// [`prepare_time_stepping`](Self::prepare_time_stepping) →
/// [`prepare_measurements`](Self::prepare_measurements) →
/// [`time_loop`](Self::time_loop).
#[derive(Debug)]
pub struct TowerNacelleEstimator {
    config: FilterConfig,
    layout: FilterLayout,
    system: LinearSystem,
    wse: Box<dyn WindSpeedEstimator>,
    slots: CorrectionSlots,
}

impl TowerNacelleEstimator {
    pub fn new(
        model: &TurbineModel,
        wse: Box<dyn WindSpeedEstimator>,
        config: FilterConfig,
    ) -> Result<Self> {
        config.validate()?;
        model.validate()?;

        let layout = tower_nacelle_layout(StateTopology::from_flag(config.thrust_in_states))?;
        let conn = tower_nacelle_connections(&layout, config.n_tower_shapes)?;
        if model.n_dof() != layout.n_dof() {
            return Err(EstimatorError::DimensionMismatch {
                what: "turbine model degrees of freedom",
                expected: format!("{} (tower shapes + azimuth)", layout.n_dof()),
                found: model.n_dof().to_string(),
            });
        }

        let damping = model.damping_matrix() * config.aero_damping_factor;
        let system = build_linear_system(
            &model.mass_matrix(),
            &damping,
            &model.stiffness_matrix(),
            &conn,
            BuildMethod::AugmentedFirstOrder,
        )?;

        let slots = CorrectionSlots {
            x_psi: layout.states.require(Channel::Azimuth)?,
            x_omega: layout.states.require(Channel::RotorSpeed)?,
            x_thrust: layout.states.require(Channel::Thrust)?,
            x_qaero: layout.states.require(Channel::AeroTorque)?,
            x_ws: layout.states.require(Channel::WindSpeed)?,
            y_pitch: layout.measurements.require(Channel::Pitch)?,
            y_acc: layout.measurements.require(Channel::TowerTopAcceleration)?,
        };

        log::info!(
            "Tower/nacelle estimator: {} states, {} inputs, {} measurements (damping x{})",
            layout.n_states(),
            layout.n_inputs(),
            layout.n_measurements(),
            config.aero_damping_factor
        );

        Ok(Self {
            config,
            layout,
            system,
            wse,
            slots,
        })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn layout(&self) -> &FilterLayout {
        &self.layout
    }

    /// The continuous-time system.
    pub fn system(&self) -> &LinearSystem {
        &self.system
    }

    /// Checks sampling, discretises the system at the file's `dt` and
    /// extracts the clean state, measurement and input trajectories.
    pub fn load_measurements(
        &self,
        table: &TimeSeriesTable,
        map: &ChannelMap,
    ) -> Result<LoadedMeasurements> {
        let dt = table.uniform_dt()?;
        let x_clean = table.trajectory(&self.layout.states, map)?;
        let y_clean = table.trajectory(&self.layout.measurements, map)?;
        let u_clean = table.trajectory(&self.layout.inputs, map)?;
        let discrete = self.system.discretize(dt, self.config.discretization)?;

        log::info!("Loaded {} samples, dt = {} s", table.nt(), dt);

        Ok(LoadedMeasurements {
            time: table.time().to_vec(),
            discrete,
            sigma_x: sigmas_from_clean(&x_clean, 1.0),
            sigma_y: sigmas_from_clean(&y_clean, 1.0),
            x_clean,
            y_clean,
            u_clean,
        })
    }

    /// Builds `P0`, `Q` and `R` from the data-derived sigmas and any overrides.
    pub fn prepare_time_stepping(
        &self,
        loaded: &LoadedMeasurements,
        overrides: &SigmaOverrides,
    ) -> Result<NoiseModel> {
        let mut sigma_x = loaded.sigma_x.clone();
        let mut sigma_y = loaded.sigma_y.clone();
        apply_overrides(&mut sigma_x, &self.layout.states, &overrides.states)?;
        apply_overrides(&mut sigma_y, &self.layout.measurements, &overrides.measurements)?;

        for (name, sigma) in self.layout.states.labels().zip(sigma_x.iter()) {
            log::debug!("sigma_x[{name}] = {sigma:e}");
        }
        for (name, sigma) in self.layout.measurements.labels().zip(sigma_y.iter()) {
            log::debug!("sigma_y[{name}] = {sigma:e}");
        }
        Ok(NoiseModel::from_sigmas(sigma_x, sigma_y))
    }

    /// Produces the filter's measurement input: clean measurements plus
    /// `noise_r_factor · σy` Gaussian noise, then the optional acceleration
    /// smoothing.
    pub fn prepare_measurements<R: Rng + ?Sized>(
        &self,
        loaded: &LoadedMeasurements,
        noise: NoiseModel,
        options: &MeasurementOptions,
        rng: &mut R,
    ) -> Result<PreparedMeasurements> {
        if !options.noise_r_factor.is_finite() || options.noise_r_factor < 0.0 {
            return Err(EstimatorError::InvalidParameter {
                name: "noise_r_factor",
                value: options.noise_r_factor,
                reason: "must be finite and non-negative",
            });
        }
        let mut y = add_measurement_noise(
            &loaded.y_clean,
            &noise.sigma_y,
            options.noise_r_factor,
            rng,
        );
        if options.filter_acceleration {
            let row = self.slots.y_acc;
            let raw: Vec<f64> = y.row(row).iter().copied().collect();
            let smoothed = moving_average(&raw, options.filter_window);
            for (j, v) in smoothed.into_iter().enumerate() {
                y[(row, j)] = v;
            }
            log::info!(
                "Tower-top acceleration smoothed over {} samples",
                options.filter_window
            );
        }
        Ok(PreparedMeasurements {
            noise,
            y,
            u: loaded.u_clean.clone(),
        })
    }

    /// Runs the filter over the whole series, warm-started from the first
    /// clean state sample.
    ///
    /// Any failure aborts the run and is reported with the step index.
    pub fn time_loop(
        &self,
        loaded: &LoadedMeasurements,
        prepared: &PreparedMeasurements,
    ) -> Result<FilterRun> {
        let nt = loaded.nt();
        let sys = &loaded.discrete.system;
        let mut x_hat = Trajectory::zeros(self.layout.n_states(), nt);
        let mut y_hat = Trajectory::zeros(self.layout.n_measurements(), nt);

        let mut x: DVector<f64> = loaded.x_clean.column(0).into_owned();
        let mut p = prepared.noise.p0.clone();
        x_hat.set_column(0, &x);
        y_hat.set_column(0, &sys.output(&x, &prepared.u.column(0).into_owned()));

        for it in 0..nt.saturating_sub(1) {
            if let Some(line) = self.progress_line(it, nt, loaded.time[it], &x) {
                log::info!("{line}");
            }

            let u: DVector<f64> = prepared.u.column(it).into_owned();
            let y: DVector<f64> = prepared.y.column(it).into_owned();
            (x, p) = self
                .step(sys, &u, &y, &x, &p, &prepared.noise)
                .map_err(|e| e.at_step(it))?;

            x_hat.set_column(it + 1, &x);
            y_hat.set_column(it + 1, &sys.output(&x, &u));
        }

        Ok(FilterRun {
            states: self.layout.states.clone(),
            measurements: self.layout.measurements.clone(),
            x_hat,
            y_hat,
            p,
        })
    }

    /// Progress report for step `it`, built from the state entering that
    /// step. `None` between reporting intervals.
    pub fn progress_line(
        &self,
        it: usize,
        nt: usize,
        time: f64,
        x: &DVector<f64>,
    ) -> Option<String> {
        let every = self.config.progress_interval;
        if every == 0 || it % every != 0 {
            return None;
        }
        Some(format!(
            "Step {}/{} (t = {:.2} s): WS = {:.2} m/s, thrust = {:.1} kN",
            it,
            nt,
            time,
            x[self.slots.x_ws],
            x[self.slots.x_thrust] / 1000.0
        ))
    }

    /// Kalman step followed by the wind-speed/thrust override and the azimuth wrap.
    fn step(
        &self,
        sys: &LinearSystem,
        u: &DVector<f64>,
        y: &DVector<f64>,
        x: &DVector<f64>,
        p: &DMatrix<f64>,
        noise: &NoiseModel,
    ) -> Result<(DVector<f64>, DMatrix<f64>)> {
        let s = self.slots;
        let mut next = estimate_time_step(sys, u, y, x, p, &noise.q, &noise.r)?;
        check_finite(&next.x, &next.p)?;
        let x = &mut next.x;

        // Thrust and wind speed are overwritten; P is left untouched for them.
        let pitch = y[s.y_pitch];
        let omega = x[s.x_omega];
        let wind_speed = self.wse.estimate(
            x[s.x_qaero],
            pitch,
            omega,
            x[s.x_ws],
            self.config.wse_relaxation,
        )?;
        let thrust = self.wse.thrust(wind_speed, pitch, omega)?;
        x[s.x_ws] = wind_speed;
        x[s.x_thrust] = thrust;
        x[s.x_psi] = wrap_angle(x[s.x_psi]);

        // Again, for values the wind-speed estimator wrote.
        check_finite(&next.x, &next.p)?;
        Ok((next.x, next.p))
    }
}

fn check_finite(x: &DVector<f64>, p: &DMatrix<f64>) -> Result<()> {
    if x.iter().any(|v| !v.is_finite()) {
        return Err(EstimatorError::NonFinite { what: "state" });
    }
    if p.iter().any(|v| !v.is_finite()) {
        return Err(EstimatorError::NonFinite { what: "covariance" });
    }
    Ok(())
}

/// Wraps an angle into `[0, 2π)`.
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs.
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_angle_stays_in_range() {
        assert_eq!(wrap_angle(0.0), 0.0);
        assert!((wrap_angle(TAU + 1.0) - 1.0).abs() < 1e-12);
        assert!((wrap_angle(-1.0) - (TAU - 1.0)).abs() < 1e-12);
        let tiny = wrap_angle(-1e-18);
        assert!((0.0..TAU).contains(&tiny));
    }

    #[test]
    fn config_validation() {
        let bad = FilterConfig {
            wse_relaxation: 1.5,
            ..FilterConfig::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(EstimatorError::InvalidParameter { name: "wse_relaxation", .. })
        ));
        assert!(FilterConfig::default().validate().is_ok());
    }
}
