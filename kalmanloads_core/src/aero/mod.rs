// kalmanloads_core/src/aero/mod.rs

use std::fmt::Debug;

use crate::error::Result;

pub mod interp;
pub mod tabulated;

pub use tabulated::{AeroTables, TabulatedWsEstimator};

/// The contract for any model that recovers the rotor-effective wind speed
/// from the aerodynamic torque.
///
/// The estimator is used as a black box inside the time loop: it returns a
/// point estimate per call and no uncertainty. Failures carry the query
/// values so a run can report exactly which sample could not be resolved.
pub trait WindSpeedEstimator: Debug + Send + Sync {
    /// Finds the wind speed whose aerodynamic torque matches `aero_torque`.
    ///
    /// # Arguments
    /// * `aero_torque`: Aerodynamic torque on the rotor [Nm].
    /// * `pitch`: Blade pitch [deg].
    /// * `rotor_speed`: Rotor speed [rad/s].
    /// * `previous_wind_speed`: Last estimate [m/s]; selects among multiple
    ///   solutions of a non-monotonic torque curve.
    /// * `relaxation`: Weight in [0, 1] given to `previous_wind_speed` in the
    ///   returned value. 0 returns the solution itself.
    fn estimate(
        &self,
        aero_torque: f64,
        pitch: f64,
        rotor_speed: f64,
        previous_wind_speed: f64,
        relaxation: f64,
    ) -> Result<f64>;

    /// Rotor thrust [N] at the given operating point.
    fn thrust(&self, wind_speed: f64, pitch: f64, rotor_speed: f64) -> Result<f64>;
}
