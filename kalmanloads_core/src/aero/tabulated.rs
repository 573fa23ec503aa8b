// kalmanloads_core/src/aero/tabulated.rs

use nalgebra::DMatrix;

use crate::aero::interp::BilinearTable;
use crate::aero::WindSpeedEstimator;
use crate::error::{EstimatorError, Result};
use crate::models::turbine::RotorParameters;

/// Power and thrust coefficient surfaces over tip-speed ratio and pitch.
///
/// Both surfaces are indexed `(lambda, pitch)`: one row per tip-speed ratio,
/// one column per pitch angle [deg].
#[derive(Debug, Clone, PartialEq)]
pub struct AeroTables {
    pub lambda: Vec<f64>,
    pub pitch: Vec<f64>,
    pub cp: DMatrix<f64>,
    pub ct: DMatrix<f64>,
}

/// Wind-speed estimator backed by tabulated rotor performance.
///
/// Torque is `Q = ½ρAV³·CP(λ, pitch)/ω` with `λ = ωR/V`. The inverse problem
/// is solved by scanning a wind-speed grid for crossings of the requested
/// torque and refining each crossing linearly.
#[derive(Debug, Clone)]
pub struct TabulatedWsEstimator {
    rotor: RotorParameters,
    cp: BilinearTable,
    ct: BilinearTable,
    wind_speeds: Vec<f64>,
}

const TSR: &str = "tip speed ratio";
const PITCH: &str = "pitch";

impl TabulatedWsEstimator {
    pub const DEFAULT_WS_MIN: f64 = 0.5;
    pub const DEFAULT_WS_MAX: f64 = 40.0;
    pub const DEFAULT_WS_STEP: f64 = 0.1;

    pub fn new(rotor: RotorParameters, tables: AeroTables) -> Result<Self> {
        if !(rotor.radius > 0.0 && rotor.air_density > 0.0) {
            return Err(EstimatorError::InvalidParameter {
                name: "rotor",
                value: rotor.radius.min(rotor.air_density),
                reason: "radius and air density must be positive",
            });
        }
        let AeroTables {
            lambda,
            pitch,
            cp,
            ct,
        } = tables;
        let cp = BilinearTable::new(lambda.clone(), pitch.clone(), cp, TSR, PITCH)?;
        let ct = BilinearTable::new(lambda, pitch, ct, TSR, PITCH)?;

        let mut estimator = Self {
            rotor,
            cp,
            ct,
            wind_speeds: Vec::new(),
        };
        estimator.set_wind_speed_grid(
            Self::DEFAULT_WS_MIN,
            Self::DEFAULT_WS_MAX,
            Self::DEFAULT_WS_STEP,
        )?;
        Ok(estimator)
    }

    /// Replaces the wind-speed grid scanned by [`WindSpeedEstimator::estimate`].
    pub fn set_wind_speed_grid(&mut self, min: f64, max: f64, step: f64) -> Result<()> {
        if !(min > 0.0 && max > min && step > 0.0) {
            return Err(EstimatorError::InvalidParameter {
                name: "wind_speed_grid",
                value: step,
                reason: "expected 0 < min < max and a positive step",
            });
        }
        let n = ((max - min) / step).round() as usize;
        self.wind_speeds = (0..=n).map(|i| min + i as f64 * step).collect();
        Ok(())
    }

    pub fn rotor(&self) -> &RotorParameters {
        &self.rotor
    }

    pub fn tip_speed_ratio(&self, wind_speed: f64, rotor_speed: f64) -> f64 {
        rotor_speed * self.rotor.radius / wind_speed
    }

    pub fn power_coefficient(&self, lambda: f64, pitch: f64) -> Result<f64> {
        self.cp.eval(lambda, pitch)
    }

    pub fn thrust_coefficient(&self, lambda: f64, pitch: f64) -> Result<f64> {
        self.ct.eval(lambda, pitch)
    }

    /// Aerodynamic torque [Nm] at the given operating point.
    pub fn aero_torque(&self, wind_speed: f64, pitch: f64, rotor_speed: f64) -> Result<f64> {
        check_operating_point(wind_speed, rotor_speed)?;
        let lambda = self.tip_speed_ratio(wind_speed, rotor_speed);
        let cp = self.cp.eval(lambda, pitch)?;
        Ok(self.dynamic_force(wind_speed) * wind_speed * cp / rotor_speed)
    }

    /// `½ρAV²`
    fn dynamic_force(&self, wind_speed: f64) -> f64 {
        0.5 * self.rotor.air_density * self.rotor.swept_area() * wind_speed * wind_speed
    }

    /// All wind speeds on the grid where the torque curve crosses `aero_torque`.
    fn torque_crossings(&self, aero_torque: f64, pitch: f64, rotor_speed: f64) -> Vec<f64> {
        let residuals: Vec<Option<f64>> = self
            .wind_speeds
            .iter()
            .map(|&ws| {
                let lambda = self.tip_speed_ratio(ws, rotor_speed);
                if !self.cp.contains_x(lambda) {
                    return None;
                }
                self.aero_torque(ws, pitch, rotor_speed)
                    .ok()
                    .map(|q| q - aero_torque)
            })
            .collect();

        let mut roots = Vec::new();
        for (i, pair) in residuals.windows(2).enumerate() {
            let (Some(f0), Some(f1)) = (pair[0], pair[1]) else {
                continue;
            };
            let (ws0, ws1) = (self.wind_speeds[i], self.wind_speeds[i + 1]);
            if f0 == 0.0 {
                roots.push(ws0);
            } else if f0 * f1 < 0.0 {
                roots.push(ws0 + (ws1 - ws0) * f0 / (f0 - f1));
            }
        }
        // The loop above only tests left ends; a root sitting on the last knot is caught here.
        if let (Some(Some(f)), Some(&ws)) = (residuals.last(), self.wind_speeds.last()) {
            if *f == 0.0 {
                roots.push(ws);
            }
        }
        roots
    }
}

fn check_operating_point(wind_speed: f64, rotor_speed: f64) -> Result<()> {
    if !(wind_speed > 0.0 && wind_speed.is_finite()) {
        return Err(EstimatorError::LookupOutOfTable {
            what: "wind speed",
            value: wind_speed,
            min: 0.0,
            max: f64::INFINITY,
        });
    }
    if !(rotor_speed > 0.0 && rotor_speed.is_finite()) {
        return Err(EstimatorError::LookupOutOfTable {
            what: "rotor speed",
            value: rotor_speed,
            min: 0.0,
            max: f64::INFINITY,
        });
    }
    Ok(())
}

impl WindSpeedEstimator for TabulatedWsEstimator {
    fn estimate(
        &self,
        aero_torque: f64,
        pitch: f64,
        rotor_speed: f64,
        previous_wind_speed: f64,
        relaxation: f64,
    ) -> Result<f64> {
        if !(0.0..=1.0).contains(&relaxation) {
            return Err(EstimatorError::InvalidParameter {
                name: "relaxation",
                value: relaxation,
                reason: "must lie in [0, 1]",
            });
        }
        let out_of_range = || EstimatorError::TorqueOutOfRange {
            aero_torque,
            pitch,
            rotor_speed,
        };
        if !aero_torque.is_finite() || !(rotor_speed > 0.0 && rotor_speed.is_finite()) {
            return Err(out_of_range());
        }
        self.cp.check_y(pitch)?;

        let roots = self.torque_crossings(aero_torque, pitch, rotor_speed);
        let seed = if previous_wind_speed.is_finite() {
            previous_wind_speed
        } else {
            roots.first().copied().unwrap_or(f64::NAN)
        };
        let nearest = roots
            .into_iter()
            .min_by(|a, b| (a - seed).abs().total_cmp(&(b - seed).abs()))
            .ok_or_else(out_of_range)?;

        if relaxation > 0.0 && previous_wind_speed.is_finite() {
            Ok(relaxation * previous_wind_speed + (1.0 - relaxation) * nearest)
        } else {
            Ok(nearest)
        }
    }

    fn thrust(&self, wind_speed: f64, pitch: f64, rotor_speed: f64) -> Result<f64> {
        check_operating_point(wind_speed, rotor_speed)?;
        let lambda = self.tip_speed_ratio(wind_speed, rotor_speed);
        let ct = self.ct.eval(lambda, pitch)?;
        Ok(self.dynamic_force(wind_speed) * ct)
    }
}
