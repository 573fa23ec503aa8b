// kalmanloads_core/src/models/turbine.rs

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::aero::interp::interp1;
use crate::error::{EstimatorError, Result};

/// Rotor data needed by the aerodynamic lookup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RotorParameters {
    /// Rotor radius [m].
    pub radius: f64,
    /// Air density [kg/m^3].
    #[serde(default = "default_air_density")]
    pub air_density: f64,
}

fn default_air_density() -> f64 {
    1.225
}

impl RotorParameters {
    pub fn swept_area(&self) -> f64 {
        std::f64::consts::PI * self.radius * self.radius
    }
}

/// Distributed tower properties along the span, measured from the tower base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TowerGeometry {
    /// Span stations [m], strictly increasing.
    pub span: Vec<f64>,
    /// Fore-aft bending stiffness EI at each station [Nm^2].
    pub bending_stiffness: Vec<f64>,
    /// Curvature of the first fore-aft tower mode at each station [1/m],
    /// normalised to unit tower-top displacement.
    pub curvature: Vec<f64>,
}

/// Mechanical and geometric description of a turbine, as produced by an
/// external aeroelastic model reduction.
///
/// The generalized coordinates are `q = [ut1, psi]` for one tower shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TurbineModel {
    /// Mass matrix, row-major.
    pub mass: Vec<Vec<f64>>,
    /// Damping matrix, row-major.
    pub damping: Vec<Vec<f64>>,
    /// Stiffness matrix, row-major.
    pub stiffness: Vec<Vec<f64>>,
    /// Gearbox ratio (generator speed / rotor speed).
    pub gear_ratio: f64,
    /// Height of the tower base above the reference [m].
    pub tower_base_height: f64,
    pub rotor: RotorParameters,
    pub tower: TowerGeometry,
    /// Absolute heights of the tower strain gauges [m].
    #[serde(default)]
    pub gauge_heights: Vec<f64>,
}

impl TurbineModel {
    /// Number of second-order degrees of freedom.
    pub fn n_dof(&self) -> usize {
        self.mass.len()
    }

    pub fn validate(&self) -> Result<()> {
        let n = self.n_dof();
        if n == 0 {
            return Err(EstimatorError::DimensionMismatch {
                what: "mass matrix",
                expected: "at least 1x1".into(),
                found: "0x0".into(),
            });
        }
        for (what, rows) in [
            ("mass matrix", &self.mass),
            ("damping matrix", &self.damping),
            ("stiffness matrix", &self.stiffness),
        ] {
            square_rows(what, rows, n)?;
        }

        let stations = self.tower.span.len();
        for (what, values) in [
            ("tower bending stiffness", &self.tower.bending_stiffness),
            ("tower mode curvature", &self.tower.curvature),
        ] {
            if values.len() != stations {
                return Err(EstimatorError::DimensionMismatch {
                    what,
                    expected: format!("{stations} stations"),
                    found: format!("{} stations", values.len()),
                });
            }
        }
        if stations < 2 || self.tower.span.windows(2).any(|w| w[1] <= w[0]) {
            return Err(EstimatorError::InvalidTable {
                reason: "tower span must have at least 2 strictly increasing stations".into(),
            });
        }
        if !self.gear_ratio.is_finite() || self.gear_ratio <= 0.0 {
            return Err(EstimatorError::InvalidParameter {
                name: "gear_ratio",
                value: self.gear_ratio,
                reason: "must be positive",
            });
        }
        Ok(())
    }

    pub fn mass_matrix(&self) -> DMatrix<f64> {
        to_matrix(&self.mass)
    }

    pub fn damping_matrix(&self) -> DMatrix<f64> {
        to_matrix(&self.damping)
    }

    pub fn stiffness_matrix(&self) -> DMatrix<f64> {
        to_matrix(&self.stiffness)
    }

    /// Gauge heights measured from the tower base.
    pub fn gauge_stations(&self) -> Vec<f64> {
        self.gauge_heights
            .iter()
            .map(|z| z - self.tower_base_height)
            .collect()
    }

    /// Factor `EI(z)·κ(z)/1000` per gauge, mapping tower-top displacement [m]
    /// to fore-aft bending moment [kNm].
    pub fn moment_coefficients(&self) -> Vec<f64> {
        let t = &self.tower;
        self.gauge_stations()
            .into_iter()
            .map(|z| {
                let ei = interp1(&t.span, &t.bending_stiffness, z);
                let kappa = interp1(&t.span, &t.curvature, z);
                ei * kappa / 1000.0
            })
            .collect()
    }

    /// Bending moments [kNm] at each gauge for a tower-top displacement history.
    pub fn bending_moments(&self, tower_top_displacement: &[f64]) -> Vec<Vec<f64>> {
        self.moment_coefficients()
            .into_iter()
            .map(|c| tower_top_displacement.iter().map(|u| u * c).collect())
            .collect()
    }
}

fn square_rows(what: &'static str, rows: &[Vec<f64>], n: usize) -> Result<()> {
    if rows.len() != n || rows.iter().any(|r| r.len() != n) {
        let cols = rows.first().map_or(0, |r| r.len());
        return Err(EstimatorError::DimensionMismatch {
            what,
            expected: format!("{n}x{n}"),
            found: format!("{}x{}", rows.len(), cols),
        });
    }
    Ok(())
}

fn to_matrix(rows: &[Vec<f64>]) -> DMatrix<f64> {
    let n = rows.len();
    let m = rows.first().map_or(0, |r| r.len());
    DMatrix::from_fn(n, m, |i, j| rows[i][j])
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) fn two_dof_model() -> TurbineModel {
        TurbineModel {
            mass: vec![vec![4.0e5, 0.0], vec![0.0, 3.5e7]],
            damping: vec![vec![2.0e3, 0.0], vec![0.0, 0.0]],
            stiffness: vec![vec![1.6e6, 0.0], vec![0.0, 0.0]],
            gear_ratio: 97.0,
            tower_base_height: 10.0,
            rotor: RotorParameters {
                radius: 63.0,
                air_density: 1.225,
            },
            tower: TowerGeometry {
                span: vec![0.0, 40.0, 80.0],
                bending_stiffness: vec![6.0e11, 4.0e11, 2.0e11],
                curvature: vec![4.0e-4, 2.0e-4, 0.0],
            },
            gauge_heights: vec![10.0, 30.0, 100.0],
        }
    }

    #[test]
    fn validation_accepts_consistent_model() {
        assert!(two_dof_model().validate().is_ok());
    }

    #[test]
    fn validation_rejects_ragged_matrices() {
        let mut model = two_dof_model();
        model.stiffness[1].pop();
        assert!(matches!(
            model.validate(),
            Err(EstimatorError::DimensionMismatch { what: "stiffness matrix", .. })
        ));
    }

    #[test]
    fn moment_coefficients_interpolate_along_span() {
        let model = two_dof_model();
        let coeffs = model.moment_coefficients();
        assert_eq!(coeffs.len(), 3);
        // Gauge at the base: EI=6e11, kappa=4e-4.
        assert_relative_eq!(coeffs[0], 6.0e11 * 4.0e-4 / 1000.0);
        // Gauge at z=20: EI=5e11, kappa=3e-4.
        assert_relative_eq!(coeffs[1], 5.0e11 * 3.0e-4 / 1000.0);
        // Above the span the end value (zero curvature) is held.
        assert_relative_eq!(coeffs[2], 0.0);

        let moments = model.bending_moments(&[0.1, 0.2]);
        assert_relative_eq!(moments[0][1], 0.2 * coeffs[0]);
    }
}
