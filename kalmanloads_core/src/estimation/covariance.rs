// kalmanloads_core/src/estimation/covariance.rs

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::channels::{Channel, ChannelLayout};
use crate::error::{EstimatorError, Result};
use crate::types::Trajectory;

/// Population standard deviation (`ddof = 0`).
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

/// Rounds a signal's spread down to a noise level one decade below its
/// order of magnitude: `factor · 10^(floor(log10 σ) - 1)`.
///
/// A constant signal (σ = 0) gets `factor`.
pub fn noise_level_from_std(std: f64, factor: f64) -> f64 {
    if std > 0.0 {
        factor * 10f64.powf(std.log10().floor() - 1.0)
    } else {
        factor
    }
}

/// Default noise level of every channel (row) of a clean trajectory.
pub fn sigmas_from_clean(clean: &Trajectory, factor: f64) -> DVector<f64> {
    DVector::from_iterator(
        clean.nrows(),
        clean.row_iter().map(|row| {
            let values: Vec<f64> = row.iter().copied().collect();
            noise_level_from_std(std_dev(&values), factor)
        }),
    )
}

/// Externally supplied standard deviations, keyed by channel.
///
/// Each entry replaces the data-derived value for that channel only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigmaOverrides {
    #[serde(default)]
    pub states: BTreeMap<Channel, f64>,
    #[serde(default)]
    pub measurements: BTreeMap<Channel, f64>,
}

impl SigmaOverrides {
    pub fn is_empty(&self) -> bool {
        self.states.is_empty() && self.measurements.is_empty()
    }
}

/// Writes `overrides` into `sigmas`, whose slots follow `layout`.
pub fn apply_overrides(
    sigmas: &mut DVector<f64>,
    layout: &ChannelLayout,
    overrides: &BTreeMap<Channel, f64>,
) -> Result<()> {
    for (&channel, &sigma) in overrides {
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(EstimatorError::InvalidParameter {
                name: "sigma",
                value: sigma,
                reason: "standard deviations must be finite and non-negative",
            });
        }
        let slot = layout.require(channel)?;
        log::debug!("Sigma override for {}: {:e}", channel, sigma);
        sigmas[slot] = sigma;
    }
    Ok(())
}

/// Initial state covariance and the fixed noise covariances of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseModel {
    /// Initial state covariance `P0`.
    pub p0: DMatrix<f64>,
    /// Process noise covariance `Q = diag(σx²)`.
    pub q: DMatrix<f64>,
    /// Measurement noise covariance `R = diag(σy²)`.
    pub r: DMatrix<f64>,
    pub sigma_x: DVector<f64>,
    pub sigma_y: DVector<f64>,
}

impl NoiseModel {
    /// `P0 = I`, `Q = diag(σx²)`, `R = diag(σy²)`.
    pub fn from_sigmas(sigma_x: DVector<f64>, sigma_y: DVector<f64>) -> Self {
        let n = sigma_x.len();
        Self {
            p0: DMatrix::identity(n, n),
            q: DMatrix::from_diagonal(&sigma_x.map(|s| s * s)),
            r: DMatrix::from_diagonal(&sigma_y.map(|s| s * s)),
            sigma_x,
            sigma_y,
        }
    }
}
