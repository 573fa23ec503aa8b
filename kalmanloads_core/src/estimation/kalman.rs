// kalmanloads_core/src/estimation/kalman.rs

//! Discrete-time linear Kalman recursion.
//!
//! Every function here is stateless: the caller owns `x` and `P` and threads
//! them from one step to the next.

use nalgebra::{DMatrix, DVector};

use crate::error::{EstimatorError, Result};
use crate::models::system::LinearSystem;
use crate::types::{Input, Output, State};

/// The result of one predict/update pair.
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanStep {
    /// Posterior state estimate `x⁺`.
    pub x: State,
    /// Posterior covariance `P⁺`.
    pub p: DMatrix<f64>,
    /// Kalman gain used for the correction.
    pub gain: DMatrix<f64>,
    /// Innovation `y - (Yx x⁻ + Yu u)`.
    pub innovation: DVector<f64>,
}

/// Predict step: `x⁻ = Xx x + Xu u`, `P⁻ = Xx P Xxᵀ + Q`.
pub fn predict(
    sys: &LinearSystem,
    x: &State,
    p: &DMatrix<f64>,
    u: &Input,
    q: &DMatrix<f64>,
) -> (State, DMatrix<f64>) {
    let x_pred = &sys.xx * x + &sys.xu * u;
    let p_pred = &sys.xx * p * sys.xx.transpose() + q;
    (x_pred, p_pred)
}

/// Update step for a predicted `(x⁻, P⁻)` and measurement `y`.
///
/// The innovation covariance `S = Yx P⁻ Yxᵀ + R` is factorised with Cholesky;
/// if `S` is not positive definite the step fails with
/// [`EstimatorError::SingularInnovation`] instead of producing NaNs.
pub fn update(
    sys: &LinearSystem,
    x_pred: &State,
    p_pred: &DMatrix<f64>,
    u: &Input,
    y: &Output,
    r: &DMatrix<f64>,
) -> Result<KalmanStep> {
    let innovation = y - sys.output(x_pred, u);

    let pht = p_pred * sys.yx.transpose();
    let s = symmetrize(&sys.yx * &pht + r);
    let chol = s.cholesky().ok_or(EstimatorError::SingularInnovation)?;

    // K = P⁻Yxᵀ S⁻¹, solved as S Kᵀ = Yx P⁻ᵀ.
    let gain = chol.solve(&pht.transpose()).transpose();

    let x = x_pred + &gain * &innovation;
    let n = x.len();
    let p = symmetrize((DMatrix::identity(n, n) - &gain * &sys.yx) * p_pred);

    Ok(KalmanStep {
        x,
        p,
        gain,
        innovation,
    })
}

/// One full predict/update pair.
///
/// # Arguments
/// * `sys`: The discrete-time system.
/// * `u`: Input at the current sample.
/// * `y`: Measurement at the current sample.
/// * `x`, `p`: Previous posterior state and covariance.
/// * `q`, `r`: Process and measurement noise covariances.
pub fn estimate_time_step(
    sys: &LinearSystem,
    u: &Input,
    y: &Output,
    x: &State,
    p: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
) -> Result<KalmanStep> {
    let (x_pred, p_pred) = predict(sys, x, p, u, q);
    update(sys, &x_pred, &p_pred, u, y, r)
}

/// `(A + Aᵀ) / 2`; removes the asymmetry that round-off leaves in covariances.
pub fn symmetrize(m: DMatrix<f64>) -> DMatrix<f64> {
    let t = m.transpose();
    (m + t) * 0.5
}
