// kalmanloads_core/src/types.rs

use nalgebra::{DMatrix, DVector};

// --- Core Type Aliases ---
pub type State = DVector<f64>;
pub type Input = DVector<f64>;
pub type Output = DVector<f64>;

/// Channel-by-sample storage: one row per channel, one column per time step.
pub type Trajectory = DMatrix<f64>;
