// kalmanloads_core/src/prelude.rs

// --- Core Abstractions ---
pub use crate::aero::WindSpeedEstimator;
pub use crate::error::{ErrorKind, EstimatorError, Result};

// --- Core Data Structures ---
pub use crate::channels::layout::{FilterLayout, StateTopology};
pub use crate::channels::{Channel, ChannelLayout};
pub use crate::estimation::series::{ChannelMap, TimeSeriesTable};
pub use crate::models::turbine::{RotorParameters, TowerGeometry, TurbineModel};
pub use crate::types::{Input, Output, State, Trajectory};

// --- Estimation ---
pub use crate::estimation::covariance::{NoiseModel, SigmaOverrides};
pub use crate::estimation::kalman::{estimate_time_step, KalmanStep};
pub use crate::estimation::tower_nacelle::{
    FilterConfig, FilterRun, LoadedMeasurements, MeasurementOptions, PreparedMeasurements,
    TowerNacelleEstimator,
};
pub use crate::models::system::{Discretization, LinearSystem};

// --- Concrete Implementations ---
pub use crate::aero::{AeroTables, TabulatedWsEstimator};
