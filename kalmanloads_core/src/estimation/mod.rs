// kalmanloads_core/src/estimation/mod.rs

pub mod covariance;
pub mod kalman;
pub mod series;
pub mod signal;
pub mod tower_nacelle;
