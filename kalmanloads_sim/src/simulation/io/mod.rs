// kalmanloads_sim/src/simulation/io/mod.rs

//! File adapters: turbine model, aerodynamic tables, measurements and results.

pub mod aero_tables;
pub mod delimited;
pub mod export;
pub mod measurements;
pub mod model;
