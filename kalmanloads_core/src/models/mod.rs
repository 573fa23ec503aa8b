// kalmanloads_core/src/models/mod.rs

pub mod system;
pub mod tower_nacelle;
pub mod turbine;
