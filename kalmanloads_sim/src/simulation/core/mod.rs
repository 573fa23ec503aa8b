// kalmanloads_sim/src/simulation/core/mod.rs

pub mod pipeline;
pub mod prng;
