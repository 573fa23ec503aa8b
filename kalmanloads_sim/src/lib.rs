// kalmanloads_sim/src/lib.rs

// This prelude is for convenience for other files WITHIN the kalmanloads_sim crate.
pub mod prelude;

pub mod cli;
pub mod error;
// This module contains all the run-specific logic: configuration, file
// adapters and the estimation pipeline.
pub mod simulation;
