// kalmanloads_sim/src/prelude.rs

// Re-export the entire kalmanloads_core prelude so the estimator types are
// available from one import.
pub use kalmanloads_core::prelude::*;

// Run-specific types. The sim error type is re-exported under its own name
// so it does not shadow the core `Result` alias.
pub use crate::cli::Cli;
pub use crate::error::SimError;
pub use crate::simulation::config::{FilesConfig, MeasurementsConfig, RunConfig};
pub use crate::simulation::core::pipeline::{run_simulation, RunArtifacts, TowerMoments};
pub use crate::simulation::core::prng::SimulationRng;
pub use crate::simulation::io::export::{read_results, write_results, ResultsTable};
