// kalmanloads_core/src/lib.rs

// This file defines the public modules of the library.
pub mod aero;
pub mod channels;
pub mod error;
pub mod estimation;
pub mod models;
pub mod prelude;
pub mod types;
