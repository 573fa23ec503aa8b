// kalmanloads_core/src/error.rs

use thiserror::Error;

use crate::channels::Channel;

/// Coarse classification of every failure the estimator can report.
///
/// Configuration and data errors are raised before the time loop starts.
/// Numerical and lookup failures abort the loop at the step where they occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnsupportedConfiguration,
    DataPrecondition,
    NumericalFailure,
    LookupFailure,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimatorError {
    // --- Configuration ---
    #[error("unsupported configuration: {what}")]
    UnsupportedConfiguration { what: String },

    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    // --- Data preconditions ---
    #[error("required channel `{name}` is missing")]
    MissingChannel { name: String },

    #[error("channel `{channel}` is listed more than once in a layout")]
    DuplicateChannel { channel: Channel },

    #[error("unknown channel label `{label}`")]
    UnknownChannel { label: String },

    #[error("time series needs at least 2 samples, found {found}")]
    TooFewSamples { found: usize },

    #[error("time is not strictly increasing at sample {index}")]
    NonMonotonicTime { index: usize },

    #[error("non-uniform sampling at sample {index}: step {dt} s, expected {expected} s")]
    NonUniformSampling { index: usize, dt: f64, expected: f64 },

    #[error("channel `{name}` has {found} samples, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("{what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: String,
        found: String,
    },

    // --- Numerical failures ---
    #[error("{what} is singular")]
    SingularMatrix { what: &'static str },

    #[error("innovation covariance is not positive definite")]
    SingularInnovation,

    #[error("non-finite values in {what}")]
    NonFinite { what: &'static str },

    #[error("time step {step}: {source}")]
    StepFailed {
        step: usize,
        #[source]
        source: Box<EstimatorError>,
    },

    // --- Aerodynamic lookup ---
    #[error(
        "no wind speed reproduces aerodynamic torque {aero_torque} Nm \
         (pitch {pitch} deg, rotor speed {rotor_speed} rad/s)"
    )]
    TorqueOutOfRange {
        aero_torque: f64,
        pitch: f64,
        rotor_speed: f64,
    },

    #[error("{what} = {value} is outside the tabulated range [{min}, {max}]")]
    LookupOutOfTable {
        what: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("invalid aerodynamic table: {reason}")]
    InvalidTable { reason: String },
}

impl EstimatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedConfiguration { .. } | Self::InvalidParameter { .. } => {
                ErrorKind::UnsupportedConfiguration
            }
            Self::MissingChannel { .. }
            | Self::DuplicateChannel { .. }
            | Self::UnknownChannel { .. }
            | Self::TooFewSamples { .. }
            | Self::NonMonotonicTime { .. }
            | Self::NonUniformSampling { .. }
            | Self::LengthMismatch { .. }
            | Self::DimensionMismatch { .. } => ErrorKind::DataPrecondition,
            Self::SingularMatrix { .. } | Self::SingularInnovation | Self::NonFinite { .. } => {
                ErrorKind::NumericalFailure
            }
            Self::StepFailed { source, .. } => source.kind(),
            Self::TorqueOutOfRange { .. }
            | Self::LookupOutOfTable { .. }
            | Self::InvalidTable { .. } => ErrorKind::LookupFailure,
        }
    }

    /// Attaches the index of the time step that failed.
    pub fn at_step(self, step: usize) -> Self {
        match self {
            already @ Self::StepFailed { .. } => already,
            other => Self::StepFailed {
                step,
                source: Box::new(other),
            },
        }
    }

    /// The failing step index, if the error was raised inside the time loop.
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::StepFailed { step, .. } => Some(*step),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EstimatorError>;
