// kalmanloads_sim/src/error.rs

use std::path::PathBuf;

use kalmanloads_core::error::EstimatorError;
use thiserror::Error;

/// Errors raised while reading inputs, configuring or driving a run.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("I/O error on `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid run configuration: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("invalid turbine model `{path}`: {source}")]
    Model {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("`{path}` has no `{column}` column")]
    MissingColumn { path: PathBuf, column: String },

    #[error("`{path}` contains no data rows")]
    EmptyFile { path: PathBuf },

    #[error("invalid option `{name}`: {reason}")]
    InvalidOption { name: &'static str, reason: String },

    #[error(transparent)]
    Estimator(#[from] EstimatorError),
}

impl SimError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

impl From<figment::Error> for SimError {
    fn from(e: figment::Error) -> Self {
        Self::Config(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
