use thiserror::Error;

use crate::{formats::ParseError, storage::StorageError};

/// Errors aborting the construction of a model.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Found deadlock state ({valuation}). Enable fixing deadlocks to add self-loops.")]
    DeadlockState { valuation: String },
    #[error("Cannot handle model type {0}.")]
    UnsupportedModelType(String),
    #[error("Unsupported model construct: {0}")]
    Unsupported(String),
    #[error("Wrong format: {0}")]
    WrongFormat(String),
    #[error("Row {row} is not a probability distribution (sum is {sum}).")]
    InvalidDistribution { row: usize, sum: String },
    #[error("Model component is missing: {0}.")]
    MissingComponent(&'static str),
    #[error("State remapping is not a bijection: {reason}.")]
    InconsistentRemapping { reason: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

pub type BuildResult<T> = Result<T, BuildError>;
