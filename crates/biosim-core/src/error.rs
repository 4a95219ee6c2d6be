//! Error types for the simulation.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Geography error: {0}")]
    Geography(#[from] GeographyError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

/// Reasons a geography description cannot be turned into an island.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeographyError {
    #[error("geography contains no rows")]
    Empty,

    #[error("unknown landscape code {found:?} at row {row}, column {col}")]
    UnknownLandscape { row: usize, col: usize, found: char },

    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("border cell at row {row}, column {col} is {found:?}, the island must be surrounded by ocean")]
    OpenBorder { row: usize, col: usize, found: char },
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
