//! Error types for rivulet

use thiserror::Error;

/// Main error type for rivulet operations.
///
/// Every routing and topology error is fatal for the run that raised it:
/// callers propagate it to the driver, which logs and stops.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid grid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in grid of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Grid size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    /// A required parameter or array was not supplied, or is out of its valid range.
    #[error("Configuration error in {module}: {reason}")]
    Configuration { module: &'static str, reason: String },

    /// An array's length disagrees with the established cell or reach count.
    #[error("Input size mismatch for {name}: expected {expected}, got {actual}")]
    InputSizeMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A nonlinear solve produced a non-finite value.
    #[error("Numerical divergence in {module} at node {node}: {reason}")]
    NumericalDivergence {
        module: &'static str,
        node: usize,
        reason: String,
    },

    #[error("Topology error at node {node}: {reason}")]
    Topology { node: usize, reason: String },

    #[error("Cycle detected: {unranked} of {total} nodes could not be ranked")]
    CycleDetected { unranked: usize, total: usize },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Boundary exchange failed: {0}")]
    Exchange(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a [`Error::Configuration`] error.
    pub fn config(module: &'static str, reason: impl Into<String>) -> Self {
        Error::Configuration {
            module,
            reason: reason.into(),
        }
    }

    /// Shorthand for an [`Error::InvalidParameter`] error.
    pub fn invalid(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Check that an input slice has the expected length.
pub fn check_len(name: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::InputSizeMismatch {
            name,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Result type alias for rivulet operations
pub type Result<T> = std::result::Result<T, Error>;
