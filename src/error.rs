//! Error types for configuration, table storage and sampling.

use thiserror::Error;

/// Errors raised while reading process configuration.
///
/// All of these are fatal for the process being constructed: no partially
/// configured process is ever returned.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Settings file could not be read
    #[error("Failed to read settings file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Settings document is not valid JSON
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    /// Process names must look like "<model>/<process>"
    #[error("Invalid process name '{0}', expected '<model>/<process>'")]
    InvalidName(String),

    /// No section for the requested model or process
    #[error("No settings section for '{0}'")]
    MissingSection(String),

    /// A required field is absent
    #[error("Missing field '{field}' for '{process}'")]
    MissingField { process: String, field: String },

    /// A field is present but has the wrong type or an invalid value
    #[error("Malformed field '{field}' for '{process}': {reason}")]
    MalformedField {
        process: String,
        field: String,
        reason: String,
    },

    /// No matrix element is known for this process
    #[error("No matrix element registered for process '{0}'")]
    UnknownProcess(String),

    /// Grid bounds or resolution are unusable
    #[error("Invalid grid for '{table}': {reason}")]
    InvalidGrid { table: String, reason: String },
}

/// Errors raised by interpolation tables and the table store.
#[derive(Error, Debug)]
pub enum TableError {
    /// Query against a table that was never filled and has no approximate function
    #[error("Table '{0}' queried before it was filled")]
    NotFilled(String),

    /// Generated values do not match the grid
    #[error("Table '{table}' expects {expected} values, got {provided}")]
    ShapeMismatch {
        table: String,
        expected: usize,
        provided: usize,
    },

    /// A generated value is NaN or infinite and cannot be stored
    #[error("Table '{table}' produced a non-finite value at grid index {index}")]
    NonFinite { table: String, index: usize },

    /// Stored grid differs from the configured grid
    #[error("Stored grid for '{0}' does not match the configured grid")]
    GridMismatch(String),

    /// No record with this name in the store
    #[error("Table '{name}' not found in '{path}'")]
    Missing { name: String, path: String },

    #[error("Table store IO error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Table store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors raised while drawing final states.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SampleError {
    /// Rejection sampling hit its trial cutoff without accepting a candidate
    #[error("Rejection sampling exhausted after {trials} trials (envelope {envelope:e})")]
    Exhausted { trials: usize, envelope: f64 },

    /// Envelope is zero, negative or not finite
    #[error("Invalid sampling envelope {0:e}")]
    InvalidEnvelope(f64),

    /// Kinematics do not allow the requested final state
    #[error("No phase space available at sqrt(s) = {sqrts}")]
    ClosedPhaseSpace { sqrts: f64 },
}
