//! Error types for the carillon-dsp crate.

use thiserror::Error;

/// Errors that can occur during harmonic table preparation, SynthDef
/// construction and encoding.
#[derive(Error, Debug)]
pub enum SynthDefError {
    /// A parameter was referenced by name but doesn't exist.
    #[error("Unknown parameter: {0}")]
    UnknownParam(String),

    /// Parameters must be declared before any UGen is added.
    #[error("Parameter '{0}' declared after UGens were added")]
    LateParam(String),

    /// A column of the harmonic table sums to zero (or is not finite),
    /// so it cannot be normalized.
    #[error("Cannot normalize column {column}: sum is {sum}")]
    DegenerateTable { column: &'static str, sum: f32 },

    /// A UGen was given an empty input list where at least one is required.
    #[error("UGen {0} needs at least one input")]
    NoInputs(&'static str),

    /// File I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error during binary encoding.
    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// Graph validation failed.
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Result type alias using SynthDefError.
pub type Result<T> = std::result::Result<T, SynthDefError>;
