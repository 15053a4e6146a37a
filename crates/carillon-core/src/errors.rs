//! Error types for carillon-core.

use carillon_dsp::SynthDefError;
use thiserror::Error;

/// Result type alias for carillon-core operations.
pub type Result<T> = std::result::Result<T, CarillonError>;

/// Errors raised by the note pipeline and its collaborators.
#[derive(Debug, Error)]
pub enum CarillonError {
    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// MIDI backend error (enumeration, open, connect).
    #[error("MIDI error: {0}")]
    Midi(String),

    /// No MIDI input matched the requested name.
    #[error("No MIDI device found matching '{0}'")]
    NoMatchingDevice(String),

    /// SynthDef construction or encoding failed.
    #[error("SynthDef error: {0}")]
    SynthDef(#[from] SynthDefError),

    /// OSC packet encoding/decoding failed.
    #[error("OSC error: {0}")]
    Osc(#[from] rosc::OscError),

    /// The server answered a command with `/fail`.
    #[error("Server rejected {command}: {reason}")]
    Rejected { command: String, reason: String },

    /// No reply arrived within the configured timeout.
    #[error("Timed out after {timeout:?} waiting for reply to {command}")]
    Timeout {
        command: String,
        timeout: std::time::Duration,
    },

    /// Socket-level failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}
