//! Configuration file support for carillon
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/carillon/config.toml`
//! - macOS: `~/Library/Application Support/carillon/config.toml`
//! - Windows: `%APPDATA%\carillon\config.toml`
//!
//! Every field has a default, so a missing file or a partial file is fine.

use crate::errors::{CarillonError, Result};
use crate::mapper::{EventMapper, DEFAULT_NOTE_DURATION};
use crate::midi::VelocityCurve;
use crate::scheduler::FailurePolicy;
use crate::scsynth::NodeId;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub midi: MidiSettings,
    pub engine: EngineSettings,
    pub instrument: InstrumentSettings,
    pub pipeline: PipelineSettings,
}

impl Config {
    /// Load configuration from the default config file location
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Err(CarillonError::Config(format!(
                "Config file not found at {:?}",
                path
            )))
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no session can run with
    pub fn validate(&self) -> Result<()> {
        let duration = self.instrument.note_duration;
        if !duration.is_finite() || duration <= 0.0 {
            return Err(CarillonError::Config(format!(
                "instrument.note_duration must be a positive number of seconds, got {}",
                duration
            )));
        }
        Ok(())
    }

    /// Load configuration or return default if not found
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                log::debug!("Using default configuration ({})", e);
                Self::default()
            }
        }
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "carillon") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Err(CarillonError::Config(
                "Could not determine config directory".to_string(),
            ))
        }
    }

    /// Write the commented default config to `path`
    pub fn write_default_config_file(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_CONFIG)?;
        Ok(())
    }

    /// Create the commented default config at the default location
    pub fn create_default_config_file() -> Result<PathBuf> {
        let path = Self::config_path()?;
        Self::write_default_config_file(&path)?;
        Ok(path)
    }

    /// Build the note mapper described by `[instrument]`
    pub fn event_mapper(&self) -> EventMapper {
        EventMapper::new(
            self.instrument.note_duration,
            self.instrument.velocity_curve(),
        )
    }
}

const DEFAULT_CONFIG: &str = r#"# carillon configuration file

[midi]
# First MIDI input whose name contains this (case-insensitive) is used
device = "keystation"

[engine]
# Local UDP endpoint (port 0 = ephemeral)
local_addr = "127.0.0.1:0"

# scsynth control port
server_addr = "127.0.0.1:57120"

# Connect/response timeout
timeout = "5s"

# Default group created at startup; notes are added to its tail
group_id = 1

# First synth node ID; IDs increase by one per note
first_node_id = 1000

[instrument]
# SynthDef name registered with the server
synthdef = "bells"

# Note length in seconds
note_duration = 2.0

# Velocity to amplitude: "linear", "exponential", "compressed" or "fixed"
velocity_curve = "linear"

# Amplitude used by the "fixed" curve
fixed_velocity = 0.8

[pipeline]
# What a failed /s_new does: "log" drops the note, "fatal" ends the session
on_instantiate_error = "log"
"#;

/// MIDI input settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiSettings {
    /// Case-insensitive substring of the device name
    pub device: String,
}

impl Default for MidiSettings {
    fn default() -> Self {
        Self {
            device: "keystation".to_string(),
        }
    }
}

/// scsynth connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub local_addr: String,
    pub server_addr: String,
    #[serde(with = "humantime_duration")]
    pub timeout: Duration,
    pub group_id: i32,
    pub first_node_id: i32,
}

impl EngineSettings {
    pub fn default_group(&self) -> NodeId {
        NodeId::new(self.group_id)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            local_addr: "127.0.0.1:0".to_string(),
            server_addr: "127.0.0.1:57120".to_string(),
            timeout: Duration::from_secs(5),
            group_id: 1,
            first_node_id: 1000,
        }
    }
}

/// Velocity curve names as written in the config file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VelocityCurveKind {
    #[default]
    Linear,
    Exponential,
    Compressed,
    Fixed,
}

/// Instrument settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentSettings {
    pub synthdef: String,
    pub note_duration: f32,
    pub velocity_curve: VelocityCurveKind,
    pub fixed_velocity: f32,
}

impl InstrumentSettings {
    pub fn velocity_curve(&self) -> VelocityCurve {
        match self.velocity_curve {
            VelocityCurveKind::Linear => VelocityCurve::Linear,
            VelocityCurveKind::Exponential => VelocityCurve::Exponential,
            VelocityCurveKind::Compressed => VelocityCurve::Compressed,
            VelocityCurveKind::Fixed => VelocityCurve::Fixed(self.fixed_velocity.clamp(0.0, 1.0)),
        }
    }
}

impl Default for InstrumentSettings {
    fn default() -> Self {
        Self {
            synthdef: carillon_dsp::BELL_SYNTHDEF_NAME.to_string(),
            note_duration: DEFAULT_NOTE_DURATION,
            velocity_curve: VelocityCurveKind::Linear,
            fixed_velocity: 0.8,
        }
    }
}

/// Event loop settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub on_instantiate_error: FailurePolicy,
}

/// Durations as human-readable strings ("5s", "250ms").
mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(d)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.midi.device, "keystation");
        assert_eq!(config.engine.server_addr, "127.0.0.1:57120");
        assert_eq!(config.engine.timeout, Duration::from_secs(5));
        assert_eq!(config.engine.first_node_id, 1000);
        assert_eq!(config.instrument.synthdef, "bells");
        assert_eq!(config.instrument.note_duration, 2.0);
        assert_eq!(config.pipeline.on_instantiate_error, FailurePolicy::Log);
    }

    #[test]
    fn test_default_file_matches_defaults() {
        let parsed: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_partial_file() {
        let parsed: Config = toml::from_str(
            r#"
            [engine]
            timeout = "250ms"

            [pipeline]
            on_instantiate_error = "fatal"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.engine.timeout, Duration::from_millis(250));
        assert_eq!(parsed.engine.server_addr, "127.0.0.1:57120");
        assert_eq!(parsed.pipeline.on_instantiate_error, FailurePolicy::Fatal);
        assert_eq!(parsed.midi.device, "keystation");
    }

    #[test]
    fn test_bad_timeout_rejected() {
        let parsed: std::result::Result<Config, _> = toml::from_str("[engine]\ntimeout = \"soon\"\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_toml_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.midi.device = "launchkey".to_string();
        config.instrument.velocity_curve = VelocityCurveKind::Fixed;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_note_duration_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        for value in ["-1.0", "0.0", "nan", "inf"] {
            fs::write(&path, format!("[instrument]\nnote_duration = {}\n", value)).unwrap();
            match Config::load_from(&path) {
                Err(CarillonError::Config(msg)) => assert!(msg.contains("note_duration"), "{}", msg),
                other => panic!("Expected config error for {}, got {:?}", value, other),
            }
        }

        fs::write(&path, "[instrument]\nnote_duration = 0.5\n").unwrap();
        assert_eq!(Config::load_from(&path).unwrap().instrument.note_duration, 0.5);
    }

    #[test]
    fn test_velocity_curve_selection() {
        let mut settings = InstrumentSettings::default();
        assert!(matches!(settings.velocity_curve(), VelocityCurve::Linear));
        settings.velocity_curve = VelocityCurveKind::Fixed;
        settings.fixed_velocity = 1.7;
        match settings.velocity_curve() {
            VelocityCurve::Fixed(v) => assert_eq!(v, 1.0),
            other => panic!("Expected fixed curve, got {:?}", other),
        }
    }
}
