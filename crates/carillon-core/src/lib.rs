//! Carillon Core - the note pipeline between a MIDI controller and scsynth.
//!
//! This crate provides:
//!
//! - **MIDI** - packet decoding, velocity curves, device selection and input
//! - **Mapper** - note events to bell controls (`amp`, `dur`, `fund`)
//! - **Scheduler** - ordered instance creation with monotonically increasing node IDs
//! - **Transport** - the engine seam, implemented for scsynth over OSC/UDP
//! - **Registry** - one-time SynthDef registration
//! - **Session** - startup sequence
//! - **Config** - TOML configuration
//!
//! # Architecture
//!
//! The MIDI driver thread decodes packets and pushes [`NoteEvent`]s into a
//! channel. A single consumer runs the [`InstanceScheduler`], which owns the
//! [`EngineTransport`] and sends one instantiate call per event, in order.
//!
//! # Feature Flags
//!
//! - `native` (default) - MIDI input through midir

pub mod config;
pub mod errors;
pub mod mapper;
pub mod midi;
pub mod osc;
pub mod registry;
pub mod scheduler;
pub mod scsynth;
pub mod session;
pub mod transport;

// Native-only modules (require system dependencies)
#[cfg(feature = "native")]
pub mod midi_input;

pub use config::{Config, EngineSettings, InstrumentSettings, MidiSettings, PipelineSettings};
pub use errors::{CarillonError, Result};
pub use mapper::{midi_to_freq, ControlParameters, EventMapper, DEFAULT_NOTE_DURATION};
pub use midi::{select_device, MidiDeviceInfo, MidiMessage, NoteEvent, VelocityCurve};
pub use osc::OscClient;
pub use registry::DefinitionRegistry;
pub use scheduler::{
    FailurePolicy, InstanceIdAllocator, InstanceScheduler, SessionSummary, StopReason,
};
pub use scsynth::{AddAction, NodeId, Scsynth, ServerStatus};
pub use session::{bell_definition, Session};
pub use transport::{EngineTransport, GroupHandle};

#[cfg(feature = "native")]
pub use midi_input::MidiInputManager;
