//! MIDI decoding and device selection.
//!
//! This module provides:
//! - MIDI message parsing from raw bytes
//! - The [`NoteEvent`] consumed by the note pipeline
//! - Velocity curves
//! - Case-insensitive device selection by name

use crate::errors::{CarillonError, Result};

/// Highest value of a MIDI data byte.
pub const MIDI_MAX: u8 = 127;

/// MIDI message types parsed from raw MIDI bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note on event (channel 0-15, note 0-127, velocity 1-127)
    NoteOn {
        channel: u8,
        note: u8,
        velocity: u8,
        timestamp: u64,
    },
    /// Note off event (channel 0-15, note 0-127)
    NoteOff {
        channel: u8,
        note: u8,
        timestamp: u64,
    },
    /// Control change (channel, controller number, value)
    ControlChange {
        channel: u8,
        controller: u8,
        value: u8,
        timestamp: u64,
    },
}

impl MidiMessage {
    /// Parse raw MIDI bytes into a MidiMessage.
    ///
    /// Returns `None` for messages the instrument does not react to
    /// (system real-time, pitch bend, aftertouch, ...) and for short packets.
    pub fn from_bytes(bytes: &[u8], timestamp: u64) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        let msg_type = status & 0xF0;
        let channel = status & 0x0F;

        match (msg_type, data) {
            (0x90, [note, velocity, ..]) => {
                if *velocity == 0 {
                    // Note on with velocity 0 is treated as note off
                    Some(MidiMessage::NoteOff {
                        channel,
                        note: *note,
                        timestamp,
                    })
                } else {
                    Some(MidiMessage::NoteOn {
                        channel,
                        note: *note,
                        velocity: *velocity,
                        timestamp,
                    })
                }
            }
            (0x80, [note, _, ..]) => Some(MidiMessage::NoteOff {
                channel,
                note: *note,
                timestamp,
            }),
            (0xB0, [controller, value, ..]) => Some(MidiMessage::ControlChange {
                channel,
                controller: *controller,
                value: *value,
                timestamp,
            }),
            _ => None,
        }
    }
}

/// A decoded note: the only input the note pipeline sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    /// MIDI note number, 0-127.
    pub pitch: u8,
    /// MIDI velocity, 0-127.
    pub velocity: u8,
}

impl NoteEvent {
    /// Create an event, clamping both fields to 0-127.
    pub fn new(pitch: u8, velocity: u8) -> Self {
        Self {
            pitch: pitch.min(MIDI_MAX),
            velocity: velocity.min(MIDI_MAX),
        }
    }

    /// Read pitch from byte 1 and velocity from byte 2 of a raw packet.
    ///
    /// The status byte is not interpreted. Out-of-range bytes are clamped;
    /// packets shorter than three bytes yield `None`.
    pub fn from_packet(packet: &[u8]) -> Option<Self> {
        match packet {
            [_, pitch, velocity, ..] => Some(Self::new(*pitch, *velocity)),
            _ => None,
        }
    }
}

/// Velocity curve for mapping MIDI velocity to amplitude.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum VelocityCurve {
    /// Linear mapping (default)
    #[default]
    Linear,
    /// Fixed velocity (ignores input)
    Fixed(f32),
    /// Exponential curve (more dynamic range)
    Exponential,
    /// Compressed curve (softer dynamics)
    Compressed,
}

impl VelocityCurve {
    /// Apply the velocity curve to a MIDI velocity.
    /// Velocities above 127 are clamped; the result is in 0.0-1.0.
    pub fn apply(&self, velocity: u8) -> f32 {
        let v = velocity.min(MIDI_MAX) as f32 / MIDI_MAX as f32;
        match self {
            VelocityCurve::Linear => v,
            VelocityCurve::Fixed(fixed) => *fixed,
            VelocityCurve::Exponential => v * v,
            VelocityCurve::Compressed => v.sqrt(),
        }
    }
}

/// Information about a MIDI input device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiDeviceInfo {
    /// Device name (as reported by the system)
    pub name: String,
    /// Port index (for opening)
    pub port_index: usize,
}

/// Pick the first device whose name contains `pattern`, ignoring case.
pub fn select_device(devices: &[MidiDeviceInfo], pattern: &str) -> Result<MidiDeviceInfo> {
    let pattern_lower = pattern.to_lowercase();
    devices
        .iter()
        .find(|d| d.name.to_lowercase().contains(&pattern_lower))
        .cloned()
        .ok_or_else(|| CarillonError::NoMatchingDevice(pattern.to_string()))
}
