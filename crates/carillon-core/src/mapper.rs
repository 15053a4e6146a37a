//! Note events to synth controls.

use crate::midi::{NoteEvent, VelocityCurve};

/// Note length used when nothing else is configured, in seconds.
pub const DEFAULT_NOTE_DURATION: f32 = 2.0;

/// Convert a MIDI note number to frequency in Hz (A4 = 69 = 440 Hz).
pub fn midi_to_freq(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}

/// Controls for one bell instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlParameters {
    /// Amplitude, 0.0-1.0.
    pub amp: f32,
    /// Length in seconds.
    pub dur: f32,
    /// Fundamental frequency in Hz.
    pub fund: f32,
}

impl ControlParameters {
    /// Name/value pairs in the order they are sent to the server.
    pub fn to_controls(&self) -> Vec<(&'static str, f32)> {
        vec![("amp", self.amp), ("dur", self.dur), ("fund", self.fund)]
    }
}

/// Derives [`ControlParameters`] from note events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventMapper {
    duration: f32,
    velocity_curve: VelocityCurve,
}

impl EventMapper {
    pub fn new(duration: f32, velocity_curve: VelocityCurve) -> Self {
        Self {
            duration,
            velocity_curve,
        }
    }

    /// Raise the note duration to at least `min` seconds. Non-finite
    /// durations are replaced by `min` as well.
    pub fn with_min_duration(mut self, min: f32) -> Self {
        if !self.duration.is_finite() || self.duration < min {
            log::warn!(
                "Note duration {}s is below the {:.3}s the bell needs, using {:.3}s",
                self.duration,
                min,
                min
            );
            self.duration = min;
        }
        self
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn map_event(&self, event: NoteEvent) -> ControlParameters {
        ControlParameters {
            amp: self.velocity_curve.apply(event.velocity),
            dur: self.duration,
            fund: midi_to_freq(event.pitch),
        }
    }
}

impl Default for EventMapper {
    fn default() -> Self {
        Self::new(DEFAULT_NOTE_DURATION, VelocityCurve::Linear)
    }
}
