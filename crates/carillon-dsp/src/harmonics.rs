//! Harmonic spectrum of the bell instrument.
//!
//! A bell is modelled as a sum of inharmonic sine partials. Each partial is
//! described by its frequency ratio to the fundamental, a fixed frequency
//! offset in Hz, a relative amplitude and a relative decay time.

use crate::errors::{Result, SynthDefError};
use std::ops::Deref;

/// One sine component of the bell spectrum.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PartialDescriptor {
    /// Multiplier applied to the fundamental frequency.
    pub frequency_ratio: f32,
    /// Offset in Hz added after scaling (detunes paired partials).
    pub time_offset: f32,
    /// Relative amplitude of this partial.
    pub relative_amplitude: f32,
    /// Decay time as a fraction of the note duration.
    pub relative_duration: f32,
}

impl PartialDescriptor {
    pub const fn new(
        frequency_ratio: f32,
        time_offset: f32,
        relative_amplitude: f32,
        relative_duration: f32,
    ) -> Self {
        Self {
            frequency_ratio,
            time_offset,
            relative_amplitude,
            relative_duration,
        }
    }

    fn field(&self, field: PartialField) -> f32 {
        match field {
            PartialField::FrequencyRatio => self.frequency_ratio,
            PartialField::TimeOffset => self.time_offset,
            PartialField::RelativeAmplitude => self.relative_amplitude,
            PartialField::RelativeDuration => self.relative_duration,
        }
    }

    fn field_mut(&mut self, field: PartialField) -> &mut f32 {
        match field {
            PartialField::FrequencyRatio => &mut self.frequency_ratio,
            PartialField::TimeOffset => &mut self.time_offset,
            PartialField::RelativeAmplitude => &mut self.relative_amplitude,
            PartialField::RelativeDuration => &mut self.relative_duration,
        }
    }
}

/// Column selector for [`normalize_sum`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartialField {
    FrequencyRatio,
    TimeOffset,
    RelativeAmplitude,
    RelativeDuration,
}

impl PartialField {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartialField::FrequencyRatio => "frequency_ratio",
            PartialField::TimeOffset => "time_offset",
            PartialField::RelativeAmplitude => "relative_amplitude",
            PartialField::RelativeDuration => "relative_duration",
        }
    }
}

/// The 11-partial bell spectrum, before normalization.
pub const BELL_PARTIALS: [PartialDescriptor; 11] = [
    PartialDescriptor::new(0.58, 0.0, 1.0, 1.0),
    PartialDescriptor::new(0.58, 1.0, 0.67, 0.9),
    PartialDescriptor::new(0.91, 0.0, 1.0, 0.65),
    PartialDescriptor::new(0.91, 1.7, 1.8, 0.55),
    PartialDescriptor::new(1.6, 0.0, 1.67, 0.35),
    PartialDescriptor::new(1.2, 0.0, 2.67, 0.325),
    PartialDescriptor::new(2.0, 0.0, 1.46, 0.25),
    PartialDescriptor::new(2.7, 0.0, 1.33, 0.2),
    PartialDescriptor::new(3.0, 0.0, 1.33, 0.15),
    PartialDescriptor::new(3.75, 0.0, 1.0, 0.1),
    PartialDescriptor::new(4.09, 0.0, 1.33, 0.07),
];

/// Divide every value of `field` by the column sum, so the column sums to 1.
///
/// Length and ordering of the table are preserved. Fails when the sum is
/// zero or not finite.
pub fn normalize_sum(
    table: &[PartialDescriptor],
    field: PartialField,
) -> Result<Vec<PartialDescriptor>> {
    let sum: f32 = table.iter().map(|p| p.field(field)).sum();
    if sum == 0.0 || !sum.is_finite() {
        return Err(SynthDefError::DegenerateTable {
            column: field.as_str(),
            sum,
        });
    }

    Ok(table
        .iter()
        .map(|p| {
            let mut p = *p;
            *p.field_mut(field) /= sum;
            p
        })
        .collect())
}

/// A partial table whose relative amplitudes sum to 1.
///
/// Built once at startup and shared read-only; the SynthDef is
/// parametrized per note, the table is not.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedPartialTable {
    partials: Vec<PartialDescriptor>,
}

impl NormalizedPartialTable {
    /// Normalize the amplitude column of `table`.
    pub fn new(table: &[PartialDescriptor]) -> Result<Self> {
        let partials = normalize_sum(table, PartialField::RelativeAmplitude)?;
        Ok(Self { partials })
    }

    /// The normalized bell spectrum.
    pub fn bell() -> Result<Self> {
        Self::new(&BELL_PARTIALS)
    }

    pub fn partials(&self) -> &[PartialDescriptor] {
        &self.partials
    }

    /// Shortest relative duration in the table.
    ///
    /// Notes shorter than `0.01 / min_relative_duration` seconds produce a
    /// non-positive release time for that partial.
    pub fn min_relative_duration(&self) -> f32 {
        self.partials
            .iter()
            .map(|p| p.relative_duration)
            .fold(f32::INFINITY, f32::min)
    }
}

impl Deref for NormalizedPartialTable {
    type Target = [PartialDescriptor];

    fn deref(&self) -> &Self::Target {
        &self.partials
    }
}
