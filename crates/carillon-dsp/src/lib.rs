//! Carillon DSP - SynthDef generation for the additive bell instrument.
//!
//! - **Harmonics** - the bell spectrum and column normalization
//! - **Graph** - UGen graph IR built as plain data
//! - **Bell** - the parametrized bell SynthDef (`amp`, `dur`, `fund`)
//! - **Encoder** - SynthDef v2 binary format for scsynth's `/d_recv`

pub mod bell;
pub mod encoder;
pub mod errors;
pub mod graph;
pub mod harmonics;

pub use bell::{build_bell_synthdef, min_note_duration, BELL_SYNTHDEF_NAME};
pub use encoder::{encode_synthdef, write_synthdef_file};
pub use errors::{Result, SynthDefError};
pub use graph::{GraphIR, Input, Rate, UGenKind};
pub use harmonics::{normalize_sum, NormalizedPartialTable, PartialDescriptor, PartialField, BELL_PARTIALS};
