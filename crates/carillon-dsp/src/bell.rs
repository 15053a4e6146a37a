//! The additive bell SynthDef.
//!
//! Every partial of a [`NormalizedPartialTable`] becomes a sine oscillator at
//! `fund * ratio + offset`, shaped by its own percussive envelope lasting
//! `dur * relative_duration`. The partials are mixed, shaped by a master
//! envelope that frees the synth when it finishes, scaled by `amp` and written
//! to both channels of bus 0.

use crate::errors::Result;
use crate::graph::{DoneAction, Envelope, GraphBuilder, GraphIR, Input, Rate};
use crate::harmonics::NormalizedPartialTable;

/// Default SynthDef name.
pub const BELL_SYNTHDEF_NAME: &str = "bells";

/// Control defaults: `amp`, `dur` (seconds) and `fund` (Hz).
pub const DEFAULT_AMP: f32 = 0.9;
pub const DEFAULT_DUR: f32 = 1.0;
pub const DEFAULT_FUND: f32 = 440.0;

/// Attack time shared by every envelope.
const ATTACK: f32 = 0.01;

/// Subtracted from each release so the attack fits inside the duration.
const RELEASE_TRIM: f32 = -0.01;

/// Output bus of the left channel.
const OUT_BUS: f32 = 0.0;

/// Shortest `dur` for which every partial envelope still has a
/// non-negative release time.
pub fn min_note_duration(table: &NormalizedPartialTable) -> f32 {
    -RELEASE_TRIM / table.min_relative_duration()
}

/// Build the bell SynthDef graph.
///
/// Pure function of `name` and `table`: the result depends on nothing else,
/// and note-specific values arrive later through the `amp`, `dur` and `fund`
/// controls. Durations are not validated here; a `dur` short enough to make
/// a release time non-positive is left to the engine.
pub fn build_bell_synthdef(name: &str, table: &NormalizedPartialTable) -> Result<GraphIR> {
    let mut b = GraphBuilder::new();
    let amp = b.add_param("amp", DEFAULT_AMP)?;
    let dur = b.add_param("dur", DEFAULT_DUR)?;
    let fund = b.add_param("fund", DEFAULT_FUND)?;

    let tones: Vec<Input> = table
        .iter()
        .map(|partial| {
            let scaled = b.mul(fund, partial.frequency_ratio);
            let freq = b.add(scaled, partial.time_offset);

            let decay = b.mul(dur, partial.relative_duration);
            let release = b.add(decay, RELEASE_TRIM);
            let env = b.env_gen(Rate::Control, &Envelope::perc(ATTACK, release), DoneAction::None);

            let osc = b.sin_osc(Rate::Audio, freq);
            let level = b.mul(partial.relative_amplitude, env);
            b.mul(osc, level)
        })
        .collect();

    let mixed = b.mix(&tones)?;

    let release = b.add(dur, RELEASE_TRIM);
    let master = b.env_gen(
        Rate::Control,
        &Envelope::perc(ATTACK, release),
        DoneAction::FreeSelf,
    );
    let shaped = b.mul(mixed, master);
    let sig = b.mul(shaped, amp);

    b.out(Rate::Audio, OUT_BUS, &[sig, sig]);

    let ir = GraphIR::from_builder(name, b);
    log::debug!(
        "[SYNTHDEF] Built '{}': {} nodes, {} constants",
        ir.name,
        ir.nodes.len(),
        ir.constants.len()
    );
    Ok(ir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{BinaryOperator, UGenKind};

    fn bell() -> GraphIR {
        let _ = env_logger::builder().is_test(true).try_init();
        let table = NormalizedPartialTable::bell().unwrap();
        build_bell_synthdef(BELL_SYNTHDEF_NAME, &table).unwrap()
    }

    #[test]
    fn test_bell_controls_and_defaults() {
        let ir = bell();
        assert_eq!(ir.name, "bells");
        let names: Vec<_> = ir.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["amp", "dur", "fund"]);
        assert_eq!(ir.default_of("amp"), Some(0.9));
        assert_eq!(ir.default_of("dur"), Some(1.0));
        assert_eq!(ir.default_of("fund"), Some(440.0));
    }

    #[test]
    fn test_bell_node_census() {
        let ir = bell();
        assert_eq!(ir.count_of(UGenKind::Control), 1);
        assert_eq!(ir.count_of(UGenKind::SinOsc), 11);
        // One envelope per partial plus the master envelope
        assert_eq!(ir.count_of(UGenKind::EnvGen), 12);
        assert_eq!(ir.count_of(UGenKind::Sum4), 2);
        assert_eq!(ir.count_of(UGenKind::Sum3), 2);
        assert_eq!(ir.count_of(UGenKind::Out), 1);
        // Per partial: freq mul+add, release mul+add, two level muls
        assert_eq!(ir.count_of(UGenKind::BinaryOp(BinaryOperator::Mul)), 11 * 4 + 2);
        assert_eq!(ir.count_of(UGenKind::BinaryOp(BinaryOperator::Add)), 11 * 2 + 1);
        assert_eq!(ir.nodes.len(), 98);
        assert!(ir.validate().is_ok());
    }

    #[test]
    fn test_bell_output_is_stereo_bus_zero() {
        let ir = bell();
        let out = ir.nodes.last().unwrap();
        assert_eq!(out.kind, UGenKind::Out);
        assert_eq!(out.rate, Rate::Audio);
        assert_eq!(out.num_outputs, 0);
        assert_eq!(out.inputs.len(), 3);
        assert_eq!(out.inputs[0], Input::Constant(0.0));
        assert_eq!(out.inputs[1], out.inputs[2]);
    }

    #[test]
    fn test_master_envelope_frees_synth() {
        let ir = bell();
        let envs: Vec<_> = ir
            .nodes
            .iter()
            .filter(|n| n.kind == UGenKind::EnvGen)
            .collect();
        // done action is the fifth input
        let done: Vec<_> = envs.iter().map(|n| n.inputs[4]).collect();
        assert_eq!(done.last(), Some(&Input::Constant(2.0)));
        assert!(done[..11].iter().all(|d| *d == Input::Constant(0.0)));
        assert!(envs.iter().all(|n| n.rate == Rate::Control));
    }

    #[test]
    fn test_build_is_idempotent() {
        let table = NormalizedPartialTable::bell().unwrap();
        let first = build_bell_synthdef(BELL_SYNTHDEF_NAME, &table).unwrap();
        let second = build_bell_synthdef(BELL_SYNTHDEF_NAME, &table).unwrap();
        assert_eq!(first.nodes.len(), second.nodes.len());
        assert_eq!(first, second);
    }

    #[test]
    fn test_min_note_duration_keeps_releases_non_negative() {
        let table = NormalizedPartialTable::bell().unwrap();
        let min = min_note_duration(&table);
        assert!((min - 0.01 / 0.07).abs() < 1e-5);
        for partial in table.iter() {
            assert!(min * partial.relative_duration + RELEASE_TRIM >= -1e-6);
        }
        assert!(min + RELEASE_TRIM > 0.0);
    }

    #[test]
    fn test_partial_amplitudes_become_constants() {
        let table = NormalizedPartialTable::bell().unwrap();
        let ir = build_bell_synthdef("b", &table).unwrap();
        for partial in table.iter() {
            assert!(ir.constants.contains(&partial.relative_amplitude));
            assert!(ir.constants.contains(&partial.frequency_ratio));
        }
        assert!(ir.constants.contains(&RELEASE_TRIM));
    }
}
