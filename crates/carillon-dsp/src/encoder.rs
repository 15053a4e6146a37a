//! SynthDef v2 binary encoder.
//!
//! This module encodes a [`GraphIR`] into the binary format understood
//! by SuperCollider's scsynth server.

use crate::errors::*;
use crate::graph::*;
use byteorder::{BigEndian, WriteBytesExt};
use std::io::Write;
use std::path::Path;

/// Encode a GraphIR into a SynthDef v2 binary format.
///
/// The resulting bytes can be sent to scsynth via the `/d_recv` OSC command.
pub fn encode_synthdef(ir: &GraphIR) -> Result<Vec<u8>> {
    ir.validate()?;

    let mut buf = Vec::new();

    // Header: "SCgf", version 2, one definition
    buf.write_all(b"SCgf").map_err(enc_err("header"))?;
    buf.write_i32::<BigEndian>(2).map_err(enc_err("version"))?;
    buf.write_i16::<BigEndian>(1).map_err(enc_err("def count"))?;

    encode_graph(&mut buf, ir)?;

    Ok(buf)
}

/// Encode `ir` and write it to `path` as a `.scsyndef` file.
pub fn write_synthdef_file<P: AsRef<Path>>(ir: &GraphIR, path: P) -> Result<usize> {
    let bytes = encode_synthdef(ir)?;
    std::fs::write(path.as_ref(), &bytes)?;
    log::debug!(
        "[SYNTHDEF] Wrote '{}' ({} bytes) to {}",
        ir.name,
        bytes.len(),
        path.as_ref().display()
    );
    Ok(bytes.len())
}

fn enc_err(what: &'static str) -> impl Fn(std::io::Error) -> SynthDefError {
    move |e| SynthDefError::EncodingError(format!("Failed to write {}: {}", what, e))
}

fn encode_graph(buf: &mut Vec<u8>, ir: &GraphIR) -> Result<()> {
    write_pstring(buf, &ir.name)?;

    // Constants (i32 count, then f32 values)
    buf.write_i32::<BigEndian>(ir.constants.len() as i32)
        .map_err(enc_err("constant count"))?;
    for &c in &ir.constants {
        buf.write_f32::<BigEndian>(c).map_err(enc_err("constant"))?;
    }

    // Parameter defaults (i32 count, then f32 values in control order)
    buf.write_i32::<BigEndian>(ir.params.len() as i32)
        .map_err(enc_err("param count"))?;
    for param in &ir.params {
        buf.write_f32::<BigEndian>(param.default)
            .map_err(enc_err("param default"))?;
    }

    // Parameter names (i32 count, then pstring name + i32 index)
    buf.write_i32::<BigEndian>(ir.params.len() as i32)
        .map_err(enc_err("param name count"))?;
    for param in &ir.params {
        write_pstring(buf, &param.name)?;
        buf.write_i32::<BigEndian>(param.index as i32)
            .map_err(enc_err("param name index"))?;
    }

    buf.write_i32::<BigEndian>(ir.nodes.len() as i32)
        .map_err(enc_err("ugen count"))?;
    for node in &ir.nodes {
        encode_ugen(buf, node, &ir.constants)?;
    }

    // Variants: none
    buf.write_i16::<BigEndian>(0).map_err(enc_err("variant count"))?;

    Ok(())
}

fn encode_ugen(buf: &mut Vec<u8>, node: &UGenNode, constants: &[f32]) -> Result<()> {
    write_pstring(buf, node.kind.name())?;

    buf.write_i8(node.rate.as_byte() as i8)
        .map_err(enc_err("ugen rate"))?;
    buf.write_i32::<BigEndian>(node.inputs.len() as i32)
        .map_err(enc_err("input count"))?;
    buf.write_i32::<BigEndian>(node.num_outputs as i32)
        .map_err(enc_err("output count"))?;
    buf.write_i16::<BigEndian>(node.kind.special_index())
        .map_err(enc_err("special index"))?;

    // Inputs (each is i32 source index, i32 output index; -1 marks a constant)
    for input in &node.inputs {
        let (source, index) = match input {
            Input::Constant(val) => {
                let const_idx = constants
                    .iter()
                    .position(|&c| (c - val).abs() < 1e-9)
                    .ok_or_else(|| {
                        SynthDefError::EncodingError(format!("Constant {} not found in table", val))
                    })?;
                (-1, const_idx as i32)
            }
            Input::Node {
                node_id,
                output_index,
            } => (*node_id as i32, *output_index as i32),
        };
        buf.write_i32::<BigEndian>(source)
            .map_err(enc_err("input source"))?;
        buf.write_i32::<BigEndian>(index)
            .map_err(enc_err("input index"))?;
    }

    // Output rates (i8 array, one per output)
    for _ in 0..node.num_outputs {
        buf.write_i8(node.rate.as_byte() as i8)
            .map_err(enc_err("output rate"))?;
    }

    Ok(())
}

fn write_pstring(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    if bytes.len() > 255 {
        return Err(SynthDefError::EncodingError(format!(
            "String too long for pstring: {}",
            s
        )));
    }
    buf.write_u8(bytes.len() as u8)
        .map_err(enc_err("string length"))?;
    buf.write_all(bytes).map_err(enc_err("string"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bell::build_bell_synthdef;
    use crate::harmonics::NormalizedPartialTable;

    #[test]
    fn test_encode_empty_synthdef() {
        let ir = GraphIR::from_builder("empty", GraphBuilder::new());
        let bytes = encode_synthdef(&ir).unwrap();

        assert_eq!(&bytes[0..4], b"SCgf");
        assert_eq!(bytes[4..8], [0, 0, 0, 2]);
        assert_eq!(bytes[8..10], [0, 1]);
        // pstring name
        assert_eq!(bytes[10], 5);
        assert_eq!(&bytes[11..16], b"empty");
        // constants, params, param names, ugens: all zero; then no variants
        assert_eq!(bytes[16..], [0u8; 18]);
    }

    #[test]
    fn test_encode_single_control() {
        let mut builder = GraphBuilder::new();
        let freq = builder.add_param("freq", 440.0).unwrap();
        let osc = builder.sin_osc(Rate::Audio, freq);
        builder.out(Rate::Audio, 0.0f32, &[osc]);
        let ir = GraphIR::from_builder("sine", builder);
        let bytes = encode_synthdef(&ir).unwrap();

        // header(10) + name(5) = 15; constants: count + one value (0.0)
        assert_eq!(bytes[15..19], [0, 0, 0, 1]);
        // params: count 1, default 440.0
        assert_eq!(bytes[23..27], [0, 0, 0, 1]);
        assert_eq!(bytes[27..31], 440.0f32.to_be_bytes());
        // names: count 1, "freq", index 0
        assert_eq!(bytes[31..35], [0, 0, 0, 1]);
        assert_eq!(bytes[35], 4);
        assert_eq!(&bytes[36..40], b"freq");
        assert_eq!(bytes[40..44], [0, 0, 0, 0]);
        // three ugens
        assert_eq!(bytes[44..48], [0, 0, 0, 3]);
        assert_eq!(bytes[48], 7);
        assert_eq!(&bytes[49..56], b"Control");
        // ends with zero variants
        assert_eq!(bytes[bytes.len() - 2..], [0, 0]);
    }

    #[test]
    fn test_encode_bell() {
        let table = NormalizedPartialTable::bell().unwrap();
        let ir = build_bell_synthdef("bells", &table).unwrap();
        let bytes = encode_synthdef(&ir).unwrap();
        assert_eq!(&bytes[0..4], b"SCgf");
        assert_eq!(bytes[10], 5);
        assert_eq!(&bytes[11..16], b"bells");
        let count = i32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
        assert_eq!(count as usize, ir.constants.len());
    }

    #[test]
    fn test_write_synthdef_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bells.scsyndef");
        let table = NormalizedPartialTable::bell().unwrap();
        let ir = build_bell_synthdef("bells", &table).unwrap();
        let written = write_synthdef_file(&ir, &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap().len(), written);
    }

    #[test]
    fn test_pstring_encoding() {
        let mut buf = Vec::new();
        write_pstring(&mut buf, "test").unwrap();
        assert_eq!(buf, vec![4, b't', b'e', b's', b't']);
    }

    #[test]
    fn test_pstring_too_long() {
        let mut buf = Vec::new();
        let long_string = "a".repeat(256);
        let result = write_pstring(&mut buf, &long_string);
        assert!(result.is_err());
    }
}
