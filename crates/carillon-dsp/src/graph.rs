//! Graph builder and IR for UGen graphs.
//!
//! This module provides the core data structures for building SuperCollider
//! synthesis graphs as plain data:
//!
//! - [`Rate`] - UGen calculation rate (audio, control, scalar)
//! - [`Input`] - Input to a UGen (constant or node output)
//! - [`UGenKind`] - Tagged node kind (oscillator, envelope, mixer, operator, output)
//! - [`UGenNode`] - A node in the synthesis graph
//! - [`Envelope`] - Breakpoint envelope fed into `EnvGen`
//! - [`GraphBuilder`] - Mutable graph construction state
//! - [`GraphIR`] - Immutable graph ready for encoding

use crate::errors::*;
use std::collections::HashMap;

/// Rate of a UGen (audio, control, scalar).
///
/// Ordering: Scalar < Control < Audio
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rate {
    /// Calculated once at synth creation.
    Scalar = 0,
    /// Calculated once per control block (~64 samples).
    Control = 1,
    /// Calculated every sample.
    Audio = 2,
}

impl Rate {
    /// Convert to the byte value used in scsyndef format.
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }
}

/// Input to a UGen - either a constant or another node's output.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Input {
    /// A constant value.
    Constant(f32),
    /// A reference to another node's output.
    Node {
        /// Index of the source node in the graph.
        node_id: u32,
        /// Which output of that node (0 for single-output UGens).
        output_index: u32,
    },
}

impl From<f32> for Input {
    fn from(value: f32) -> Self {
        Input::Constant(value)
    }
}

/// Operator codes of `BinaryOpUGen`, stored in the special index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Add = 0,
    Mul = 2,
}

/// What a node computes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UGenKind {
    /// Named synth controls; always node 0 when present.
    Control,
    /// Sine oscillator.
    SinOsc,
    /// Envelope generator.
    EnvGen,
    /// Scaling, offsetting and two-input mixing.
    BinaryOp(BinaryOperator),
    /// Three-input mixer.
    Sum3,
    /// Four-input mixer.
    Sum4,
    /// Bus writer.
    Out,
}

impl UGenKind {
    /// UGen class name as understood by scsynth.
    pub fn name(&self) -> &'static str {
        match self {
            UGenKind::Control => "Control",
            UGenKind::SinOsc => "SinOsc",
            UGenKind::EnvGen => "EnvGen",
            UGenKind::BinaryOp(_) => "BinaryOpUGen",
            UGenKind::Sum3 => "Sum3",
            UGenKind::Sum4 => "Sum4",
            UGenKind::Out => "Out",
        }
    }

    /// Special index (operator code for BinaryOpUGen, 0 otherwise).
    pub fn special_index(&self) -> i16 {
        match self {
            UGenKind::BinaryOp(op) => *op as i16,
            _ => 0,
        }
    }
}

/// A UGen node in the graph.
#[derive(Clone, Debug, PartialEq)]
pub struct UGenNode {
    pub kind: UGenKind,
    /// Calculation rate.
    pub rate: Rate,
    /// Input connections.
    pub inputs: Vec<Input>,
    /// Number of output channels.
    pub num_outputs: u32,
}

/// Parameter specification.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: String,
    /// Default value.
    pub default: f32,
    /// Output index on the Control UGen.
    pub index: usize,
}

/// EnvGen shape code for a curvature-controlled segment.
const CURVE_SHAPE: f32 = 5.0;

/// Marker used in the envelope array for "no release/loop node".
const NO_NODE: f32 = -99.0;

/// Breakpoint envelope, flattened into `EnvGen` inputs.
///
/// Levels and times are inputs so they can depend on synth controls.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub levels: Vec<Input>,
    pub times: Vec<Input>,
    /// Curvature of every stage; negative values bend towards a fast start.
    pub curve: f32,
    pub release_node: Option<u32>,
    pub loop_node: Option<u32>,
}

impl Envelope {
    /// Percussive envelope: rise from 0 to 1 in `attack`, fall back to 0 in
    /// `release`, curvature -4.
    pub fn perc(attack: impl Into<Input>, release: impl Into<Input>) -> Self {
        Self {
            levels: vec![
                Input::Constant(0.0),
                Input::Constant(1.0),
                Input::Constant(0.0),
            ],
            times: vec![attack.into(), release.into()],
            curve: -4.0,
            release_node: None,
            loop_node: None,
        }
    }

    /// Flatten into the `[init, stages, release, loop, (level, time, shape, curve)*]`
    /// layout EnvGen expects.
    pub fn to_inputs(&self) -> Vec<Input> {
        let stages = self.times.len();
        let node_or_none = |n: Option<u32>| n.map(|n| n as f32).unwrap_or(NO_NODE);

        let mut inputs = Vec::with_capacity(4 + stages * 4);
        inputs.push(self.levels.first().copied().unwrap_or(Input::Constant(0.0)));
        inputs.push(Input::Constant(stages as f32));
        inputs.push(Input::Constant(node_or_none(self.release_node)));
        inputs.push(Input::Constant(node_or_none(self.loop_node)));
        for (i, time) in self.times.iter().enumerate() {
            let level = self
                .levels
                .get(i + 1)
                .copied()
                .unwrap_or(Input::Constant(0.0));
            inputs.push(level);
            inputs.push(*time);
            inputs.push(Input::Constant(CURVE_SHAPE));
            inputs.push(Input::Constant(self.curve));
        }
        inputs
    }
}

/// What EnvGen does to its synth once the envelope has finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DoneAction {
    /// Keep running.
    None = 0,
    /// Free the enclosing synth.
    FreeSelf = 2,
}

/// The mutable state of a graph builder.
///
/// Accumulates nodes, constants and parameters. Nodes are only ever
/// appended and only reference earlier nodes, so the node list is always
/// in topological order.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    /// UGen nodes in topological order.
    pub nodes: Vec<UGenNode>,
    /// Constant values used by the graph.
    pub constants: Vec<f32>,
    /// Parameter specifications.
    pub params: Vec<ParamSpec>,
    /// Map from parameter name to its index in `params`.
    pub param_map: HashMap<String, usize>,
}

impl GraphBuilder {
    /// Create a new empty graph builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constant to the graph, returns its index.
    ///
    /// Constants are deduplicated - if the value already exists,
    /// its existing index is returned.
    pub fn add_constant(&mut self, value: f32) -> usize {
        for (i, &c) in self.constants.iter().enumerate() {
            if (c - value).abs() < 1e-9 {
                return i;
            }
        }
        let idx = self.constants.len();
        self.constants.push(value);
        idx
    }

    /// Add a UGen node and return a reference to its first output.
    ///
    /// Constant inputs are registered in the constant table.
    pub fn add_node(
        &mut self,
        kind: UGenKind,
        rate: Rate,
        inputs: Vec<Input>,
        num_outputs: u32,
    ) -> Input {
        for input in &inputs {
            if let Input::Constant(c) = input {
                self.add_constant(*c);
            }
        }
        let id = self.nodes.len() as u32;
        self.nodes.push(UGenNode {
            kind,
            rate,
            inputs,
            num_outputs,
        });
        Input::Node {
            node_id: id,
            output_index: 0,
        }
    }

    /// Declare a named control and return the input that reads it.
    ///
    /// All controls share one Control UGen at node 0, so they must be
    /// declared before any other UGen.
    pub fn add_param(&mut self, name: &str, default: f32) -> Result<Input> {
        match self.nodes.first() {
            None => {
                self.nodes.push(UGenNode {
                    kind: UGenKind::Control,
                    rate: Rate::Control,
                    inputs: Vec::new(),
                    num_outputs: 0,
                });
            }
            Some(node) if node.kind == UGenKind::Control && self.nodes.len() == 1 => {}
            Some(_) => return Err(SynthDefError::LateParam(name.to_string())),
        }

        let index = self.params.len();
        self.params.push(ParamSpec {
            name: name.to_string(),
            default,
            index,
        });
        self.param_map.insert(name.to_string(), index);
        self.nodes[0].num_outputs = self.params.len() as u32;

        Ok(Input::Node {
            node_id: 0,
            output_index: index as u32,
        })
    }

    /// Look up a previously declared control by name.
    pub fn param(&self, name: &str) -> Result<Input> {
        self.param_map
            .get(name)
            .map(|&index| Input::Node {
                node_id: 0,
                output_index: index as u32,
            })
            .ok_or_else(|| SynthDefError::UnknownParam(name.to_string()))
    }

    /// Get the rate of an input.
    pub fn rate_of(&self, input: &Input) -> Rate {
        match input {
            Input::Constant(_) => Rate::Scalar,
            Input::Node { node_id, .. } => self
                .nodes
                .get(*node_id as usize)
                .map(|n| n.rate)
                .unwrap_or(Rate::Scalar),
        }
    }

    /// Compute the maximum rate from a list of inputs.
    ///
    /// Used to determine the rate of operators and mixers.
    pub fn max_rate_from_inputs(&self, inputs: &[Input]) -> Rate {
        inputs
            .iter()
            .map(|i| self.rate_of(i))
            .max()
            .unwrap_or(Rate::Scalar)
    }

    /// BinaryOpUGen at the faster of its two input rates.
    pub fn binary_op(&mut self, op: BinaryOperator, a: Input, b: Input) -> Input {
        let inputs = vec![a, b];
        let rate = self.max_rate_from_inputs(&inputs);
        self.add_node(UGenKind::BinaryOp(op), rate, inputs, 1)
    }

    pub fn add(&mut self, a: impl Into<Input>, b: impl Into<Input>) -> Input {
        self.binary_op(BinaryOperator::Add, a.into(), b.into())
    }

    pub fn mul(&mut self, a: impl Into<Input>, b: impl Into<Input>) -> Input {
        self.binary_op(BinaryOperator::Mul, a.into(), b.into())
    }

    /// `SinOsc` with the given frequency and zero phase.
    pub fn sin_osc(&mut self, rate: Rate, freq: impl Into<Input>) -> Input {
        self.add_node(
            UGenKind::SinOsc,
            rate,
            vec![freq.into(), Input::Constant(0.0)],
            1,
        )
    }

    /// `EnvGen` with gate 1, unit level scale, no bias and unit time scale.
    pub fn env_gen(&mut self, rate: Rate, env: &Envelope, done_action: DoneAction) -> Input {
        let mut inputs = vec![
            Input::Constant(1.0),
            Input::Constant(1.0),
            Input::Constant(0.0),
            Input::Constant(1.0),
            Input::Constant(done_action as i32 as f32),
        ];
        inputs.extend(env.to_inputs());
        self.add_node(UGenKind::EnvGen, rate, inputs, 1)
    }

    /// Sum signals down to one channel.
    ///
    /// Groups of four are summed with `Sum4`, a trailing three with `Sum3`
    /// and a trailing pair with an add; the partial sums are mixed again
    /// until a single signal remains.
    pub fn mix(&mut self, signals: &[Input]) -> Result<Input> {
        match signals.len() {
            0 => Err(SynthDefError::NoInputs("Mix")),
            1 => Ok(signals[0]),
            _ => {
                let sums: Vec<Input> = signals
                    .chunks(4)
                    .map(|chunk| self.sum_chunk(chunk))
                    .collect();
                self.mix(&sums)
            }
        }
    }

    fn sum_chunk(&mut self, chunk: &[Input]) -> Input {
        match chunk {
            [single] => *single,
            [a, b] => self.add(*a, *b),
            _ => {
                let kind = if chunk.len() == 3 {
                    UGenKind::Sum3
                } else {
                    UGenKind::Sum4
                };
                let rate = self.max_rate_from_inputs(chunk);
                self.add_node(kind, rate, chunk.to_vec(), 1)
            }
        }
    }

    /// `Out` writing `channels` to consecutive buses starting at `bus`.
    pub fn out(&mut self, rate: Rate, bus: impl Into<Input>, channels: &[Input]) -> Input {
        let mut inputs = vec![bus.into()];
        inputs.extend_from_slice(channels);
        self.add_node(UGenKind::Out, rate, inputs, 0)
    }
}

/// Final graph IR ready for encoding.
///
/// This is an immutable snapshot of the graph that can be encoded
/// to the scsyndef binary format.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphIR {
    /// SynthDef name.
    pub name: String,
    /// Constant values.
    pub constants: Vec<f32>,
    /// Parameter specifications.
    pub params: Vec<ParamSpec>,
    /// UGen nodes in topological order.
    pub nodes: Vec<UGenNode>,
}

impl GraphIR {
    /// Create a GraphIR from a builder.
    pub fn from_builder(name: impl Into<String>, builder: GraphBuilder) -> Self {
        Self {
            name: name.into(),
            constants: builder.constants,
            params: builder.params,
            nodes: builder.nodes,
        }
    }

    /// Default value of a named control.
    pub fn default_of(&self, name: &str) -> Option<f32> {
        self.params.iter().find(|p| p.name == name).map(|p| p.default)
    }

    /// Number of nodes of the given kind.
    pub fn count_of(&self, kind: UGenKind) -> usize {
        self.nodes.iter().filter(|n| n.kind == kind).count()
    }

    /// Validate the graph structure before encoding.
    pub fn validate(&self) -> Result<()> {
        // Control UGen must sit at index 0 if params exist
        if !self.params.is_empty() {
            let control_node = self.nodes.first().ok_or_else(|| {
                SynthDefError::ValidationError(
                    "Graph has parameters but no Control UGen".to_string(),
                )
            })?;

            if control_node.kind != UGenKind::Control {
                return Err(SynthDefError::ValidationError(format!(
                    "First UGen should be Control, got {}",
                    control_node.kind.name()
                )));
            }

            if control_node.num_outputs as usize != self.params.len() {
                return Err(SynthDefError::ValidationError(format!(
                    "Control UGen has {} outputs, expected {}",
                    control_node.num_outputs,
                    self.params.len()
                )));
            }

            for (i, param) in self.params.iter().enumerate() {
                if param.index != i {
                    return Err(SynthDefError::ValidationError(format!(
                        "Parameter '{}' has index {}, expected {}",
                        param.name, param.index, i
                    )));
                }
            }
        }

        for (idx, node) in self.nodes.iter().enumerate() {
            for input in &node.inputs {
                match input {
                    Input::Constant(c) => {
                        if !self.constants.iter().any(|k| (k - c).abs() < 1e-9) {
                            return Err(SynthDefError::ValidationError(format!(
                                "UGen {} uses constant {} missing from the table",
                                idx, c
                            )));
                        }
                    }
                    Input::Node {
                        node_id,
                        output_index,
                    } => {
                        if *node_id as usize >= idx {
                            return Err(SynthDefError::ValidationError(format!(
                                "UGen {} references future UGen {} - violates topological order",
                                idx, node_id
                            )));
                        }
                        let referenced_node = &self.nodes[*node_id as usize];
                        if *output_index >= referenced_node.num_outputs {
                            return Err(SynthDefError::ValidationError(format!(
                                "UGen {} references output {} of node {}, but it only has {} outputs",
                                idx, output_index, node_id, referenced_node.num_outputs
                            )));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
