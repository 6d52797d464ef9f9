//! In-memory model of the mapped dataflow graph.
//!
//! Nodes are keyed by id and bound to a PE slot the moment they are added;
//! the allocator is scoped to the [`MapperDfg`] instance, so concurrent
//! compiles never interfere. References stay symbolic until
//! [`MapperDfg::resolve_references`] runs, after which the graph is treated
//! as immutable.

use crate::error::{MapperError, Result};
use doda_asm::params::NUM_PES;
use doda_asm::Opcode;
use itertools::Itertools;
use serde::Deserialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Operand slot of a PE: first input, second input, or predicate.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Operand {
    /// First ALU input.
    I1,
    /// Second ALU input.
    I2,
    /// Commit predicate.
    Pred,
}

/// Where an operand's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Immediate constant baked into the instruction word.
    Const(i32),
    /// Output of another node, bound to its PE slot by the resolution pass.
    Node {
        /// Producer node id.
        id: String,
        /// Producer's PE slot; `None` until resolved, and kept `None` for
        /// names no node in the graph produces.
        pe_index: Option<usize>,
    },
}

/// One operand of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    kind: Operand,
    source: InputSource,
}

impl Input {
    /// Operand slot this input feeds.
    pub fn kind(&self) -> Operand {
        self.kind
    }

    /// Value source.
    pub fn source(&self) -> &InputSource {
        &self.source
    }
}

/// One consumer of a node's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    id: String,
    pe_index: Option<usize>,
}

impl Output {
    /// Consumer node id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Consumer's PE slot, once resolved.
    pub fn pe_index(&self) -> Option<usize> {
        self.pe_index
    }
}

/// A single node of the mapped graph, bound to one PE slot.
#[derive(Debug, Clone)]
pub struct MapperNode {
    id: String,
    op: Opcode,
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    initial_output_used: bool,
    initial_output: i32,
    pe_index: usize,
}

impl MapperNode {
    fn new(id: String, op: Opcode, initial_output: Option<i32>, pe_index: usize) -> Self {
        Self {
            id,
            op,
            inputs: Vec::new(),
            outputs: Vec::new(),
            initial_output_used: initial_output.is_some(),
            // -1 is the historical "no initial output" filler and is kept so
            // textual dumps stay stable.
            initial_output: initial_output.unwrap_or(-1),
            pe_index,
        }
    }

    /// Node id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// ALU operation.
    pub fn opcode(&self) -> Opcode {
        self.op
    }

    /// Operands, in the order they were declared.
    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    /// Consumers, in registration order. Duplicate edges are legal and kept.
    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Whether the PE latches an initial output value.
    pub fn initial_output_used(&self) -> bool {
        self.initial_output_used
    }

    /// The latched first-cycle output value.
    pub fn initial_output(&self) -> i32 {
        self.initial_output
    }

    /// PE slot this node is bound to.
    pub fn pe_index(&self) -> usize {
        self.pe_index
    }

    /// Appends an operand fed by another node's output.
    pub fn add_input_ref(&mut self, kind: Operand, source_id: impl Into<String>) {
        self.inputs.push(Input {
            kind,
            source: InputSource::Node {
                id: source_id.into(),
                pe_index: None,
            },
        });
    }

    /// Appends an immediate operand.
    pub fn add_input_const(&mut self, kind: Operand, value: i32) {
        self.inputs.push(Input {
            kind,
            source: InputSource::Const(value),
        });
    }

    /// Registers a consumer of this node's output.
    pub fn add_output(&mut self, consumer_id: impl Into<String>) {
        self.outputs.push(Output {
            id: consumer_id.into(),
            pe_index: None,
        });
    }

    /// Appends a reference operand with its PE slot already known (used when
    /// reading back a dump that carries explicit indices).
    pub(crate) fn add_resolved_input_ref(
        &mut self,
        kind: Operand,
        source_id: impl Into<String>,
        pe_index: Option<usize>,
    ) {
        self.inputs.push(Input {
            kind,
            source: InputSource::Node {
                id: source_id.into(),
                pe_index,
            },
        });
    }

    /// Registers a consumer with its PE slot already known.
    pub(crate) fn add_resolved_output(
        &mut self,
        consumer_id: impl Into<String>,
        pe_index: Option<usize>,
    ) {
        self.outputs.push(Output {
            id: consumer_id.into(),
            pe_index,
        });
    }

    /// Binds every source reference to its producer's PE slot.
    ///
    /// Names the graph does not define (external inputs) are reported and
    /// left unresolved.
    pub(crate) fn resolve_inputs(&mut self, pe_indices: &BTreeMap<String, usize>) {
        for input in &mut self.inputs {
            if let InputSource::Node { id, pe_index } = &mut input.source {
                match pe_indices.get(id.as_str()) {
                    Some(pe) => *pe_index = Some(*pe),
                    None => tracing::warn!(
                        node = %self.id,
                        source = %id,
                        "could not resolve input reference"
                    ),
                }
            }
        }
    }

    /// Binds every consumer reference to its PE slot.
    pub(crate) fn resolve_outputs(&mut self, pe_indices: &BTreeMap<String, usize>) {
        for output in &mut self.outputs {
            match pe_indices.get(output.id.as_str()) {
                Some(pe) => output.pe_index = Some(*pe),
                None => tracing::warn!(
                    node = %self.id,
                    consumer = %output.id,
                    "could not resolve output reference"
                ),
            }
        }
    }
}

/// The mapped dataflow graph.
#[derive(Debug, Clone, Default)]
pub struct MapperDfg {
    nodes: BTreeMap<String, MapperNode>,
    next_pe_index: usize,
    overwrite_duplicates: bool,
}

impl MapperDfg {
    /// An empty graph with its PE allocator at slot 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores the legacy overwrite-on-duplicate-id semantics. Off by
    /// default; duplicates are rejected.
    pub fn allow_overwrite(&mut self, allow: bool) {
        self.overwrite_duplicates = allow;
    }

    /// Adds a node and binds it to the next free PE slot.
    ///
    /// `initial_output` seeds the PE's output latch for the first cycle.
    /// When overwriting is enabled, a duplicate id replaces the node but
    /// keeps the original slot, so PE indices stay a gapless sequence.
    pub fn add_node(
        &mut self,
        id: impl Into<String>,
        op: Opcode,
        initial_output: Option<i32>,
    ) -> Result<&mut MapperNode> {
        let id = id.into();
        let pe_index = match self.nodes.get(&id) {
            Some(existing) => {
                if !self.overwrite_duplicates {
                    return Err(MapperError::DuplicateNode(id));
                }
                tracing::warn!(node = %id, "node already exists, overwriting");
                existing.pe_index()
            }
            None => {
                let pe = self.next_pe_index;
                if pe >= NUM_PES {
                    return Err(MapperError::CapacityExceeded { node: id, pe_index: pe });
                }
                self.next_pe_index += 1;
                pe
            }
        };
        let node = MapperNode::new(id.clone(), op, initial_output, pe_index);
        Ok(insert_node(&mut self.nodes, id, node))
    }

    /// Adds a node at an explicit PE slot (used when reading back a dump).
    pub(crate) fn add_node_at(
        &mut self,
        id: impl Into<String>,
        op: Opcode,
        initial_output_used: bool,
        initial_output: i32,
        pe_index: usize,
    ) -> Result<&mut MapperNode> {
        let id = id.into();
        if pe_index >= NUM_PES {
            return Err(MapperError::CapacityExceeded { node: id, pe_index });
        }
        if self.nodes.contains_key(&id) && !self.overwrite_duplicates {
            return Err(MapperError::DuplicateNode(id));
        }
        let mut node = MapperNode::new(id.clone(), op, None, pe_index);
        node.initial_output_used = initial_output_used;
        node.initial_output = initial_output;
        self.next_pe_index = self.next_pe_index.max(pe_index + 1);
        Ok(insert_node(&mut self.nodes, id, node))
    }

    /// Looks a node up, failing with [`MapperError::NodeNotFound`].
    pub fn node(&self, id: &str) -> Result<&MapperNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| MapperError::NodeNotFound(id.to_owned()))
    }

    /// Mutable lookup, failing with [`MapperError::NodeNotFound`].
    pub fn node_mut(&mut self, id: &str) -> Result<&mut MapperNode> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| MapperError::NodeNotFound(id.to_owned()))
    }

    /// Looks a node up.
    pub fn get(&self, id: &str) -> Option<&MapperNode> {
        self.nodes.get(id)
    }

    /// Mutable lookup.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut MapperNode> {
        self.nodes.get_mut(id)
    }

    /// Whether a node with `id` exists.
    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in id order.
    pub fn iter(&self) -> impl Iterator<Item = &MapperNode> {
        self.nodes.values()
    }

    /// Nodes in ascending PE slot order, the order the assembler and the
    /// dump emit them.
    pub fn iter_by_pe(&self) -> impl Iterator<Item = &MapperNode> {
        self.nodes.values().sorted_by_key(|node| node.pe_index())
    }

    /// Binds every input and output reference to its PE slot. Run once,
    /// after construction completes.
    pub fn resolve_references(&mut self) {
        let pe_indices: BTreeMap<String, usize> = self
            .nodes
            .values()
            .map(|node| (node.id().to_owned(), node.pe_index()))
            .collect();
        for node in self.nodes.values_mut() {
            node.resolve_inputs(&pe_indices);
            node.resolve_outputs(&pe_indices);
        }
        tracing::debug!("PE index resolution complete");
    }
}

fn insert_node(
    nodes: &mut BTreeMap<String, MapperNode>,
    id: String,
    node: MapperNode,
) -> &mut MapperNode {
    match nodes.entry(id) {
        Entry::Occupied(mut occupied) => {
            occupied.insert(node);
            occupied.into_mut()
        }
        Entry::Vacant(vacant) => vacant.insert(node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pe_slots_follow_insertion_order() {
        let mut dfg = MapperDfg::new();
        dfg.add_node("x", Opcode::ADD, Some(0)).unwrap();
        dfg.add_node("a", Opcode::SUB, None).unwrap();
        dfg.add_node("m", Opcode::MUL, None).unwrap();
        assert_eq!(dfg.node("x").unwrap().pe_index(), 0);
        assert_eq!(dfg.node("a").unwrap().pe_index(), 1);
        assert_eq!(dfg.node("m").unwrap().pe_index(), 2);
        // id-ordered iteration and pe-ordered iteration differ
        let by_pe: Vec<_> = dfg.iter_by_pe().map(|n| n.id().to_owned()).collect();
        assert_eq!(by_pe, ["x", "a", "m"]);
    }

    #[test]
    fn duplicate_ids_are_rejected_by_default() {
        let mut dfg = MapperDfg::new();
        dfg.add_node("x", Opcode::ADD, None).unwrap();
        let err = dfg.add_node("x", Opcode::SUB, None).unwrap_err();
        assert!(matches!(err, MapperError::DuplicateNode(id) if id == "x"));
    }

    #[test]
    fn overwrite_keeps_the_original_slot() {
        let mut dfg = MapperDfg::new();
        dfg.allow_overwrite(true);
        dfg.add_node("x", Opcode::ADD, None).unwrap();
        dfg.add_node("y", Opcode::SUB, None).unwrap();
        dfg.add_node("x", Opcode::MUL, None).unwrap();
        let x = dfg.node("x").unwrap();
        assert_eq!(x.opcode(), Opcode::MUL);
        assert_eq!(x.pe_index(), 0);
        // allocator unaffected by the overwrite
        dfg.add_node("z", Opcode::XOR, None).unwrap();
        assert_eq!(dfg.node("z").unwrap().pe_index(), 2);
    }

    #[test]
    fn capacity_is_bounded_by_the_array() {
        let mut dfg = MapperDfg::new();
        for i in 0..NUM_PES {
            dfg.add_node(format!("n{i}"), Opcode::ADD, None).unwrap();
        }
        let err = dfg.add_node("overflow", Opcode::ADD, None).unwrap_err();
        assert!(matches!(err, MapperError::CapacityExceeded { pe_index, .. } if pe_index == NUM_PES));
    }

    #[test]
    fn resolution_binds_known_ids_and_skips_external_names() {
        let mut dfg = MapperDfg::new();
        dfg.add_node("a", Opcode::LOAD, None).unwrap();
        let b = dfg.add_node("b", Opcode::ADD, None).unwrap();
        b.add_input_ref(Operand::I1, "a");
        b.add_input_ref(Operand::I2, "phantom");
        dfg.node_mut("a").unwrap().add_output("b");
        dfg.resolve_references();

        let b = dfg.node("b").unwrap();
        let sources: Vec<_> = b.inputs().iter().map(Input::source).collect();
        assert_eq!(
            sources[0],
            &InputSource::Node { id: "a".into(), pe_index: Some(0) }
        );
        assert_eq!(
            sources[1],
            &InputSource::Node { id: "phantom".into(), pe_index: None }
        );
        assert_eq!(dfg.node("a").unwrap().outputs()[0].pe_index(), Some(1));
    }
}
