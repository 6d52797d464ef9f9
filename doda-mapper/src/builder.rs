//! Turns a kernel description into the full streaming-loop graph.
//!
//! The array runs a single linear map over one input vector, while the
//! kernel in the description only computes one element. The builder wraps it
//! with the loop infrastructure: an induction counter, the continue and
//! terminate conditions, the input load, the output store and the
//! terminator. Creation order is fixed; PE slots depend on it:
//! `counter, continue_condition, terminal_condition, store_output, terminal,
//! <input load>`, then the kernel nodes in description order.

use crate::error::{MapperError, Result};
use crate::graph::{InputSource, MapperDfg, Operand};
use crate::schema::DfgDescription;
use doda_asm::Opcode;

/// Id of the loop induction counter node.
pub const COUNTER: &str = "counter";
/// Id of the loop-continue condition node.
pub const CONTINUE_CONDITION: &str = "continue_condition";
/// Id of the loop-exit condition node.
pub const TERMINAL_CONDITION: &str = "terminal_condition";
/// Id of the output store node.
pub const STORE_OUTPUT: &str = "store_output";
/// Id of the terminator node.
pub const TERMINAL: &str = "terminal";

/// Jump operand of the terminator, inherited from the original toolchain.
/// What the hardware does with the value 100 is not documented there either.
pub const TERMINAL_JUMP_TARGET: i32 = 100;

/// Builds the mapped graph for one kernel description.
#[derive(Debug)]
pub struct GraphBuilder {
    desc: DfgDescription,
    element_count: u32,
    overwrite_duplicates: bool,
}

impl GraphBuilder {
    /// Prepares a builder.
    ///
    /// Warns when the trip-count metadata is missing; the graph is then
    /// built against a vector size of zero and the caller is expected to
    /// have patched the metadata beforehand.
    pub fn new(desc: DfgDescription) -> Self {
        let element_count = desc.element_count();
        if desc.runtime_metadata.is_none() {
            tracing::warn!("no runtime metadata found, vector size defaults to 0");
        } else {
            tracing::debug!(elements = element_count, "vector size");
        }
        Self {
            desc,
            element_count,
            overwrite_duplicates: false,
        }
    }

    /// Restores the legacy overwrite semantics for duplicate node ids.
    pub fn overwrite_duplicates(mut self, allow: bool) -> Self {
        self.overwrite_duplicates = allow;
        self
    }

    /// Constructs the graph and resolves every reference.
    #[tracing::instrument(skip(self))]
    pub fn build(self) -> Result<MapperDfg> {
        let output_id = self
            .desc
            .output_id()
            .ok_or(MapperError::MissingOutput)?
            .to_owned();
        let input_name = self.input_name()?.to_owned();

        let mut dfg = MapperDfg::new();
        dfg.allow_overwrite(self.overwrite_duplicates);

        self.add_counter_node(&mut dfg)?;
        self.add_loop_condition_nodes(&mut dfg)?;
        self.add_store_node(&mut dfg, &output_id)?;
        self.add_terminal_node(&mut dfg)?;
        self.add_load_node(&mut dfg, &input_name)?;
        self.ingest_kernel_nodes(&mut dfg)?;

        // The kernel output feeds the store. The producer only exists, if at
        // all, once the kernel nodes are in.
        match dfg.get_mut(&output_id) {
            Some(producer) => producer.add_output(STORE_OUTPUT),
            None => tracing::warn!(
                output = %output_id,
                "kernel output is not produced by any node"
            ),
        }

        dfg.resolve_references();
        check_self_references(&dfg);
        tracing::debug!(nodes = dfg.len(), "graph construction complete");
        tracing::trace!(graph = %dfg, "final graph structure");
        Ok(dfg)
    }

    fn input_name(&self) -> Result<&str> {
        match self.desc.inputs.as_slice() {
            [single] => Ok(single),
            others => Err(MapperError::InputCardinality(others.len())),
        }
    }

    /// Loop induction variable: latched at 0, increments by 1 each cycle.
    fn add_counter_node(&self, dfg: &mut MapperDfg) -> Result<()> {
        let counter = dfg.add_node(COUNTER, Opcode::ADD, Some(0))?;
        counter.add_input_ref(Operand::I1, COUNTER); // feeds on its own latched output
        counter.add_output(COUNTER);
        counter.add_input_const(Operand::I2, 1);
        Ok(())
    }

    /// `continue_condition: counter < N` gates the loads and stores;
    /// `terminal_condition: counter >= N` fires the terminator.
    fn add_loop_condition_nodes(&self, dfg: &mut MapperDfg) -> Result<()> {
        let elements = self.element_count as i32;

        let cont = dfg.add_node(CONTINUE_CONDITION, Opcode::CLT, None)?;
        cont.add_input_ref(Operand::I1, COUNTER);
        cont.add_input_const(Operand::I2, elements);
        dfg.node_mut(COUNTER)?.add_output(CONTINUE_CONDITION);

        let term = dfg.add_node(TERMINAL_CONDITION, Opcode::CGTE, None)?;
        term.add_input_ref(Operand::I1, COUNTER);
        term.add_input_const(Operand::I2, elements);
        dfg.node_mut(COUNTER)?.add_output(TERMINAL_CONDITION);
        Ok(())
    }

    /// Stores the kernel result at the counter index while the loop runs.
    fn add_store_node(&self, dfg: &mut MapperDfg, output_id: &str) -> Result<()> {
        let store = dfg.add_node(STORE_OUTPUT, Opcode::STORE, None)?;
        store.add_input_ref(Operand::I1, COUNTER);
        store.add_input_ref(Operand::I2, output_id);
        store.add_input_ref(Operand::Pred, CONTINUE_CONDITION);
        dfg.node_mut(COUNTER)?.add_output(STORE_OUTPUT);
        dfg.node_mut(CONTINUE_CONDITION)?.add_output(STORE_OUTPUT);
        Ok(())
    }

    /// Ends the loop once the exit condition holds; i2 orders the jump after
    /// the last store.
    fn add_terminal_node(&self, dfg: &mut MapperDfg) -> Result<()> {
        let terminal = dfg.add_node(TERMINAL, Opcode::JUMP, None)?;
        terminal.add_input_const(Operand::I1, TERMINAL_JUMP_TARGET);
        terminal.add_input_ref(Operand::I2, STORE_OUTPUT);
        terminal.add_input_ref(Operand::Pred, TERMINAL_CONDITION);
        dfg.node_mut(STORE_OUTPUT)?.add_output(TERMINAL);
        dfg.node_mut(TERMINAL_CONDITION)?.add_output(TERMINAL);
        Ok(())
    }

    /// Streams the input array element at the counter index.
    fn add_load_node(&self, dfg: &mut MapperDfg, input_name: &str) -> Result<()> {
        let load = dfg.add_node(input_name, Opcode::LOAD, None)?;
        load.add_input_ref(Operand::I1, COUNTER);
        load.add_input_ref(Operand::Pred, CONTINUE_CONDITION);
        dfg.node_mut(COUNTER)?.add_output(input_name);
        dfg.node_mut(CONTINUE_CONDITION)?.add_output(input_name);
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    fn ingest_kernel_nodes(&self, dfg: &mut MapperDfg) -> Result<()> {
        for node_desc in &self.desc.nodes {
            let op = Opcode::parse(&node_desc.op);
            if op == Opcode::UNSUPPORTED {
                return Err(MapperError::UnsupportedOpcode {
                    node: node_desc.id.clone(),
                    op: node_desc.op.clone(),
                });
            }
            tracing::debug!(node = %node_desc.id, op = %op, "adding kernel node");
            dfg.add_node(node_desc.id.as_str(), op, None)?;

            for input in &node_desc.inputs {
                match (&input.id, input.value) {
                    (Some(source_id), _) => {
                        dfg.node_mut(&node_desc.id)?
                            .add_input_ref(input.kind, source_id.as_str());
                        // Reverse edge on the producer, so the destination
                        // cluster masks can be computed later.
                        match dfg.get_mut(source_id) {
                            Some(producer) => producer.add_output(node_desc.id.as_str()),
                            None => tracing::warn!(
                                node = %node_desc.id,
                                source = %source_id,
                                "input refers to an id no node produces"
                            ),
                        }
                    }
                    (None, Some(value)) => dfg
                        .node_mut(&node_desc.id)?
                        .add_input_const(input.kind, value),
                    (None, None) => tracing::warn!(
                        node = %node_desc.id,
                        "invalid input format, expected an id or a value"
                    ),
                }
            }
        }
        Ok(())
    }
}

/// The counter is the only node allowed to feed on itself; anything else is
/// a malformed kernel worth flagging.
fn check_self_references(dfg: &MapperDfg) {
    for node in dfg.iter() {
        if node.id() == COUNTER {
            continue;
        }
        for input in node.inputs() {
            if let InputSource::Node { id, .. } = input.source() {
                if id == node.id() {
                    tracing::warn!(node = %node.id(), "unexpected self-reference");
                }
            }
        }
    }
}
