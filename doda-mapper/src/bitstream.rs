//! Instruction encoding and cluster-major bitstream assembly.

use crate::error::{MapperError, Result};
use crate::graph::{InputSource, MapperDfg, MapperNode, Operand};
use doda_asm::params::{
    cluster_of, pe_within_cluster, DATA_WIDTH, NUM_CLUSTER, OPCODE_WIDTH, PES_PER_CLUSTER,
    PE_IDX_WIDTH, PROG_MEM_WIDTH, SRC_IDX_WIDTH,
};
use doda_asm::{bit_string, ClusterMask, PeOp, RawWord};
use std::fmt;

/// Encoding of a reference the resolution pass could not bind. All-ones
/// after truncation to the field width.
const UNRESOLVED: i64 = -1;

/// Per-slot configuration words for the whole array, cluster-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitstream {
    words: Vec<Vec<RawWord>>,
}

impl Bitstream {
    /// Array configuration with every slot holding its nil instruction, so
    /// unprogrammed slots stay inert.
    fn inert() -> Self {
        let words = (0..NUM_CLUSTER)
            .map(|cluster| {
                (0..PES_PER_CLUSTER)
                    .map(|pe| PeOp::nil((cluster * PES_PER_CLUSTER + pe) as u8).to_raw())
                    .collect()
            })
            .collect();
        Self { words }
    }

    /// Raw word of one slot.
    pub fn word(&self, cluster: usize, pe: usize) -> RawWord {
        self.words[cluster][pe]
    }

    /// Decoded instruction of one slot.
    pub fn op(&self, cluster: usize, pe: usize) -> PeOp {
        PeOp::from_raw(self.words[cluster][pe])
    }

    /// Per-cluster word arrays.
    pub fn clusters(&self) -> &[Vec<RawWord>] {
        &self.words
    }

    /// Textual bitstream file form: a `# Cluster <n>` comment, one binary
    /// line per PE, and a blank line closing each cluster block.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Bitstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (cluster, words) in self.words.iter().enumerate() {
            writeln!(f, "# Cluster {cluster}")?;
            for word in words {
                writeln!(f, "{}", bit_string(*word))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Encodes one node into its PE instruction.
pub fn encode_node(node: &MapperNode) -> Result<PeOp> {
    check_field_widths()?;

    let mut op = PeOp::nil(node.pe_index() as u8);
    op.opcode = node.opcode();
    op.init_out_used = node.initial_output_used();
    op.init_out = node.initial_output() as i64;

    for input in node.inputs() {
        match input.kind() {
            Operand::I1 => {
                op.i1_used = true;
                match input.source() {
                    InputSource::Const(value) => {
                        op.i1_const_used = true;
                        op.i1_src_or_const = *value as i64;
                    }
                    InputSource::Node { pe_index, .. } => {
                        op.i1_src_or_const = pe_index.map_or(UNRESOLVED, |pe| pe as i64);
                    }
                }
            }
            Operand::I2 => {
                op.i2_used = true;
                match input.source() {
                    InputSource::Const(value) => {
                        op.i2_const_used = true;
                        op.i2_src_or_const = *value as i64;
                    }
                    InputSource::Node { pe_index, .. } => {
                        op.i2_src_or_const = pe_index.map_or(UNRESOLVED, |pe| pe as i64);
                    }
                }
            }
            Operand::Pred => {
                op.pred_used = true;
                op.pred_src = match input.source() {
                    InputSource::Node { pe_index, .. } => {
                        pe_index.map_or(UNRESOLVED, |pe| pe as i64)
                    }
                    InputSource::Const(_) => {
                        // Predicate constants are not representable in the
                        // word; flag and encode as unresolved.
                        tracing::warn!(node = %node.id(), "constant predicate input");
                        UNRESOLVED
                    }
                };
            }
        }
    }

    op.dst_clusters = destination_clusters(node);
    Ok(op)
}

/// One-hot mask of the *other* clusters consuming this node's output.
///
/// Same-cluster consumers ride the local bypass network and never set a bit;
/// unresolved consumers contribute nothing.
fn destination_clusters(node: &MapperNode) -> ClusterMask {
    let own = cluster_of(node.pe_index());
    let mut mask = ClusterMask::empty();
    for output in node.outputs() {
        let Some(consumer_pe) = output.pe_index() else {
            continue;
        };
        let cluster = cluster_of(consumer_pe);
        if cluster != own {
            mask |= ClusterMask::cluster(cluster);
        }
    }
    mask
}

/// Guards against a miscomputed width constant, which would silently corrupt
/// every word.
fn check_field_widths() -> Result<()> {
    let used = PE_IDX_WIDTH + SRC_IDX_WIDTH + DATA_WIDTH * 3 + OPCODE_WIDTH + NUM_CLUSTER + 6;
    if used > PROG_MEM_WIDTH {
        return Err(MapperError::FieldOverflow { used });
    }
    Ok(())
}

/// Assembles the bitstream for a fully resolved graph.
///
/// Slots are initialized inert, then overwritten per node in ascending PE
/// order.
#[tracing::instrument(skip(dfg))]
pub fn generate_bitstream(dfg: &MapperDfg) -> Result<Bitstream> {
    let mut bitstream = Bitstream::inert();
    for node in dfg.iter_by_pe() {
        let cluster = cluster_of(node.pe_index());
        let pe = pe_within_cluster(node.pe_index());
        if cluster >= NUM_CLUSTER || pe >= PES_PER_CLUSTER {
            return Err(MapperError::CapacityExceeded {
                node: node.id().to_owned(),
                pe_index: node.pe_index(),
            });
        }
        let op = encode_node(node)?;
        tracing::trace!(
            node = %node.id(),
            cluster,
            pe,
            word = %op.to_bit_string(),
            "placed instruction"
        );
        bitstream.words[cluster][pe] = op.to_raw();
    }
    Ok(bitstream)
}
