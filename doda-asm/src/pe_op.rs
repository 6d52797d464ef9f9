use crate::params::PROG_MEM_WIDTH;
use crate::{pack, unpack, ClusterMask, Opcode};

/// Raw program-memory word of a single PE.
pub type RawWord = u128;

/// One decoded PE instruction.
///
/// Field-for-field image of the program memory word. [`PeOp::to_raw`] packs
/// it; [`PeOp::from_raw`] recovers it. Operand values are `i64` so both
/// source PE indices and signed constants (including the unresolved `-1`
/// sentinel) fit; packing truncates to the field width, two's complement for
/// negatives, and unpacking yields the raw unsigned field bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeOp {
    /// Global PE index of this instruction's slot.
    pub idx: u8,
    /// Operand i1 present.
    pub i1_used: bool,
    /// Operand i1 is a constant.
    pub i1_const_used: bool,
    /// Source PE index or constant value for i1.
    pub i1_src_or_const: i64,
    /// Operand i2 present.
    pub i2_used: bool,
    /// Operand i2 is a constant.
    pub i2_const_used: bool,
    /// Source PE index or constant value for i2.
    pub i2_src_or_const: i64,
    /// Predicate operand present.
    pub pred_used: bool,
    /// Source PE index for the predicate; predicates are never constant.
    pub pred_src: i64,
    /// Initial-output latch present.
    pub init_out_used: bool,
    /// Value the PE presents on its output on the first cycle.
    pub init_out: i64,
    /// ALU operation.
    pub opcode: Opcode,
    /// Clusters other than this PE's own that consume the output.
    pub dst_clusters: ClusterMask,
}

impl PeOp {
    /// Inert instruction bound to slot `idx`.
    ///
    /// Unoccupied slots are programmed with this word so they stay inert
    /// while still reporting their own index.
    pub fn nil(idx: u8) -> Self {
        Self {
            idx,
            i1_used: false,
            i1_const_used: false,
            i1_src_or_const: 0,
            i2_used: false,
            i2_const_used: false,
            i2_src_or_const: 0,
            pred_used: false,
            pred_src: 0,
            init_out_used: false,
            init_out: 0,
            opcode: Opcode::NIL,
            dst_clusters: ClusterMask::empty(),
        }
    }

    /// Packs the instruction into its raw word.
    pub fn to_raw(&self) -> RawWord {
        pack::word_from_op(self)
    }

    /// Recovers the instruction image from a raw word.
    pub fn from_raw(raw: RawWord) -> Self {
        unpack::op_from_word(raw)
    }

    /// Renders the packed word as ASCII binary digits, MSB first.
    pub fn to_bit_string(&self) -> String {
        bit_string(self.to_raw())
    }
}

/// Renders a raw word as [`PROG_MEM_WIDTH`] ASCII binary digits, MSB first.
pub fn bit_string(raw: RawWord) -> String {
    format!("{raw:0width$b}", width = PROG_MEM_WIDTH)
}
