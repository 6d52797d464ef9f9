//! Field placement for packing a PE instruction into its raw word.
//!
//! Offsets count from the LSB; this numbering is the hardware contract and
//! matches the RTL's bit ordering.

use crate::params::{
    DATA_WIDTH, NUM_CLUSTER, OPCODE_WIDTH, PE_IDX_WIDTH, PROG_MEM_WIDTH, SRC_IDX_WIDTH,
};
use crate::pe_op::{PeOp, RawWord};

pub(crate) const PE_IDX_OFFSET: usize = 0;
pub(crate) const I1_USED_OFFSET: usize = PE_IDX_OFFSET + PE_IDX_WIDTH;
pub(crate) const I1_CONST_USED_OFFSET: usize = I1_USED_OFFSET + 1;
pub(crate) const I1_SRC_OR_CONST_OFFSET: usize = I1_CONST_USED_OFFSET + 1;
pub(crate) const I2_USED_OFFSET: usize = I1_SRC_OR_CONST_OFFSET + DATA_WIDTH;
pub(crate) const I2_CONST_USED_OFFSET: usize = I2_USED_OFFSET + 1;
pub(crate) const I2_SRC_OR_CONST_OFFSET: usize = I2_CONST_USED_OFFSET + 1;
pub(crate) const PRED_USED_OFFSET: usize = I2_SRC_OR_CONST_OFFSET + DATA_WIDTH;
pub(crate) const PRED_SRC_OFFSET: usize = PRED_USED_OFFSET + 1;
pub(crate) const INIT_OUT_USED_OFFSET: usize = PRED_SRC_OFFSET + SRC_IDX_WIDTH;
pub(crate) const INIT_OUT_OFFSET: usize = INIT_OUT_USED_OFFSET + 1;
pub(crate) const OPCODE_OFFSET: usize = INIT_OUT_OFFSET + DATA_WIDTH;
pub(crate) const DST_CLUSTER_OH_OFFSET: usize = OPCODE_OFFSET + OPCODE_WIDTH;

/// First bit past the last field; everything above is zero padding.
pub(crate) const USED_BITS: usize = DST_CLUSTER_OH_OFFSET + NUM_CLUSTER;

const _: () = assert!(USED_BITS <= PROG_MEM_WIDTH);

pub(crate) fn word_from_op(op: &PeOp) -> RawWord {
    field(op.idx as u128, PE_IDX_OFFSET, PE_IDX_WIDTH)
        | flag(op.i1_used, I1_USED_OFFSET)
        | flag(op.i1_const_used, I1_CONST_USED_OFFSET)
        | signed_field(op.i1_src_or_const, I1_SRC_OR_CONST_OFFSET, DATA_WIDTH)
        | flag(op.i2_used, I2_USED_OFFSET)
        | flag(op.i2_const_used, I2_CONST_USED_OFFSET)
        | signed_field(op.i2_src_or_const, I2_SRC_OR_CONST_OFFSET, DATA_WIDTH)
        | flag(op.pred_used, PRED_USED_OFFSET)
        | signed_field(op.pred_src, PRED_SRC_OFFSET, SRC_IDX_WIDTH)
        | flag(op.init_out_used, INIT_OUT_USED_OFFSET)
        | signed_field(op.init_out, INIT_OUT_OFFSET, DATA_WIDTH)
        | field(op.opcode as u8 as u128, OPCODE_OFFSET, OPCODE_WIDTH)
        | field(op.dst_clusters.bits() as u128, DST_CLUSTER_OH_OFFSET, NUM_CLUSTER)
}

/// Low `width` bits of `value`, shifted into place.
fn field(value: u128, offset: usize, width: usize) -> RawWord {
    (value & mask(width)) << offset
}

/// Two's-complement truncation to `width` bits, shifted into place.
fn signed_field(value: i64, offset: usize, width: usize) -> RawWord {
    field(value as u64 as u128, offset, width)
}

fn flag(on: bool, offset: usize) -> RawWord {
    (on as u128) << offset
}

pub(crate) const fn mask(width: usize) -> u128 {
    if width >= 128 {
        u128::MAX
    } else {
        (1 << width) - 1
    }
}
