//! Field extraction for decoding a raw word back into a PE instruction.

use crate::pack::{
    mask, DST_CLUSTER_OH_OFFSET, I1_CONST_USED_OFFSET, I1_SRC_OR_CONST_OFFSET, I1_USED_OFFSET,
    I2_CONST_USED_OFFSET, I2_SRC_OR_CONST_OFFSET, I2_USED_OFFSET, INIT_OUT_OFFSET,
    INIT_OUT_USED_OFFSET, OPCODE_OFFSET, PE_IDX_OFFSET, PRED_SRC_OFFSET, PRED_USED_OFFSET,
};
use crate::params::{DATA_WIDTH, NUM_CLUSTER, OPCODE_WIDTH, PE_IDX_WIDTH, SRC_IDX_WIDTH};
use crate::pe_op::{PeOp, RawWord};
use crate::{ClusterMask, Opcode};

pub(crate) fn op_from_word(raw: RawWord) -> PeOp {
    PeOp {
        idx: extract(raw, PE_IDX_OFFSET, PE_IDX_WIDTH) as u8,
        i1_used: bit(raw, I1_USED_OFFSET),
        i1_const_used: bit(raw, I1_CONST_USED_OFFSET),
        i1_src_or_const: extract(raw, I1_SRC_OR_CONST_OFFSET, DATA_WIDTH) as i64,
        i2_used: bit(raw, I2_USED_OFFSET),
        i2_const_used: bit(raw, I2_CONST_USED_OFFSET),
        i2_src_or_const: extract(raw, I2_SRC_OR_CONST_OFFSET, DATA_WIDTH) as i64,
        pred_used: bit(raw, PRED_USED_OFFSET),
        pred_src: extract(raw, PRED_SRC_OFFSET, SRC_IDX_WIDTH) as i64,
        init_out_used: bit(raw, INIT_OUT_USED_OFFSET),
        init_out: extract(raw, INIT_OUT_OFFSET, DATA_WIDTH) as i64,
        opcode: Opcode::from(extract(raw, OPCODE_OFFSET, OPCODE_WIDTH) as u8),
        dst_clusters: ClusterMask::from_bits_truncate(
            extract(raw, DST_CLUSTER_OH_OFFSET, NUM_CLUSTER) as u8,
        ),
    }
}

fn extract(raw: RawWord, offset: usize, width: usize) -> u128 {
    (raw >> offset) & mask(width)
}

fn bit(raw: RawWord, offset: usize) -> bool {
    (raw >> offset) & 1 == 1
}
