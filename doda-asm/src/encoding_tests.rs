use crate::params::*;
use crate::{bit_string, ClusterMask, Opcode, PeOp};
use proptest::prelude::*;
use strum::IntoEnumIterator;

/// Fixed-width binary rendering, two's complement for negatives. Reference
/// construction used to cross-check the packed layout field by field.
fn bin(value: i64, width: usize) -> String {
    (0..width)
        .rev()
        .map(|bit| if (value >> bit) & 1 == 1 { '1' } else { '0' })
        .collect()
}

/// Renders `op` the way the word is laid out: MSB-first concatenation of
/// padding, then the fields from the top of the word down to `pe_idx`.
fn reference_bit_string(op: &PeOp) -> String {
    let used = PE_IDX_WIDTH + SRC_IDX_WIDTH + DATA_WIDTH * 3 + OPCODE_WIDTH + NUM_CLUSTER + 6;
    let mut s = "0".repeat(PROG_MEM_WIDTH - used);
    s += &bin(op.dst_clusters.bits() as i64, NUM_CLUSTER);
    s += &bin(op.opcode as u8 as i64, OPCODE_WIDTH);
    s += &bin(op.init_out, DATA_WIDTH);
    s += &bin(op.init_out_used as i64, 1);
    s += &bin(op.pred_src, SRC_IDX_WIDTH);
    s += &bin(op.pred_used as i64, 1);
    s += &bin(op.i2_src_or_const, DATA_WIDTH);
    s += &bin(op.i2_const_used as i64, 1);
    s += &bin(op.i2_used as i64, 1);
    s += &bin(op.i1_src_or_const, DATA_WIDTH);
    s += &bin(op.i1_const_used as i64, 1);
    s += &bin(op.i1_used as i64, 1);
    s += &bin(op.idx as i64, PE_IDX_WIDTH);
    s
}

fn sample_op() -> PeOp {
    let mut op = PeOp::nil(42);
    op.opcode = Opcode::ADD;
    op.i1_used = true;
    op.i1_src_or_const = 5;
    op.i2_used = true;
    op.i2_const_used = true;
    op.i2_src_or_const = -7;
    op.pred_used = true;
    op.pred_src = 1;
    op.init_out_used = true;
    op.init_out = 0;
    op.dst_clusters = ClusterMask::CLUSTER_2;
    op
}

#[test]
fn word_is_prog_mem_width_bits() {
    assert_eq!(PeOp::nil(0).to_bit_string().len(), PROG_MEM_WIDTH);
    assert_eq!(sample_op().to_bit_string().len(), PROG_MEM_WIDTH);
}

#[test]
fn nil_word_carries_only_the_slot_index() {
    for idx in 0..NUM_PES {
        let raw = PeOp::nil(idx as u8).to_raw();
        assert_eq!(raw, idx as u128);
    }
}

#[test]
fn layout_matches_reference_rendering() {
    let cases = [
        PeOp::nil(0),
        PeOp::nil(127),
        sample_op(),
        {
            let mut op = PeOp::nil(3);
            op.opcode = Opcode::JUMP;
            op.i1_used = true;
            op.i1_const_used = true;
            op.i1_src_or_const = 100;
            op.i2_used = true;
            op.i2_src_or_const = -1;
            op.pred_used = true;
            op.pred_src = 2;
            op
        },
    ];
    for op in cases {
        assert_eq!(op.to_bit_string(), reference_bit_string(&op));
    }
}

#[test]
fn negative_values_truncate_two_complement() {
    let mut op = PeOp::nil(0);
    op.i1_used = true;
    op.i1_src_or_const = -1;
    let decoded = PeOp::from_raw(op.to_raw());
    assert_eq!(decoded.i1_src_or_const, u32::MAX as i64);
    // Re-packing the truncated image reproduces the same word.
    assert_eq!(decoded.to_raw(), op.to_raw());
}

#[test]
fn every_opcode_survives_the_field() {
    for opcode in Opcode::iter() {
        let mut op = PeOp::nil(9);
        op.opcode = opcode;
        assert_eq!(PeOp::from_raw(op.to_raw()).opcode, opcode);
    }
}

proptest! {
    #[test]
    fn pack_unpack_round_trip(
        idx in 0u8..(NUM_PES as u8),
        i1_used: bool,
        i1_const_used: bool,
        i1 in any::<i32>(),
        i2_used: bool,
        i2_const_used: bool,
        i2 in any::<i32>(),
        pred_used: bool,
        pred in 0i64..(1 << SRC_IDX_WIDTH),
        init_used: bool,
        init in any::<i32>(),
        opcode_byte in 0u8..(1 << OPCODE_WIDTH),
        dst in 0u8..(1 << NUM_CLUSTER),
    ) {
        let op = PeOp {
            idx,
            i1_used,
            i1_const_used,
            i1_src_or_const: i1 as i64,
            i2_used,
            i2_const_used,
            i2_src_or_const: i2 as i64,
            pred_used,
            pred_src: pred,
            init_out_used: init_used,
            init_out: init as i64,
            opcode: Opcode::from(opcode_byte),
            dst_clusters: ClusterMask::from_bits_truncate(dst),
        };
        let raw = op.to_raw();
        // Encoding is stable under a decode/encode cycle.
        prop_assert_eq!(PeOp::from_raw(raw).to_raw(), raw);
        prop_assert_eq!(bit_string(raw).len(), PROG_MEM_WIDTH);
        prop_assert_eq!(op.to_bit_string(), reference_bit_string(&op));
    }
}
