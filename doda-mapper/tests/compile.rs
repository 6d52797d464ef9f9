//! End-to-end compilation scenarios against literal kernel descriptions.

use doda_mapper::prelude::*;
use doda_mapper::{compile, compile_value};
use doda_asm::params::{NUM_CLUSTER, PES_PER_CLUSTER, PROG_MEM_WIDTH};
use serde_json::json;

fn identity_json() -> serde_json::Value {
    json!({
        "inputs": ["a"],
        "output": {"id": "a"},
        "nodes": [],
        "runtime_metadata": {"input_size_in_bytes": 24}
    })
}

fn threshold_json() -> serde_json::Value {
    json!({
        "inputs": ["a"],
        "output": {"id": "t"},
        "nodes": [{
            "id": "t",
            "op": "icmp_sge",
            "inputs": [
                {"type": "i1", "id": "a"},
                {"type": "i2", "value": 1}
            ]
        }],
        "runtime_metadata": {"input_size_in_bytes": 24}
    })
}

fn doubler_json() -> serde_json::Value {
    json!({
        "inputs": ["a"],
        "output": {"id": "d"},
        "nodes": [{
            "id": "d",
            "op": "mul",
            "inputs": [
                {"type": "i1", "id": "a"},
                {"type": "i2", "value": 2}
            ]
        }],
        "runtime_metadata": {"input_size_in_bytes": 24}
    })
}

#[test]
fn identity_map_populates_the_infrastructure_slots() {
    let bitstream = compile_value(identity_json()).unwrap();

    // loop plumbing in creation order
    assert_eq!(bitstream.op(0, 0).opcode, Opcode::ADD); // counter
    assert_eq!(bitstream.op(0, 1).opcode, Opcode::CLT); // continue_condition
    assert_eq!(bitstream.op(0, 2).opcode, Opcode::CGTE); // terminal_condition
    assert_eq!(bitstream.op(0, 3).opcode, Opcode::STORE); // store_output
    assert_eq!(bitstream.op(0, 4).opcode, Opcode::JUMP); // terminal
    assert_eq!(bitstream.op(0, 5).opcode, Opcode::LOAD); // a

    // everything past the load is an untouched nil slot
    for cluster in 0..NUM_CLUSTER {
        for pe in 0..PES_PER_CLUSTER {
            let index = cluster * PES_PER_CLUSTER + pe;
            if index > 5 {
                assert_eq!(bitstream.word(cluster, pe), index as u128);
            }
        }
    }
}

#[test]
fn identity_map_wires_the_counter_loop() {
    let bitstream = compile_value(identity_json()).unwrap();

    let counter = bitstream.op(0, 0);
    assert!(counter.i1_used && !counter.i1_const_used);
    assert_eq!(counter.i1_src_or_const, 0); // feeds on itself
    assert!(counter.i2_used && counter.i2_const_used);
    assert_eq!(counter.i2_src_or_const, 1);
    assert!(counter.init_out_used);
    assert_eq!(counter.init_out, 0);

    let cont = bitstream.op(0, 1);
    assert_eq!(cont.i1_src_or_const, 0);
    assert!(cont.i2_const_used);
    assert_eq!(cont.i2_src_or_const, 6); // 24 bytes -> 6 elements

    let load = bitstream.op(0, 5);
    assert_eq!(load.i1_src_or_const, 0);
    assert!(load.pred_used);
    assert_eq!(load.pred_src, 1);

    // the identity kernel stores the load's output directly
    let store = bitstream.op(0, 3);
    assert!(store.i2_used && !store.i2_const_used);
    assert_eq!(store.i2_src_or_const, 5);
    assert_eq!(store.pred_src, 1);
}

#[test]
fn threshold_kernel_lands_after_the_load() {
    let bitstream = compile_value(threshold_json()).unwrap();

    let load = bitstream.op(0, 5);
    assert_eq!(load.opcode, Opcode::LOAD);

    let t = bitstream.op(0, 6);
    assert_eq!(t.opcode, Opcode::CGTE);
    assert!(t.i1_used && !t.i1_const_used);
    assert_eq!(t.i1_src_or_const, 5);
    assert!(t.i2_used && t.i2_const_used);
    assert_eq!(t.i2_src_or_const, 1);
    // the store is in the same cluster, so no cross-cluster fanout
    assert!(t.dst_clusters.is_empty());

    let store = bitstream.op(0, 3);
    assert_eq!(store.i2_src_or_const, 6);
}

#[test]
fn doubler_kernel_encodes_its_constant() {
    let bitstream = compile_value(doubler_json()).unwrap();

    let d = bitstream.op(0, 6);
    assert_eq!(d.opcode, Opcode::MUL);
    assert_eq!(d.i1_src_or_const, 5);
    assert!(d.i2_const_used);
    assert_eq!(d.i2_src_or_const, 2);

    let terminal = bitstream.op(0, 4);
    assert!(terminal.i1_const_used);
    assert_eq!(terminal.i1_src_or_const, 100);
}

#[test]
fn cross_cluster_consumers_set_the_destination_mask() {
    // k0 lands on PE 6; k1..k26 all consume it, the last one from PE 32
    // (cluster 1). k26 is the kernel output, consumed by the store in
    // cluster 0.
    let mut nodes = vec![json!({
        "id": "k0",
        "op": "add",
        "inputs": [{"type": "i1", "id": "a"}, {"type": "i2", "value": 1}]
    })];
    for i in 1..=26 {
        nodes.push(json!({
            "id": format!("k{i}"),
            "op": "add",
            "inputs": [{"type": "i1", "id": "k0"}, {"type": "i2", "value": 1}]
        }));
    }
    let bitstream = compile_value(json!({
        "inputs": ["a"],
        "output": {"id": "k26"},
        "nodes": nodes,
        "runtime_metadata": {"input_size_in_bytes": 24}
    }))
    .unwrap();

    let k0 = bitstream.op(0, 6);
    assert_eq!(k0.opcode, Opcode::ADD);
    assert_eq!(k0.dst_clusters, ClusterMask::CLUSTER_1);

    let k26 = bitstream.op(1, 0);
    assert_eq!(k26.idx, 32);
    assert_eq!(k26.i1_src_or_const, 6);
    assert_eq!(k26.dst_clusters, ClusterMask::CLUSTER_0);

    let store = bitstream.op(0, 3);
    assert_eq!(store.i2_src_or_const, 32);

    // a node never lists its own cluster as a destination
    for cluster in 0..NUM_CLUSTER {
        for pe in 0..PES_PER_CLUSTER {
            let op = bitstream.op(cluster, pe);
            assert!(!op.dst_clusters.contains(ClusterMask::cluster(cluster)));
        }
    }
}

#[test]
fn unsupported_operations_fail_the_compile() {
    let err = compile_value(json!({
        "inputs": ["a"],
        "output": {"id": "f"},
        "nodes": [{
            "id": "f",
            "op": "fadd",
            "inputs": [{"type": "i1", "id": "a"}]
        }],
        "runtime_metadata": {"input_size_in_bytes": 24}
    }))
    .unwrap_err();
    match err {
        MapperError::UnsupportedOpcode { node, op } => {
            assert_eq!(node, "f");
            assert_eq!(op, "fadd");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn empty_kernel_with_external_output_still_compiles() {
    // Nothing produces "result": the store's data reference must survive as
    // the all-ones sentinel while the rest of the word stays intact.
    let bitstream = compile_value(json!({
        "inputs": ["a"],
        "output": {"id": "result"},
        "nodes": [],
        "runtime_metadata": {"input_size_in_bytes": 24}
    }))
    .unwrap();

    let store = bitstream.op(0, 3);
    assert_eq!(store.opcode, Opcode::STORE);
    assert!(store.i2_used && !store.i2_const_used);
    assert_eq!(store.i2_src_or_const, u32::MAX as i64);
    assert_eq!(store.i1_src_or_const, 0);

    for line in bitstream.to_text().lines() {
        if !line.is_empty() && !line.starts_with('#') {
            assert_eq!(line.len(), PROG_MEM_WIDTH);
        }
    }
}

#[test]
fn zero_element_vector_still_fills_every_slot() {
    let bitstream = compile_value(json!({
        "inputs": ["a"],
        "output": {"id": "a"},
        "nodes": []
    }))
    .unwrap();

    let cont = bitstream.op(0, 1);
    assert!(cont.i2_const_used);
    assert_eq!(cont.i2_src_or_const, 0);
    assert_eq!(bitstream.clusters().len(), NUM_CLUSTER);
    for cluster in bitstream.clusters() {
        assert_eq!(cluster.len(), PES_PER_CLUSTER);
    }
}

#[test]
fn every_slot_reports_its_own_index() {
    let bitstream = compile_value(threshold_json()).unwrap();
    for cluster in 0..NUM_CLUSTER {
        for pe in 0..PES_PER_CLUSTER {
            let op = bitstream.op(cluster, pe);
            assert_eq!(op.idx as usize, cluster * PES_PER_CLUSTER + pe);
        }
    }
}

#[test]
fn schema_violations_are_fatal() {
    let missing_output = compile_value(json!({"inputs": ["a"], "nodes": []})).unwrap_err();
    assert!(matches!(missing_output, MapperError::MissingOutput));

    let two_inputs =
        compile_value(json!({"inputs": ["a", "b"], "output": "a", "nodes": []})).unwrap_err();
    assert!(matches!(two_inputs, MapperError::InputCardinality(2)));
}

#[test]
fn compiles_from_a_description_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doubler.json");
    std::fs::write(&path, serde_json::to_string_pretty(&doubler_json()).unwrap()).unwrap();

    let from_file = compile(&path).unwrap();
    let from_value = compile_value(doubler_json()).unwrap();
    assert_eq!(from_file, from_value);
}

#[test]
fn metadata_patching_fixes_the_trip_count() {
    let mut desc = DfgDescription::from_value(json!({
        "inputs": ["a"],
        "output": {"id": "a"},
        "nodes": []
    }))
    .unwrap();
    desc.runtime_metadata = Some(RuntimeMetadata::for_element_count(6));

    let bitstream = doda_mapper::compile_description(desc).unwrap();
    assert_eq!(bitstream.op(0, 1).i2_src_or_const, 6);
}
