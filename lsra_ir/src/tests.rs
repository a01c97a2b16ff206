//! Tests for the graph builder, queries and display.

use crate::builder::GraphBuilder;
use crate::graph::Graph;
use crate::value::BlockRef;

/// entry -> header <-> body, header -> exit
fn build_loop() -> Graph {
    let mut b = GraphBuilder::new();
    let entry = b.create_block();
    let header = b.create_block();
    let body = b.create_block();
    let exit = b.create_block();

    b.switch_to_block(entry);
    let init = b.node("literal", &[]);
    b.control("jump", &[], &[header]);

    b.switch_to_block(header);
    let phi = b.phi(&[init]);
    b.control("br", &[phi], &[body, exit]);

    b.switch_to_block(body);
    let next = b.node("inc", &[phi]);
    b.add_phi_input(phi, next);
    b.control("jump", &[], &[header]);

    b.switch_to_block(exit);
    b.control("ret", &[phi], &[]);

    b.finish()
}

#[test]
fn edges_follow_control_order() {
    let g = build_loop();
    assert_eq!(g.blocks.len(), 4);
    assert_eq!(g.block(BlockRef(0)).successors, vec![BlockRef(1)]);
    assert_eq!(
        g.block(BlockRef(1)).predecessors,
        vec![BlockRef(0), BlockRef(2)]
    );
    assert_eq!(
        g.block(BlockRef(1)).successors,
        vec![BlockRef(2), BlockRef(3)]
    );
    assert_eq!(g.block(BlockRef(3)).predecessors, vec![BlockRef(1)]);
}

#[test]
fn phi_inputs_completed_later() {
    let g = build_loop();
    let phis: Vec<_> = g.phis(BlockRef(1)).collect();
    assert_eq!(phis.len(), 1);
    let phi = g.node(phis[0]);
    assert!(phi.is_phi());
    assert_eq!(phi.inputs.len(), 2);
    assert_eq!(g.node(phi.inputs[1]).opcode, "inc");
}

#[test]
fn loop_header_heuristic() {
    let g = build_loop();
    assert!(!g.is_loop_header(BlockRef(0)));
    assert!(g.is_loop_header(BlockRef(1)));
    assert!(!g.is_loop_header(BlockRef(2)));
    assert_eq!(g.loop_back_edge(BlockRef(1)), Some(BlockRef(2)));
    assert_eq!(g.loop_back_edge(BlockRef(3)), None);
}

#[test]
fn merge_with_forward_predecessors_is_not_a_loop() {
    let mut b = GraphBuilder::new();
    let entry = b.create_block();
    let left = b.create_block();
    let right = b.create_block();
    let join = b.create_block();

    b.switch_to_block(entry);
    let c = b.node("literal", &[]);
    b.control("br", &[c], &[left, right]);
    b.switch_to_block(left);
    b.control("jump", &[], &[join]);
    b.switch_to_block(right);
    b.control("jump", &[], &[join]);
    b.switch_to_block(join);
    b.control("ret", &[], &[]);

    let g = b.finish();
    assert_eq!(g.block(join).predecessors, vec![left, right]);
    assert!(!g.is_loop_header(join));
    assert_eq!(g.predecessor_index(join, right), Some(1));
    assert_eq!(g.predecessor_index(join, entry), None);
}

#[test]
fn last_control_requires_control_node() {
    let mut b = GraphBuilder::new();
    let open = b.create_block();
    let closed = b.create_block();
    b.switch_to_block(open);
    b.node("literal", &[]);
    b.switch_to_block(closed);
    let ret = b.control("ret", &[], &[]);
    let g = b.finish();

    assert_eq!(g.last_control(open), None);
    assert_eq!(g.last_control(closed), Some(ret));
}

#[test]
fn display_graph() {
    let g = build_loop();
    let text = g.to_string();
    assert!(text.contains("bb0:\n  v0 = literal\n  jump -> bb1\n"), "{text}");
    assert!(text.contains("bb1: preds(bb0, bb2)\n  v2 = ssa:phi v0, v4\n"), "{text}");
    assert!(text.contains("  br v2 -> bb2, bb3\n"), "{text}");
}

#[test]
#[should_panic(expected = "switch_to_block")]
fn node_without_block_panics() {
    let mut b = GraphBuilder::new();
    b.create_block();
    b.node("literal", &[]);
}
