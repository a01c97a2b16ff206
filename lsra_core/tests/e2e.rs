//! End-to-end: opcode table → graph → intervals → toy allocator → resolved
//! stream, checked by replaying every path through the stream.

use std::collections::HashMap;
use std::fs;

use lsra_core::{
    Allocation, Builder, Config, IntervalId, LiveRange, Move, Operand, Position, Resolver, Slot,
};
use lsra_ir::{Graph, GraphBuilder, NodeRef};

const TABLE: &str = r#"{
    "registers": ["rax", "rbx", "rcx"],
    "opcodes": {
        "literal":   { "output": "any" },
        "inc":       { "output": "any", "inputs": ["any"] },
        "call":      { "output": { "kind": "register", "value": "rax" },
                       "spills": [{ "kind": "register", "value": "rcx" }] },
        "use2":      { "inputs": ["any", "any"] },
        "ret":       { "inputs": ["any"] },
        "ret_fixed": { "inputs": [{ "kind": "register", "value": "rax" }] },
        "jump":      { "branch": true },
        "br":        { "inputs": ["any"], "branch": true }
    }
}"#;

const RAX: Operand = Operand::fixed(0);

fn load_config() -> Config {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x86.json");
    fs::write(&path, TABLE).unwrap();
    Config::from_reader(fs::File::open(&path).unwrap()).unwrap()
}

/// Every alive interval gets its own stack slot.
fn allocate_stack(alloc: &mut Allocation) {
    let work: Vec<IntervalId> = alloc.groups().iter().flatten().copied().collect();
    for (slot, id) in work.into_iter().enumerate() {
        alloc.assign(id, Operand::stack(slot as u32));
    }
}

fn overlaps(a: &[LiveRange], b: &[LiveRange]) -> bool {
    a.iter()
        .any(|x| b.iter().any(|y| x.start < y.end && y.start < x.end))
}

/// First register free over the whole interval, else a fresh stack slot.
fn allocate_greedy(alloc: &mut Allocation) {
    let mut taken: Vec<Vec<LiveRange>> = alloc
        .registers()
        .iter()
        .map(|r| r.ranges().to_vec())
        .collect();
    let mut slots = 0;
    let work: Vec<IntervalId> = alloc.groups().iter().flatten().copied().collect();
    for id in work {
        let ranges = alloc.interval(id).ranges().to_vec();
        let value = match taken.iter().position(|t| !overlaps(t, &ranges)) {
            Some(reg) => {
                taken[reg].extend_from_slice(&ranges);
                Operand::fixed(reg as u32)
            }
            None => {
                slots += 1;
                Operand::stack(slots - 1)
            }
        };
        alloc.assign(id, value);
    }
}

type State = HashMap<Operand, NodeRef>;

/// A φ is satisfied by whichever input arrived along the taken edge.
fn holds(graph: &Graph, state: &State, loc: Operand, node: NodeRef) -> bool {
    match state.get(&loc) {
        Some(&v) if v == node => true,
        Some(&v) => graph.node(node).is_phi() && graph.node(node).inputs.contains(&v),
        None => false,
    }
}

fn apply(state: &mut State, moves: &[Move]) {
    let values: Vec<_> = moves.iter().map(|m| state.get(&m.from).copied()).collect();
    for (m, v) in moves.iter().zip(values) {
        match v {
            Some(v) => state.insert(m.to, v),
            None => state.remove(&m.to),
        };
    }
}

/// Walk every path of the resolved stream (each branch target at most twice
/// per path) and check that each input is found where the instruction reads
/// it. Returns the number of paths that reached a return.
fn replay(graph: &Graph, config: &Config, alloc: &Allocation) -> usize {
    let end = alloc.layout().len() as Position;
    let mut returned = 0;
    let mut work = vec![(0, State::new(), HashMap::<Position, u32>::new())];

    while let Some((mut pos, mut state, visits)) = work.pop() {
        while pos < end {
            match alloc.slot(pos) {
                Slot::Empty => {}
                Slot::Gap(gap) => {
                    apply(&mut state, gap.moves());
                    for m in gap.post_moves() {
                        apply(&mut state, std::slice::from_ref(m));
                    }
                }
                Slot::Instruction(instr) => {
                    let node = graph.node(instr.node());
                    for (&input, &loc) in node.inputs.iter().zip(instr.inputs()) {
                        if loc.is_none() {
                            continue;
                        }
                        assert!(
                            holds(graph, &state, loc, input),
                            "at {pos}: {input} expected in {loc}\n{}",
                            alloc.display()
                        );
                    }
                    let opcode = config.opcode(instr.opcode()).unwrap();
                    for spill in &opcode.spills {
                        state.remove(spill);
                    }
                    if let Some(out) = instr.output() {
                        state.insert(out, instr.node());
                    }

                    if node.is_control() {
                        if instr.links().is_empty() {
                            returned += 1;
                        }
                        for &link in instr.links() {
                            let seen = visits.get(&link).copied().unwrap_or(0);
                            if seen < 2 {
                                let mut next = visits.clone();
                                next.insert(link, seen + 1);
                                work.push((link, state.clone(), next));
                            }
                        }
                        break;
                    }
                }
            }
            pos += 1;
        }
    }
    returned
}

struct Diamond {
    graph: Graph,
    b: NodeRef,
    d: NodeRef,
    p: NodeRef,
    left_jump: NodeRef,
    right_jump: NodeRef,
    ret: NodeRef,
}

/// ```text
/// bb0: a = literal; c = literal; br c -> bb1, bb2
/// bb1: b = inc a; jump bb3
/// bb2: d = call; k = literal; jump bb3
/// bb3: p = phi(b, d); ret_fixed p
/// ```
///
/// Without `pad` the right block drops `k` and jumps straight after the
/// call.
fn build_diamond(pad: bool) -> Diamond {
    let mut bld = GraphBuilder::new();
    let entry = bld.create_block();
    let left = bld.create_block();
    let right = bld.create_block();
    let join = bld.create_block();

    bld.switch_to_block(entry);
    let a = bld.node("literal", &[]);
    let c = bld.node("literal", &[]);
    bld.control("br", &[c], &[left, right]);

    bld.switch_to_block(left);
    let b = bld.node("inc", &[a]);
    let left_jump = bld.control("jump", &[], &[join]);

    bld.switch_to_block(right);
    let d = bld.node("call", &[]);
    if pad {
        bld.node("literal", &[]);
    }
    let right_jump = bld.control("jump", &[], &[join]);

    bld.switch_to_block(join);
    let p = bld.phi(&[b, d]);
    let ret = bld.control("ret_fixed", &[p], &[]);

    Diamond {
        graph: bld.finish(),
        b,
        d,
        p,
        left_jump,
        right_jump,
        ret,
    }
}

/// ```text
/// bb0: a = literal; y = literal; jump bb1
/// bb1: p = phi(a, n); br p -> bb2, bb3
/// bb2: n = inc p; jump bb1
/// bb3: use2 p, y; ret p
/// ```
fn build_loop() -> Graph {
    let mut bld = GraphBuilder::new();
    let entry = bld.create_block();
    let header = bld.create_block();
    let body = bld.create_block();
    let exit = bld.create_block();

    bld.switch_to_block(entry);
    let a = bld.node("literal", &[]);
    let y = bld.node("literal", &[]);
    bld.control("jump", &[], &[header]);

    bld.switch_to_block(header);
    let p = bld.phi(&[a]);
    bld.control("br", &[p], &[body, exit]);

    bld.switch_to_block(body);
    let n = bld.node("inc", &[p]);
    bld.add_phi_input(p, n);
    bld.control("jump", &[], &[header]);

    bld.switch_to_block(exit);
    bld.node("use2", &[p, y]);
    bld.control("ret", &[p], &[]);

    bld.finish()
}

fn value(alloc: &Allocation, id: IntervalId) -> Operand {
    alloc.interval(id).value().unwrap()
}

fn mv(from: Operand, to: Operand) -> Move {
    Move { from, to }
}

#[test]
fn diamond_spilled_to_stack() {
    let config = load_config();
    let dia = build_diamond(true);
    let mut alloc = Builder::new(&dia.graph, &config).build().unwrap();
    allocate_stack(&mut alloc);
    Resolver::new(&dia.graph, &config, &mut alloc)
        .resolve()
        .unwrap();

    let d_pos = alloc.position(dia.d);
    let ret_pos = alloc.position(dia.ret);
    assert_eq!(
        alloc.register(0).ranges(),
        &[
            LiveRange::new(d_pos, d_pos + 1),
            LiveRange::new(ret_pos - 1, ret_pos)
        ]
    );
    assert_eq!(
        alloc.register(2).ranges(),
        &[LiveRange::new(d_pos, d_pos + 1)]
    );
    assert!(alloc.register(1).is_empty());

    let b_loc = value(&alloc, alloc.intervals().head(dia.b));
    let p_loc = value(&alloc, alloc.intervals().head(dia.p));
    let d_head = alloc.intervals().head(dia.d);
    let d_tail = alloc.interval(d_head).children()[0];
    let d_loc = value(&alloc, d_tail);
    assert_eq!(value(&alloc, d_head), RAX);

    let gap_before = |node: NodeRef| alloc.gap_at(alloc.position(node) - 1).unwrap();
    assert_eq!(gap_before(dia.left_jump).moves(), &[mv(b_loc, p_loc)]);
    assert_eq!(gap_before(dia.right_jump).moves(), &[mv(d_loc, p_loc)]);
    assert_eq!(gap_before(dia.ret).moves(), &[mv(p_loc, RAX)]);
    assert_eq!(
        alloc.gap_at(d_pos + 1).unwrap().moves(),
        &[mv(RAX, d_loc)]
    );
    assert_eq!(alloc.gaps().count(), 4);

    // Both jumps land on the move into the return register.
    for jump in [dia.left_jump, dia.right_jump] {
        let instr = alloc.instruction(alloc.position(jump)).unwrap();
        assert_eq!(instr.links(), &[ret_pos - 1]);
    }
    let ret = alloc.instruction(ret_pos).unwrap();
    assert_eq!(ret.inputs(), &[RAX]);
    assert_eq!(alloc.instruction(d_pos).unwrap().output(), Some(RAX));

    assert_eq!(replay(&dia.graph, &config, &alloc), 2);
}

#[test]
fn diamond_in_registers() {
    let config = load_config();
    let dia = build_diamond(true);
    let mut alloc = Builder::new(&dia.graph, &config).build().unwrap();
    allocate_greedy(&mut alloc);
    Resolver::new(&dia.graph, &config, &mut alloc)
        .resolve()
        .unwrap();

    // Everything coalesces into rax except the values overlapping it.
    assert_eq!(alloc.gaps().count(), 0);
    assert_eq!(
        alloc.display().to_string(),
        concat!(
            "   2: r0 = literal\n",
            "   4: r1 = literal\n",
            "   6: br r1 => 11, 18\n",
            "  11: r0 = inc r0\n",
            "  13: jump => 29\n",
            "  18: r0 = call\n",
            "  20: r1 = literal\n",
            "  22: jump => 29\n",
            "  29: ret_fixed r0\n",
        )
    );
    assert!(!alloc.interval(alloc.intervals().head(dia.p)).is_empty());
    assert_eq!(replay(&dia.graph, &config, &alloc), 2);
}

#[test]
fn call_result_jumping_into_phi() {
    let config = load_config();
    let dia = build_diamond(false);
    let mut alloc = Builder::new(&dia.graph, &config).build().unwrap();
    allocate_stack(&mut alloc);
    Resolver::new(&dia.graph, &config, &mut alloc)
        .resolve()
        .unwrap();

    let d_pos = alloc.position(dia.d);
    assert_eq!(alloc.position(dia.right_jump), d_pos + 2);
    let p_loc = value(&alloc, alloc.intervals().head(dia.p));
    let d_head = alloc.intervals().head(dia.d);
    let d_tail = alloc.interval(d_head).children()[0];
    assert_eq!(alloc.interval(d_tail).ranges(), &[LiveRange::new(d_pos + 1, d_pos + 5)]);
    let d_loc = value(&alloc, d_tail);

    // The φ move shares the gap with the split move and reads the call's
    // register, not the stack slot that gap is still loading.
    assert_eq!(
        alloc.gap_at(d_pos + 1).unwrap().moves(),
        &[mv(RAX, p_loc), mv(RAX, d_loc)]
    );
    assert!(alloc.gap_at(d_pos + 1).unwrap().post_moves().is_empty());
    assert_eq!(alloc.gaps().count(), 3);

    assert_eq!(replay(&dia.graph, &config, &alloc), 2);
}

#[test]
fn loop_spilled_to_stack() {
    let config = load_config();
    let graph = build_loop();
    let mut alloc = Builder::new(&graph, &config).build().unwrap();
    allocate_stack(&mut alloc);
    Resolver::new(&graph, &config, &mut alloc).resolve().unwrap();

    // One φ move on the entry edge, one on the back edge.
    let moves: Vec<_> = alloc.gaps().map(|g| g.moves().len()).collect();
    assert_eq!(moves, vec![1, 1]);
    assert!(alloc.gaps().all(|g| g.post_moves().is_empty()));

    // Exit, exit after one iteration; the third header visit is cut off.
    assert_eq!(replay(&graph, &config, &alloc), 2);
}

#[test]
fn loop_in_registers() {
    let config = load_config();
    let graph = build_loop();
    let mut alloc = Builder::new(&graph, &config).build().unwrap();
    allocate_greedy(&mut alloc);
    Resolver::new(&graph, &config, &mut alloc).resolve().unwrap();

    for id in alloc.groups().iter().flatten() {
        assert!(value(&alloc, *id).is_fixed(), "{}", alloc.interval(*id));
    }
    assert_eq!(replay(&graph, &config, &alloc), 2);
}

#[test]
fn missing_location_is_an_error() {
    let config = load_config();
    let dia = build_diamond(true);
    let mut alloc = Builder::new(&dia.graph, &config).build().unwrap();
    let err = Resolver::new(&dia.graph, &config, &mut alloc)
        .resolve()
        .unwrap_err();
    assert!(err.to_string().contains("no location assigned"), "{err}");
}
