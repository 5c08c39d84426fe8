// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

#![cfg(test)]

use crate::fsm::{CondTrans, FsmState, FsmTrans};
use crate::keyops::{Key, KeyOps};
use crate::redfsm::{Action, CondSpace, ParseData};
use crate::test_tools::key;
use super::*;

fn trans(low: char, high: char, to: Option<usize>) -> FsmTrans {
    FsmTrans {
        low: key(low),
        high: key(high),
        cond_space: None,
        conds: vec![CondTrans { cond_vals: 0, to, actions: vec![] }],
    }
}

/// An unreduced two-state machine: 0 -- [low..high] --> 1, state 1 final.
fn graph_machine(name: &str, low: char, high: char) -> ParseData {
    let mut pd = ParseData::new(name, "test.rl");
    let mut s0 = FsmState::new(0);
    s0.out.push(trans(low, high, Some(1)));
    let mut s1 = FsmState::new(1);
    s1.is_final = true;
    pd.graph.states = vec![s0, s1];
    pd.graph.start_state = Some(0);
    pd
}

fn render(pd: &ParseData) -> String {
    DotGen::new(pd).gen_dot()
}

#[test]
fn digraph_shape() {
    let pd = graph_machine("shape", 'a', 'a');
    let dot = render(&pd);
    assert!(dot.starts_with("digraph shape {\n\trankdir=LR;\n"), "{dot}");
    assert!(dot.ends_with("}\n"), "{dot}");
    assert!(dot.contains("\tENTRY;\n"), "{dot}");
    assert!(dot.contains("\tnode [ fixedsize = true, height = 0.65, shape = doublecircle ];\n\t1;\n"), "{dot}");
    assert!(dot.contains("\t0 -> 1 [ label = \"97\" ];\n"), "{dot}");
    assert!(dot.contains("\tENTRY -> 0 [ label = \"IN\" ];\n"), "{dot}");
}

#[test]
fn printable_key_escaping() {
    // scenario S6 plus the quote and backslash escapes
    let tests = [
        (1, ' ', "SP"),
        (2, '\t', "'\\\\t'"),
        (3, '\n', "'\\\\n'"),
        (4, '\r', "'\\\\r'"),
        (5, '"', "'\\\"'"),
        (6, '\\', "'\\\\'"),
        (7, 'q', "'q'"),
        (8, '\x07', "'\\\\a'"),
        (9, '\x0b', "'\\\\v'"),
        (10, '\x0c', "'\\\\f'"),
        (11, '\x08', "'\\\\b'"),
    ];
    for (test_id, c, expected) in tests {
        let mut pd = graph_machine("esc", c, c);
        pd.display_printables = true;
        let dot = render(&pd);
        let label = format!("[ label = \"{expected}\" ]");
        assert!(dot.contains(&label), "test {test_id} failed:\n{dot}");
    }
}

#[test]
fn unprintable_keys_as_integers() {
    // printables render as numbers too when the display option is off
    let mut pd = graph_machine("num", 'a', 'z');
    let dot = render(&pd);
    assert!(dot.contains("[ label = \"97..122\" ]"), "{dot}");
    // a signed alphabet shows negative keys
    pd.graph.states[0].out[0].low = Key(-128);
    pd.graph.states[0].out[0].high = Key(-1);
    let dot = render(&pd);
    assert!(dot.contains("[ label = \"-128..-1\" ]"), "{dot}");
    // an unsigned one shows the zero-extended value
    pd.key_ops = KeyOps::byte_alphabet();
    pd.graph.states[0].out[0].low = Key(200);
    pd.graph.states[0].out[0].high = Key(255);
    let dot = render(&pd);
    assert!(dot.contains("[ label = \"200..255\" ]"), "{dot}");
}

#[test]
fn error_pseudo_node() {
    let mut pd = graph_machine("err", 'a', 'a');
    pd.graph.states[0].out.push(trans('b', 'b', None));
    let dot = render(&pd);
    assert!(dot.contains("\terr_0 [ label=\"\"];\n"), "{dot}");
    assert!(dot.contains("\t0 -> err_0 [ label = \"98\" ];\n"), "{dot}");
}

#[test]
fn eof_pseudo_node_needs_actions() {
    let mut pd = graph_machine("eof", 'a', 'a');
    let dot = render(&pd);
    assert!(!dot.contains("eof_"), "no EOF hook, no pseudo node:\n{dot}");

    pd.actions.push(Action::new("wrap", vec![], 2));
    pd.actions.push(Action::new("emit", vec![], 3));
    pd.graph.states[1].eof_actions = vec![0, 1];
    let dot = render(&pd);
    assert!(dot.contains("\teof_1;\n"), "{dot}");
    assert!(dot.contains("\t1 -> eof_1 [ label = \"EOF / wrap, emit\" ];\n"), "{dot}");
}

#[test]
fn entry_points() {
    let mut pd = graph_machine("entry", 'a', 'a');
    pd.graph.entry_points.push(("main_loop".to_string(), 1));
    let dot = render(&pd);
    assert!(dot.contains("\ten_1;\n"), "{dot}");
    assert!(dot.contains("\ten_1 -> 1 [ label = \"main_loop\" ];\n"), "{dot}");
}

#[test]
fn condition_conjunction() {
    let mut pd = graph_machine("conds", 'a', 'a');
    pd.actions.push(Action::new("in_header", vec![], 4));
    pd.actions.push(Action::new("in_body", vec![], 5));
    pd.cond_spaces.push(CondSpace { id: 0, base_key: Key(128), cond_set: vec![0, 1] });
    let tr = &mut pd.graph.states[0].out[0];
    tr.cond_space = Some(0);
    tr.conds[0].cond_vals = 0b01;
    let dot = render(&pd);
    assert!(dot.contains("[ label = \"97(in_header, !in_body)\" ]"), "{dot}");
}

#[test]
fn edge_action_merge() {
    // leaving actions, the transition's own, then entering actions
    let mut pd = graph_machine("merge", 'a', 'a');
    pd.actions.push(Action::new("leaving", vec![], 1));
    pd.actions.push(Action::new("crossing", vec![], 2));
    pd.actions.push(Action::new("entering", vec![], 3));
    pd.graph.states[0].from_actions = vec![0];
    pd.graph.states[0].out[0].conds[0].actions = vec![1];
    pd.graph.states[1].to_actions = vec![2];
    let dot = render(&pd);
    assert!(dot.contains("\t0 -> 1 [ label = \"97 / leaving, crossing, entering\" ];\n"), "{dot}");
}

#[test]
fn rendering_is_deterministic() {
    let mut pd = graph_machine("det", 'a', 'z');
    pd.graph.entry_points.push(("alt".to_string(), 0));
    let first = render(&pd);
    let second = render(&pd);
    assert_eq!(first, second);
}
