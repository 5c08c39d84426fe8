// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Full pipeline over the public API: build a bundle the way an upstream pass would,
//! analyze it, and run both back ends.

use fsmgen::analysis::analyze;
use fsmgen::codegen::{CodeGen, HOST_C, HOST_D};
use fsmgen::dotgen::DotGen;
use fsmgen::fsm::{CondTrans, FsmState, FsmTrans};
use fsmgen::keyops::Key;
use fsmgen::log::LogStatus;
use fsmgen::redfsm::{Action, InlineItem, ParseData, RedState};

/// A machine recognizing `/hi|[0-9]+/`-ish input with an EOF hook: states 0..4, finals
/// from 2 up, an action on the digit loop and one at EOF.
fn sample() -> ParseData {
    let mut pd = ParseData::new("sample", "sample.rl");

    // actions
    pd.actions.push(Action::new("digit", vec![InlineItem::Text("total = total * 10;".to_string())], 11));
    pd.actions.push(Action::new("finish", vec![InlineItem::Text("done = 1;".to_string())], 14));

    // reduced machine
    let digit_table = pd.red.intern_table(vec![0]);
    let eof_table = pd.red.intern_table(vec![1]);
    let to_h = pd.red.intern_trans(Some(1), None);
    let to_i = pd.red.intern_trans(Some(2), None);
    let to_num = pd.red.intern_trans(Some(3), Some(digit_table));
    let mut s0 = RedState::new(0);
    s0.single.push((Key('h' as i64), to_h));
    s0.ranges.push((Key('0' as i64), Key('9' as i64), to_num));
    let mut s1 = RedState::new(1);
    s1.single.push((Key('i' as i64), to_i));
    let mut s2 = RedState::new(2);
    s2.eof_table = Some(eof_table);
    let mut s3 = RedState::new(3);
    s3.ranges.push((Key('0' as i64), Key('9' as i64), to_num));
    s3.eof_table = Some(eof_table);
    pd.red.states = vec![s0, s1, s2, s3];
    pd.red.first_final = Some(2);

    // unreduced graph, only used by the dot back end
    let mut g0 = FsmState::new(0);
    g0.out.push(FsmTrans { low: Key('h' as i64), high: Key('h' as i64), cond_space: None,
        conds: vec![CondTrans { cond_vals: 0, to: Some(1), actions: vec![] }] });
    g0.out.push(FsmTrans { low: Key('0' as i64), high: Key('9' as i64), cond_space: None,
        conds: vec![CondTrans { cond_vals: 0, to: Some(3), actions: vec![0] }] });
    let mut g1 = FsmState::new(1);
    g1.out.push(FsmTrans { low: Key('i' as i64), high: Key('i' as i64), cond_space: None,
        conds: vec![CondTrans { cond_vals: 0, to: Some(2), actions: vec![] }] });
    let mut g2 = FsmState::new(2);
    g2.is_final = true;
    g2.eof_actions = vec![1];
    let mut g3 = FsmState::new(3);
    g3.is_final = true;
    g3.eof_actions = vec![1];
    g3.out.push(FsmTrans { low: Key('0' as i64), high: Key('9' as i64), cond_space: None,
        conds: vec![CondTrans { cond_vals: 0, to: Some(3), actions: vec![0] }] });
    pd.graph.states = vec![g0, g1, g2, g3];
    pd.graph.start_state = Some(0);
    pd
}

#[test]
fn code_back_end() {
    let pd = sample();
    let an = analyze(&pd, HOST_C.types);

    // reference counts and ids
    assert_eq!(an.counts[0].trans, 2, "the digit action is on two range occurrences");
    assert_eq!(an.counts[1].eof, 2);
    assert_eq!(an.action_ids[0], Some(0));
    assert_eq!(an.action_ids[1], Some(1));

    let mut codegen = CodeGen::new(&pd, &an, &HOST_C);
    let src = codegen.gen_source();
    assert!(codegen.has_no_errors());
    // packed actions: reserved 0, then [digit], then [finish]
    assert!(src.contains("static const char _sample_actions[] = {\n\t0, 1, 0, 1, 1\n};"), "{src}");
    assert!(src.contains("static const int sample_first_final = 2;"), "{src}");
    assert!(src.contains("void sample_execute( void )"), "{src}");
    assert!(src.contains("#line 11 \"sample.rl\""), "{src}");
    assert!(src.contains("{total = total * 10;}"), "{src}");
    assert!(src.contains("_sample_eof_actions"), "{src}");

    // emission is deterministic across independent generators
    let second = CodeGen::new(&pd, &an, &HOST_C).gen_source();
    assert_eq!(src, second);

    // the D spelling differs only in syntax
    let d_src = CodeGen::new(&pd, &an, &HOST_D).gen_source();
    assert!(d_src.contains("static const char[] _sample_actions = [\n\t0, 1, 0, 1, 1\n];"), "{d_src}");
    assert!(d_src.contains("void sample_execute()"), "{d_src}");
}

#[test]
fn dot_back_end() {
    let pd = sample();
    let mut dotgen = DotGen::new(&pd);
    let dot = dotgen.gen_dot();
    assert!(dot.starts_with("digraph sample {\n\trankdir=LR;\n"), "{dot}");
    assert!(dot.contains("\t0 -> 3 [ label = \"48..57 / digit\" ];\n"), "{dot}");
    assert!(dot.contains("\teof_2;\n"), "{dot}");
    assert!(dot.contains("\t2 -> eof_2 [ label = \"EOF / finish\" ];\n"), "{dot}");
    assert!(dot.contains("\t3 -> eof_3 [ label = \"EOF / finish\" ];\n"), "{dot}");
    assert!(dot.ends_with("}\n"), "{dot}");
    assert!(dotgen.has_no_errors());
}
