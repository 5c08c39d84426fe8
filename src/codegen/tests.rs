// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

#![cfg(test)]

use crate::analysis::{analyze, TableStyle};
use crate::keyops::Key;
use crate::log::LogStatus;
use crate::redfsm::{InlineItem, LmCase, ParseData};
use crate::test_tools::{machine_s1, machine_s3, MachineBuilder};
use super::*;

fn gen(pd: &ParseData, host: &'static HostAdapter) -> String {
    let an = analyze(pd, host.types);
    CodeGen::new(pd, &an, host).gen_source()
}

fn assert_contains(src: &str, needles: &[&str]) {
    for needle in needles {
        assert!(src.contains(needle), "missing {needle:?} in:\n{src}");
    }
}

#[test]
fn s1_tables_and_driver() {
    let pd = machine_s1();
    let src = gen(&pd, &HOST_C);
    assert_contains(&src, &[
        // reserved slot only, no actions anywhere
        "static const char _s1_actions[] = {\n\t0\n};",
        "static const char _s1_trans_keys[] = {\n\t97\n};",
        "static const char _s1_single_lengths[] = {\n\t1, 0\n};",
        "static const char _s1_range_lengths[] = {\n\t0, 0\n};",
        "static const char _s1_key_offsets[] = {\n\t0, 1\n};",
        "static const char _s1_index_offsets[] = {\n\t0, 2\n};",
        // state 0: the single, then the default slot (virtual error row 1); state 1: default only
        "static const char _s1_indicies[] = {\n\t0, 1, 1\n};",
        // the virtual row drives the machine into the error value
        "static const char _s1_trans_targs[] = {\n\t1, -1\n};",
        "static const int s1_start = 0;",
        "static const int s1_first_final = 1;",
        "static const int s1_error = -1;",
        "void s1_init( void )",
        "\tcs = s1_start;",
        "void s1_execute( void )",
        "\tif ( cs == -1 )\n\t\tgoto _out;",
        "goto _match;",
        "_out: {}",
    ]);
    // no action dispatch in an actionless machine
    assert!(!src.contains("_s1_trans_actions"), "unexpected action table:\n{src}");
    assert!(!src.contains("switch"), "unexpected dispatch switch:\n{src}");
}

#[test]
fn emission_is_deterministic() {
    let pd = machine_s3();
    let an = analyze(&pd, HOST_C.types);
    let mut cg = CodeGen::new(&pd, &an, &HOST_C);
    let first = cg.gen_source();
    let second = cg.gen_source();
    assert_eq!(first, second);
}

#[test]
fn s3_packed_actions_and_dispatch() {
    let pd = machine_s3();
    let src = gen(&pd, &HOST_C);
    assert_contains(&src, &[
        // reserved 0, then the one table: length 1, action id 0
        "static const char _s3_actions[] = {\n\t0, 1, 0\n};",
        // one slot per interned transition plus the virtual error row
        "static const char _s3_trans_actions[] = {\n\t0, 1, 0\n};",
        "#line 3 \"test.rl\"",
        "\tcase 0:\n",
        "\t{seen = 1;}\n",
        "\tbreak;",
        "\tif ( _s3_trans_actions[_trans] == 0 )\n\t\tgoto _again;",
        "_nacts = (unsigned int) _s3_actions[_acts++];",
    ]);
}

#[test]
fn eof_actions_dispatch_once() {
    let mut b = MachineBuilder::new("s4");
    let s0 = b.state();
    let s1 = b.state();
    let at_eof = b.text_action("at_eof", "done = 1;", 9);
    let table = b.table(&[at_eof]);
    b.single(s0, 'a', Some(s1), None);
    b.eof(s1, table);
    b.finals(s1);
    let pd = b.build();
    let src = gen(&pd, &HOST_C);
    assert_contains(&src, &[
        "static const char _s4_eof_actions[] = {\n\t0, 1\n};",
        "_out:\n\tif ( p == pe ) {",
        "_acts = _s4_eof_actions[cs];",
        "\t{done = 1;}\n",
    ]);
    // the EOF dispatch appears exactly once, past the _out label
    assert_eq!(src.matches("_s4_eof_actions[cs]").count(), 1);
}

#[test]
fn lm_switch_emission() {
    // scenario S5: an error-handling longest-match dispatch with two cases
    let mut b = MachineBuilder::new("s5");
    let s0 = b.state();
    let s1 = b.state();
    let err = b.state();
    let lm = b.action("lm", vec![InlineItem::LmSwitch {
        handles_error: true,
        cases: vec![
            LmCase { lm_id: 1, body: vec![InlineItem::Text("one();".to_string())] },
            LmCase { lm_id: 2, body: vec![InlineItem::Text("two();".to_string())] },
        ],
    }], 5);
    let table = b.table(&[lm]);
    b.single(s0, 'a', Some(s1), Some(table));
    b.finals(s1);
    let mut pd = b.build();
    pd.red.error_state = Some(err);
    let src = gen(&pd, &HOST_C);
    assert_contains(&src, &[
        "\tswitch( act ) {",
        "\tcase 0: tokend = tokstart; {cs = 2; goto _again;}",
        "\tcase 1:\n\t{one();}\n\tbreak;",
        "\tcase 2:\n\t{two();}\n\tbreak;",
        "\tdefault: break;",
    ]);
}

#[test]
fn expander_primitives() {
    let mut b = MachineBuilder::new("prim");
    let s0 = b.state();
    let s1 = b.state();
    let act = b.action("prim", vec![
        InlineItem::Hold,
        InlineItem::Exec(vec![InlineItem::Text("te".to_string())]),
        InlineItem::HoldTE,
        InlineItem::ExecTE(vec![InlineItem::LmGetTokEnd]),
        InlineItem::LmSetTokEnd(1),
        InlineItem::LmInitTokStart,
        InlineItem::LmSetTokStart,
        InlineItem::LmSetActId(3),
        InlineItem::SubAction(vec![InlineItem::PChar, InlineItem::Char]),
        InlineItem::Break,
    ], 2);
    let table = b.table(&[act]);
    b.single(s0, 'x', Some(s1), Some(table));
    b.finals(s1);
    let pd = b.build();
    let src = gen(&pd, &HOST_C);
    assert_contains(&src, &[
        "p--;",
        // the double brackets protect the D cast parse
        "{p = ((te))-1;}",
        "tokend--;",
        "{tokend = ((tokend));}",
        "tokend = p+1;",
        "tokstart = 0;",
        "tokstart = p;",
        "act = 3;",
        "{p(*p)}",
        "goto _out;",
    ]);
}

#[test]
fn control_transfers() {
    let mut b = MachineBuilder::new("ctl");
    let s0 = b.state();
    let s1 = b.state();
    let act = b.action("ctl", vec![
        InlineItem::Call(0),
        InlineItem::Ret,
        InlineItem::Next(1),
        InlineItem::Curs,
        InlineItem::Targs,
        InlineItem::GotoExpr(vec![InlineItem::Text("n".to_string())]),
    ], 4);
    let table = b.table(&[act]);
    b.single(s0, 'x', Some(s1), Some(table));
    b.finals(s1);
    let pd = b.build();
    let src = gen(&pd, &HOST_C);
    assert_contains(&src, &[
        "{stack[top++] = cs; cs = 0; goto _again;}",
        "{cs = stack[--top]; goto _again;}",
        "cs = 1;",
        "(_ps)",
        // the shared dispatch reads the target back from the state variable
        "(cs)",
        "{cs = (n); goto _again;}",
        // calls force the stack top initialization
        "\ttop = 0;",
        "\t_ps = cs;",
    ]);
}

#[test]
fn flat_style_tables() {
    let mut b = MachineBuilder::new("flat");
    let s0 = b.state();
    let s1 = b.state();
    for (low, high) in [('a', 'b'), ('c', 'c'), ('d', 'e'), ('f', 'f'), ('g', 'g'), ('h', 'h')] {
        b.range(s0, low, high, Some(s1), None);
    }
    b.span(s0, 'a', 'h');
    b.finals(s1);
    let pd = b.build();
    let an = analyze(&pd, HOST_C.types);
    assert_eq!(an.style, TableStyle::Flat);
    let src = CodeGen::new(&pd, &an, &HOST_C).gen_source();
    assert_contains(&src, &[
        // spanless states fill their key pair with the alphabet minimum
        "static const char _flat_keys[] = {\n\t97, 104, -128, -128\n};",
        "static const char _flat_key_spans[] = {\n\t8, 0\n};",
        // eight in-domain slots sharing the interned transition, then the default slot
        "static const char _flat_indicies[] = {\n\t0, 0, 0, 0, 0, 0, 0, 0,\n\t1, 1\n};",
        "_slen = _flat_key_spans[cs];",
        "_trans = _flat_indicies[ _inds + (",
    ]);
    assert!(!src.contains("goto _match;"), "flat dispatch has no match label:\n{src}");
}

#[test]
fn d_host_spelling() {
    let mut b = MachineBuilder::new("dm");
    let s0 = b.state();
    let s1 = b.state();
    let jump = b.action("jump", vec![InlineItem::Goto(0)], 6);
    let table = b.table(&[jump]);
    b.single(s0, 'a', Some(s1), Some(table));
    b.finals(s1);
    let pd = b.build();
    let src = gen(&pd, &HOST_D);
    assert_contains(&src, &[
        "static const char[] _dm_actions = [\n\t0, 1, 0\n];",
        "void dm_init()",
        "_nacts = cast(uint) _dm_actions[_acts++];",
        // D flags the unguarded goto as unreachable code
        "{cs = 0; if (true) goto _again;}",
        "\t\tdefault: break;",
    ]);
}

#[test]
fn java_tables_without_driver() {
    let mut pd = machine_s3();
    pd.want_complete = false;
    let an = analyze(&pd, HOST_JAVA.types);
    let src = CodeGen::new(&pd, &an, &HOST_JAVA).gen_source();
    assert_contains(&src, &[
        "static final byte[] _s3_actions = {\n\t0, 1, 0\n};",
        "static final int s3_start = 0;",
    ]);
    assert!(!src.contains("void s3_execute"), "no driver requested:\n{src}");
}

#[test]
fn adapter_tokens() {
    assert_eq!((HOST_C.arr_off)("_keys", "4"), "_keys + 4");
    assert_eq!((HOST_D.arr_off)("_keys", "4"), "&_keys[4]");
    assert_eq!((HOST_JAVA.arr_off)("_keys", "4"), "_keys + 4");
    assert_eq!((HOST_C.cast)("short"), "(short)");
    assert_eq!((HOST_D.cast)("short"), "cast(short)");
    assert_eq!(HOST_C.ptr_const(), "const ");
    assert_eq!(HOST_C.pointer(), " *");
    assert_eq!(HOST_D.null_item, "null");
    assert_eq!(HOST_JAVA.null_item, "-1");
    assert_eq!((HOST_JAVA.line_directive)("dir\\file.rl", 12), "// line 12 \"dir\\\\file.rl\"");
    assert_eq!((HOST_C.line_directive)("dir\\file.rl", 12), "#line 12 \"dir\\\\file.rl\"");
}

#[test]
#[should_panic(expected = "no pointer syntax")]
fn java_pointer_capability() {
    let _ = HOST_JAVA.pointer();
}

#[test]
#[should_panic(expected = "cannot host the label-based driver loop")]
fn java_driver_capability() {
    let pd = machine_s3();
    let an = analyze(&pd, HOST_JAVA.types);
    CodeGen::new(&pd, &an, &HOST_JAVA).gen_source();
}

#[test]
fn semantic_limit_diagnosed() {
    let mut pd = machine_s1();
    // a widened key space no Java integer can hold
    pd.max_key = Key(0x1_0000_0000);
    pd.want_complete = false;
    let an = analyze(&pd, HOST_C.types);
    let result = CodeGen::new(&pd, &an, &HOST_JAVA).try_gen_source();
    let log = result.expect_err("the limit must be diagnosed");
    assert_eq!(log.num_errors(), 1);
    assert!(log.get_messages_str().contains("widened key"), "{}", log.get_messages_str());
}

#[test]
fn longest_match_init() {
    let mut pd = machine_s3();
    pd.has_longest_match = true;
    let src = gen(&pd, &HOST_C);
    assert_contains(&src, &[
        "\ttokstart = 0;",
        "\ttokend = 0;",
        "\tact = 0;",
    ]);
}

#[test]
fn data_prefix_off() {
    let mut pd = machine_s1();
    pd.data_prefix = false;
    let src = gen(&pd, &HOST_C);
    assert_contains(&src, &[
        "static const char _trans_keys[] =",
        "static const int start = 0;",
        "void init( void )",
    ]);
}

#[test]
fn user_expressions() {
    let mut pd = machine_s3();
    pd.access_expr = Some(vec![InlineItem::Text("fsm->".to_string())]);
    pd.get_key_expr = Some(vec![InlineItem::Text("fsm->buf[fsm->p]".to_string())]);
    let src = gen(&pd, &HOST_C);
    assert_contains(&src, &[
        "\tfsm->cs = s3_start;",
        "if ( fsm->p == fsm->pe )",
        "(fsm->buf[fsm->p]) < _s3_trans_keys[_mid]",
    ]);
}
