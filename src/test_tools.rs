// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

#![cfg(test)]

use crate::{ActionRef, StateId, TableId};
use crate::keyops::Key;
use crate::redfsm::{Action, InlineItem, InlineList, ParseData, RedState};

pub(crate) fn key(c: char) -> Key {
    Key(c as i64)
}

/// Compact construction of test machines. The builder only assembles what upstream passes
/// normally hand over; it performs no canonicalization beyond keeping keys sorted.
pub(crate) struct MachineBuilder {
    pub pd: ParseData,
}

impl MachineBuilder {
    pub fn new(name: &str) -> MachineBuilder {
        MachineBuilder { pd: ParseData::new(name, "test.rl") }
    }

    pub fn action(&mut self, name: &str, body: InlineList, line: u32) -> ActionRef {
        self.pd.actions.push(Action::new(name, body, line));
        self.pd.actions.len() - 1
    }

    pub fn text_action(&mut self, name: &str, code: &str, line: u32) -> ActionRef {
        self.action(name, vec![InlineItem::Text(code.to_string())], line)
    }

    pub fn table(&mut self, actions: &[ActionRef]) -> TableId {
        self.pd.red.intern_table(actions.to_vec())
    }

    pub fn state(&mut self) -> StateId {
        let id = self.pd.red.states.len();
        self.pd.red.states.push(RedState::new(id));
        id
    }

    pub fn single(&mut self, from: StateId, on: char, to: Option<StateId>, table: Option<TableId>) {
        let trans = self.pd.red.intern_trans(to, table);
        let state = &mut self.pd.red.states[from];
        state.single.push((key(on), trans));
        state.single.sort_by_key(|&(k, _)| k);
    }

    pub fn range(&mut self, from: StateId, low: char, high: char, to: Option<StateId>, table: Option<TableId>) {
        let trans = self.pd.red.intern_trans(to, table);
        let state = &mut self.pd.red.states[from];
        state.ranges.push((key(low), key(high), trans));
        state.ranges.sort_by_key(|&(k, _, _)| k);
    }

    pub fn default(&mut self, from: StateId, to: Option<StateId>, table: Option<TableId>) {
        let trans = self.pd.red.intern_trans(to, table);
        self.pd.red.states[from].default_trans = Some(trans);
    }

    /// Sets the denormalized flat-expansion bounds of a state's transition domain.
    pub fn span(&mut self, st: StateId, low: char, high: char) {
        self.pd.red.states[st].trans_span = Some((key(low), key(high)));
    }

    pub fn to_state(&mut self, st: StateId, table: TableId) {
        self.pd.red.states[st].to_state = Some(table);
    }

    pub fn from_state(&mut self, st: StateId, table: TableId) {
        self.pd.red.states[st].from_state = Some(table);
    }

    pub fn eof(&mut self, st: StateId, table: TableId) {
        self.pd.red.states[st].eof_table = Some(table);
    }

    /// Declares the final suffix of the id space.
    pub fn finals(&mut self, first_final: StateId) {
        self.pd.red.first_final = Some(first_final);
    }

    pub fn build(self) -> ParseData {
        self.pd
    }
}

/// The machine for `/a/`: two states, one single transition, no action (scenario S1).
pub(crate) fn machine_s1() -> ParseData {
    let mut b = MachineBuilder::new("s1");
    let s0 = b.state();
    let s1 = b.state();
    b.single(s0, 'a', Some(s1), None);
    b.finals(s1);
    b.build()
}

/// The machine for `/[a-z]/` with its flat expansion bounds (scenario S2).
pub(crate) fn machine_s2() -> ParseData {
    let mut b = MachineBuilder::new("s2");
    let s0 = b.state();
    let s1 = b.state();
    b.range(s0, 'a', 'z', Some(s1), None);
    b.span(s0, 'a', 'z');
    b.finals(s1);
    b.build()
}

/// The machine for `/a+b/` with an action on the `b` transition (scenario S3).
pub(crate) fn machine_s3() -> ParseData {
    let mut b = MachineBuilder::new("s3");
    let s0 = b.state();
    let s1 = b.state();
    let s2 = b.state();
    let act = b.text_action("A", "seen = 1;", 3);
    let table = b.table(&[act]);
    b.single(s0, 'a', Some(s1), None);
    b.single(s1, 'a', Some(s1), None);
    b.single(s1, 'b', Some(s2), Some(table));
    b.finals(s2);
    b.build()
}

// ---------------------------------------------------------------------------------------------
// Reference interpreter
//
// Walks the reduced machine directly, ignoring action side effects: the acceptance oracle
// the emitted recognizers are compared against.

pub(crate) fn accepts(pd: &ParseData, input: &str) -> bool {
    const VERBOSE: bool = false;
    let red = &pd.red;
    let mut cs = red.start_state;
    for c in input.chars() {
        let k = key(c);
        let state = &red.states[cs];
        assert!(state.conds.is_empty(), "the interpreter does not evaluate conditions");
        let trans = state.single.iter().find(|&&(sk, _)| sk == k).map(|&(_, t)| t)
            .or_else(|| state.ranges.iter().find(|&&(lo, hi, _)| lo <= k && k <= hi).map(|&(_, _, t)| t))
            .or(state.default_trans);
        let Some(trans) = trans else {
            if VERBOSE { println!("state {cs}: no transition on '{c}'"); }
            return false;
        };
        match red.trans_set[trans].targ {
            Some(to) if Some(to) != red.error_state => {
                if VERBOSE { println!("state {cs} -> {to} on '{c}'"); }
                cs = to;
            }
            _ => {
                if VERBOSE { println!("state {cs}: error transition on '{c}'"); }
                return false;
            }
        }
    }
    cs >= red.first_final_id()
}

mod tests {
    use super::*;

    #[test]
    fn interpreter_oracle() {
        let tests = [
            (1, machine_s1(), "a", true),
            (2, machine_s1(), "b", false),
            (3, machine_s1(), "aa", false),
            (4, machine_s1(), "", false),
            (5, machine_s2(), "q", true),
            (6, machine_s2(), "A", false),
            (7, machine_s3(), "ab", true),
            (8, machine_s3(), "aaab", true),
            (9, machine_s3(), "b", false),
            (10, machine_s3(), "aba", false),
        ];
        for (test_id, pd, input, expected) in tests {
            assert_eq!(accepts(&pd, input), expected, "test {test_id} failed");
        }
    }
}
