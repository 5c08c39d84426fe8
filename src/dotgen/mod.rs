// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

pub(crate) mod tests;

use std::fmt::{Debug, Formatter};
use crate::{ActionRef, CollectJoin};
use crate::fsm::{CondTrans, FsmState};
use crate::keyops::Key;
use crate::log::{BufLog, LogReader};
use crate::redfsm::ParseData;

// ---------------------------------------------------------------------------------------------

/// Emits a Graphviz rendition of the machine before reduction: pseudo-nodes for entry
/// points, EOF hooks and error exits, double circles for final states, and one labeled
/// edge per transition specialization.
pub struct DotGen<'a> {
    pd: &'a ParseData,
    log: BufLog,
}

impl Debug for DotGen<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "DotGen({})", self.pd.fsm_name)
    }
}

impl LogReader for DotGen<'_> {
    type Item = BufLog;

    fn get_log(&self) -> &Self::Item {
        &self.log
    }

    fn give_log(self) -> Self::Item {
        self.log
    }
}

impl<'a> DotGen<'a> {
    pub fn new(pd: &'a ParseData) -> DotGen<'a> {
        DotGen { pd, log: BufLog::new() }
    }

    /// Renders a key inside a label. Printable keys become quoted glyphs when requested,
    /// with `"` and `\` backslash-escaped and the C whitespace escapes kept visible;
    /// space renders as `SP`. Everything else is a signed or unsigned integer.
    fn key(&self, out: &mut String, key: Key) {
        if self.pd.display_printables && self.pd.key_ops.is_printable(key) {
            match key.val() as u8 as char {
                c @ ('"' | '\\') => out.push_str(&format!("'\\{c}'")),
                '\x07' => out.push_str("'\\\\a'"),
                '\x08' => out.push_str("'\\\\b'"),
                '\t' => out.push_str("'\\\\t'"),
                '\n' => out.push_str("'\\\\n'"),
                '\x0b' => out.push_str("'\\\\v'"),
                '\x0c' => out.push_str("'\\\\f'"),
                '\r' => out.push_str("'\\\\r'"),
                ' ' => out.push_str("SP"),
                c => out.push_str(&format!("'{c}'")),
            }
        } else if self.pd.key_ops.is_signed() {
            out.push_str(&key.val().to_string());
        } else {
            out.push_str(&(key.val() as u64).to_string());
        }
    }

    /// The key part of an edge label: a key or range, then the conjunction of condition
    /// names with `!` marking the bits unset in `cond_vals`.
    fn on_char(&self, out: &mut String, low: Key, high: Key, cond_space: Option<crate::CondSpaceId>, cond_vals: i64) {
        self.key(out, low);
        if high != low {
            out.push_str("..");
            self.key(out, high);
        }
        if let Some(space) = cond_space {
            let cond_space = &self.pd.cond_spaces[space];
            out.push('(');
            for (i, &cond) in cond_space.cond_set.iter().enumerate() {
                if cond_vals & (1 << i) == 0 {
                    out.push('!');
                }
                out.push_str(&self.pd.actions[cond].name);
                if i + 1 < cond_space.cond_set.len() {
                    out.push_str(", ");
                }
            }
            out.push(')');
        }
    }

    /// The action part of an edge label: leaving actions of the source, the transition's
    /// own actions, then entering actions of the destination.
    fn trans_action(&self, out: &mut String, from: &FsmState, ct: &CondTrans) {
        let mut lists: Vec<&[ActionRef]> = Vec::new();
        if !from.from_actions.is_empty() {
            lists.push(&from.from_actions);
        }
        if !ct.actions.is_empty() {
            lists.push(&ct.actions);
        }
        if let Some(to) = ct.to {
            let to_state = &self.pd.graph.states[to];
            if !to_state.to_actions.is_empty() {
                lists.push(&to_state.to_actions);
            }
        }
        if !lists.is_empty() {
            out.push_str(" / ");
            let names = lists.iter()
                .flat_map(|l| l.iter())
                .map(|&a| &self.pd.actions[a].name)
                .join(", ");
            out.push_str(&names);
        }
    }

    fn action_names(&self, out: &mut String, actions: &[ActionRef]) {
        out.push_str(" / ");
        let names = actions.iter().map(|&a| &self.pd.actions[a].name).join(", ");
        out.push_str(&names);
    }

    fn write_trans_list(&self, out: &mut String, state: &FsmState) {
        for trans in &state.out {
            for ct in &trans.conds {
                out.push_str(&format!("\t{} -> ", state.num));
                match ct.to {
                    Some(to) => out.push_str(&to.to_string()),
                    None => out.push_str(&format!("err_{}", state.num)),
                }
                out.push_str(" [ label = \"");
                self.on_char(out, trans.low, trans.high, trans.cond_space, ct.cond_vals);
                self.trans_action(out, state, ct);
                out.push_str("\" ];\n");
            }
        }
    }

    pub fn gen_dot(&mut self) -> String {
        let graph = &self.pd.graph;
        let mut out = String::new();
        out.push_str(&format!("digraph {} {{\n", self.pd.fsm_name));
        out.push_str("\trankdir=LR;\n");

        // pseudo states first; the transitions wait until the states are declared as
        // final or not final
        out.push_str("\tnode [ shape = point ];\n");
        if graph.start_state.is_some() {
            out.push_str("\tENTRY;\n");
        }
        for (_, state) in &graph.entry_points {
            out.push_str(&format!("\ten_{};\n", graph.states[*state].num));
        }
        for state in &graph.states {
            if !state.eof_actions.is_empty() {
                out.push_str(&format!("\teof_{};\n", state.num));
            }
        }

        out.push_str("\tnode [ shape = circle, height = 0.2 ];\n");
        for state in &graph.states {
            if state.has_error_trans() {
                out.push_str(&format!("\terr_{} [ label=\"\"];\n", state.num));
            }
        }

        out.push_str("\tnode [ fixedsize = true, height = 0.65, shape = doublecircle ];\n");
        for state in &graph.states {
            if state.is_final {
                out.push_str(&format!("\t{};\n", state.num));
            }
        }

        out.push_str("\tnode [ shape = circle ];\n");
        for state in &graph.states {
            self.write_trans_list(&mut out, state);
        }

        if let Some(start) = graph.start_state {
            out.push_str(&format!("\tENTRY -> {} [ label = \"IN\" ];\n", graph.states[start].num));
        }
        for (name, state) in &graph.entry_points {
            let num = graph.states[*state].num;
            out.push_str(&format!("\ten_{num} -> {num} [ label = \"{name}\" ];\n"));
        }
        for state in &graph.states {
            if !state.eof_actions.is_empty() {
                out.push_str(&format!("\t{} -> eof_{} [ label = \"EOF", state.num, state.num));
                self.action_names(&mut out, &state.eof_actions);
                out.push_str("\" ];\n");
            }
        }
        out.push_str("}\n");
        out
    }
}
