// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

pub(crate) mod tests;

use std::fmt::{Debug, Formatter};
use crate::{ActionRef, StateId, TableId, TransId};
use crate::analysis::{ActionCounts, Analysis, TableStyle};
use crate::keyops::{type_subsumes, type_subsumes_signed, HostType, Key, HOST_TYPES_C, HOST_TYPES_D, HOST_TYPES_JAVA};
use crate::log::{BufLog, LogReader, Logger, LogStatus};
use crate::redfsm::{InlineItem, InlineList, LmCase, ParseData, RedState, RedTrans};

// ---------------------------------------------------------------------------------------------
// Host language adapters
//
// Purely syntactic capability records; selecting one never changes the recognizer's
// semantics. Missing capabilities (Java pointers, goto-less dispatch) trip the accessor.

pub struct HostAdapter {
    pub name: &'static str,
    pub types: &'static [HostType],
    /// Unsigned literals can carry a `u` suffix.
    pub explicit_unsigned: bool,
    /// The driver loop relies on labels and goto.
    pub supports_goto: bool,
    pub ptr_const: Option<&'static str>,
    pub pointer: Option<&'static str>,
    pub uint: Option<&'static str>,
    pub null_item: &'static str,
    /// Guard before a control transfer the host would flag as unreachable code.
    pub ctrl_flow: &'static str,
    /// Default case required to close every switch.
    pub switch_default: &'static str,
    pub open_array: fn(&str, &str) -> String,
    pub close_array: &'static str,
    pub static_var: fn(&str, &str) -> String,
    pub func_open: fn(&str) -> String,
    pub arr_off: fn(&str, &str) -> String,
    pub cast: fn(&str) -> String,
    pub line_directive: fn(&str, u32) -> String,
    /// Default expression reading the input symbol from the input pointer.
    pub deref_input: fn(&str) -> String,
}

impl HostAdapter {
    pub fn ptr_const(&self) -> &'static str {
        self.ptr_const.unwrap_or_else(|| panic!("{} has no pointer-const syntax", self.name))
    }

    pub fn pointer(&self) -> &'static str {
        self.pointer.unwrap_or_else(|| panic!("{} has no pointer syntax", self.name))
    }

    pub fn uint(&self) -> &'static str {
        self.uint.unwrap_or_else(|| panic!("{} has no unsigned integer type", self.name))
    }
}

fn c_line_directive(file: &str, line: u32) -> String {
    format!("#line {line} \"{}\"", file.replace('\\', "\\\\"))
}

pub static HOST_C: HostAdapter = HostAdapter {
    name: "C",
    types: HOST_TYPES_C,
    explicit_unsigned: true,
    supports_goto: true,
    ptr_const: Some("const "),
    pointer: Some(" *"),
    uint: Some("unsigned int"),
    null_item: "0",
    ctrl_flow: "",
    switch_default: "",
    open_array: |ty, name| format!("static const {ty} {name}[] = {{"),
    close_array: "};",
    static_var: |ty, name| format!("static const {ty} {name}"),
    func_open: |name| format!("void {name}( void )"),
    arr_off: |ptr, off| format!("{ptr} + {off}"),
    cast: |ty| format!("({ty})"),
    line_directive: c_line_directive,
    deref_input: |p| format!("(*{p})"),
};

pub static HOST_D: HostAdapter = HostAdapter {
    name: "D",
    types: HOST_TYPES_D,
    explicit_unsigned: true,
    supports_goto: true,
    ptr_const: Some(""),
    // multiple items separated by commas can also be pointer types
    pointer: Some("* "),
    uint: Some("uint"),
    null_item: "null",
    ctrl_flow: "if (true) ",
    switch_default: "\t\tdefault: break;\n",
    open_array: |ty, name| format!("static const {ty}[] {name} = ["),
    close_array: "];",
    static_var: |ty, name| format!("static const {ty} {name}"),
    func_open: |name| format!("void {name}()"),
    arr_off: |ptr, off| format!("&{ptr}[{off}]"),
    cast: |ty| format!("cast({ty})"),
    line_directive: c_line_directive,
    deref_input: |p| format!("(*{p})"),
};

pub static HOST_JAVA: HostAdapter = HostAdapter {
    name: "Java",
    types: HOST_TYPES_JAVA,
    explicit_unsigned: false,
    supports_goto: false,
    ptr_const: None,
    pointer: None,
    uint: None,
    // integers stand in for pointers
    null_item: "-1",
    ctrl_flow: "if (true) ",
    switch_default: "",
    open_array: |ty, name| format!("static final {ty}[] {name} = {{"),
    close_array: "};",
    static_var: |ty, name| format!("static final {ty} {name}"),
    func_open: |name| format!("void {name}()"),
    arr_off: |ptr, off| format!("{ptr} + {off}"),
    cast: |ty| format!("({ty})"),
    line_directive: |file, line| format!("// line {line} \"{}\"", file.replace('\\', "\\\\")),
    deref_input: |p| format!("data[{p}]"),
};

// ---------------------------------------------------------------------------------------------
// Driver emitter

/// Emits the host-language recognizer: the data tables, the init routine and the execute
/// routine. Emission is read-only over the machine and deterministic; diagnostics go to
/// the owned log.
pub struct CodeGen<'a> {
    pd: &'a ParseData,
    an: &'a Analysis,
    host: &'static HostAdapter,
    log: BufLog,
}

impl Debug for CodeGen<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "CodeGen({}, {})", self.pd.fsm_name, self.host.name)
    }
}

impl LogReader for CodeGen<'_> {
    type Item = BufLog;

    fn get_log(&self) -> &Self::Item {
        &self.log
    }

    fn give_log(self) -> Self::Item {
        self.log
    }
}

impl<'a> CodeGen<'a> {
    pub fn new(pd: &'a ParseData, an: &'a Analysis, host: &'static HostAdapter) -> CodeGen<'a> {
        CodeGen { pd, an, host, log: BufLog::new() }
    }

    /// Generates the complete output file. On a semantic limit failure the diagnostic is
    /// on the log and the returned source is empty.
    pub fn gen_source(&mut self) -> String {
        let mut out = String::new();
        if !self.check_limits() {
            return out;
        }
        self.write_data(&mut out);
        if self.pd.want_complete {
            self.write_init(&mut out);
            self.write_exec(&mut out);
        }
        out
    }

    /// Generates the source and hands it over, or the log when errors were diagnosed.
    pub fn try_gen_source(mut self) -> Result<String, BufLog> {
        let src = self.gen_source();
        if self.log.num_errors() == 0 {
            Ok(src)
        } else {
            Err(self.log)
        }
    }

    // -----------------------------------------------------------------------------------------
    // names and small expressions

    fn data_prefix(&self) -> String {
        if self.pd.data_prefix {
            format!("{}_", self.pd.fsm_name)
        } else {
            String::new()
        }
    }

    /// Name of a generated array.
    fn arr(&self, base: &str) -> String {
        format!("_{}{}", self.data_prefix(), base)
    }

    /// Name of a generated scalar or routine.
    fn var(&self, base: &str) -> String {
        format!("{}{}", self.data_prefix(), base)
    }

    fn array_type(&self, max_val: u64) -> String {
        type_subsumes(self.host.types, max_val as i64)
            .unwrap_or_else(|| panic!("no {} type subsumes {max_val}", self.host.name))
            .full_name()
    }

    /// Alphabet type of the key tables, widened when conditions push keys past the
    /// alphabet maximum.
    fn wide_alph_type(&self) -> String {
        let key_ops = &self.pd.key_ops;
        if self.pd.max_key <= key_ops.max_key {
            key_ops.alph_type.full_name()
        } else {
            type_subsumes_signed(self.host.types, key_ops.signed, self.pd.max_key.val())
                .unwrap_or_else(|| panic!("no {} type subsumes the widened key {}", self.host.name, self.pd.max_key))
                .full_name()
        }
    }

    /// Destination arrays hold `-1` when a transition can fail into a missing error
    /// state, which forces a signed element type.
    fn targs_type(&self) -> String {
        if self.error_literal() < 0 && (self.error_row_needed() || self.any_error_targ()) {
            type_subsumes_signed(self.host.types, true, self.an.bounds.max_state as i64)
                .unwrap_or_else(|| panic!("no signed {} type subsumes {}", self.host.name, self.an.bounds.max_state))
                .full_name()
        } else {
            self.array_type(self.an.bounds.max_state)
        }
    }

    fn expand(&self, items: &InlineList, targ: Option<StateId>, in_finish: bool) -> String {
        let mut ret = String::new();
        self.inline_list(&mut ret, items, targ, in_finish);
        ret
    }

    fn access(&self) -> String {
        match &self.pd.access_expr {
            Some(expr) => self.expand(expr, None, false),
            None => String::new(),
        }
    }

    fn cs(&self) -> String {
        match &self.pd.cur_state_expr {
            Some(expr) => format!("({})", self.expand(expr, None, false)),
            None => format!("{}cs", self.access()),
        }
    }

    fn p(&self) -> String {
        format!("{}p", self.access())
    }

    fn pe(&self) -> String {
        format!("{}pe", self.access())
    }

    fn top(&self) -> String {
        format!("{}top", self.access())
    }

    fn stack(&self) -> String {
        format!("{}stack", self.access())
    }

    fn act(&self) -> String {
        format!("{}act", self.access())
    }

    fn tokstart(&self) -> String {
        format!("{}tokstart", self.access())
    }

    fn tokend(&self) -> String {
        format!("{}tokend", self.access())
    }

    fn get_key(&self) -> String {
        match &self.pd.get_key_expr {
            Some(expr) => format!("({})", self.expand(expr, None, false)),
            None => (self.host.deref_input)(&self.p()),
        }
    }

    fn get_wide_key(&self) -> String {
        if self.an.flags.any_conditions {
            "_widec".to_string()
        } else {
            self.get_key()
        }
    }

    /// Key spelling: unsigned alphabets take a `u` suffix when the host supports it.
    fn key(&self, key: Key) -> String {
        if self.pd.key_ops.signed || !self.host.explicit_unsigned {
            key.val().to_string()
        } else {
            format!("{}u", key.val() as u64)
        }
    }

    fn error_literal(&self) -> i64 {
        match self.pd.red.error_state {
            Some(st) => st as i64,
            None => -1,
        }
    }

    fn any_error_targ(&self) -> bool {
        self.pd.red.trans_set.iter().any(|t| t.targ.is_none())
    }

    /// A virtual error row is appended to the transition tables when some state has no
    /// default transition to fall into.
    fn error_row_needed(&self) -> bool {
        self.pd.red.states.iter().any(|st| st.default_trans.is_none())
    }

    /// Row index emitted for the default slot of a state.
    fn default_row(&self, st: &RedState) -> TransId {
        match st.default_trans {
            Some(t) => t,
            None => self.pd.red.trans_set.len(),
        }
    }

    fn targ_val(&self, trans: &RedTrans) -> i64 {
        match trans.targ {
            Some(st) => st as i64,
            None => self.error_literal(),
        }
    }

    fn line_directive(&self, out: &mut String, line: u32) {
        out.push_str(&(self.host.line_directive)(&self.pd.file_name, line));
        out.push('\n');
    }

    // -----------------------------------------------------------------------------------------
    // inline expansion

    fn inline_list(&self, ret: &mut String, items: &InlineList, targ: Option<StateId>, in_finish: bool) {
        for item in items {
            match item {
                InlineItem::Text(text) => ret.push_str(text),
                InlineItem::Goto(st) => self.goto_stmt(ret, &st.to_string(), in_finish),
                InlineItem::GotoExpr(expr) => {
                    let dest = format!("({})", self.expand(expr, targ, in_finish));
                    self.goto_stmt(ret, &dest, in_finish);
                }
                InlineItem::Call(st) => self.call_stmt(ret, &st.to_string(), in_finish),
                InlineItem::CallExpr(expr) => {
                    let dest = format!("({})", self.expand(expr, targ, in_finish));
                    self.call_stmt(ret, &dest, in_finish);
                }
                InlineItem::Ret => self.ret_stmt(ret, in_finish),
                InlineItem::Next(st) => ret.push_str(&format!("{} = {st};", self.cs())),
                InlineItem::NextExpr(expr) => {
                    ret.push_str(&format!("{} = ({});", self.cs(), self.expand(expr, targ, in_finish)));
                }
                InlineItem::PChar => ret.push_str(&self.p()),
                InlineItem::Char => ret.push_str(&self.get_key()),
                InlineItem::Hold => ret.push_str(&format!("{}--;", self.p())),
                // the double brackets protect a single-word expression from being parsed
                // as a cast by the D compiler
                InlineItem::Exec(expr) => {
                    ret.push_str(&format!("{{{} = (({}))-1;}}", self.p(), self.expand(expr, targ, in_finish)));
                }
                InlineItem::HoldTE => ret.push_str(&format!("{}--;", self.tokend())),
                InlineItem::ExecTE(expr) => {
                    ret.push_str(&format!("{{{} = (({}));}}", self.tokend(), self.expand(expr, targ, in_finish)));
                }
                InlineItem::Curs => ret.push_str("(_ps)"),
                InlineItem::Targs => match targ {
                    Some(st) => ret.push_str(&st.to_string()),
                    None => ret.push_str(&format!("({})", self.cs())),
                },
                InlineItem::Entry(st) => ret.push_str(&st.to_string()),
                InlineItem::LmSwitch { handles_error, cases } => {
                    self.lm_switch(ret, *handles_error, cases, targ, in_finish);
                }
                InlineItem::LmSetActId(id) => ret.push_str(&format!("{} = {id};", self.act())),
                InlineItem::LmSetTokEnd(offset) => {
                    ret.push_str(&format!("{} = {}", self.tokend(), self.p()));
                    if *offset != 0 {
                        ret.push_str(&format!("+{offset}"));
                    }
                    ret.push(';');
                }
                InlineItem::LmGetTokEnd => ret.push_str(&self.tokend()),
                InlineItem::LmInitTokStart => {
                    ret.push_str(&format!("{} = {};", self.tokstart(), self.host.null_item));
                }
                InlineItem::LmInitAct => ret.push_str(&format!("{} = 0;", self.act())),
                InlineItem::LmSetTokStart => {
                    ret.push_str(&format!("{} = {};", self.tokstart(), self.p()));
                }
                InlineItem::SubAction(body) => {
                    if !body.is_empty() {
                        ret.push('{');
                        self.inline_list(ret, body, targ, in_finish);
                        ret.push('}');
                    }
                }
                InlineItem::Break => {
                    ret.push_str(&format!("{}goto _out;", self.host.ctrl_flow));
                }
            }
        }
    }

    fn goto_stmt(&self, ret: &mut String, dest: &str, in_finish: bool) {
        let label = if in_finish { "_out" } else { "_again" };
        ret.push_str(&format!("{{{} = {dest}; {}goto {label};}}", self.cs(), self.host.ctrl_flow));
    }

    fn call_stmt(&self, ret: &mut String, dest: &str, in_finish: bool) {
        let label = if in_finish { "_out" } else { "_again" };
        ret.push_str(&format!("{{{}[{}++] = {}; {} = {dest}; {}goto {label};}}",
                              self.stack(), self.top(), self.cs(), self.cs(), self.host.ctrl_flow));
    }

    fn ret_stmt(&self, ret: &mut String, in_finish: bool) {
        let label = if in_finish { "_out" } else { "_again" };
        ret.push_str(&format!("{{{} = {}[--{}]; {}goto {label};}}",
                              self.cs(), self.stack(), self.top(), self.host.ctrl_flow));
    }

    fn lm_switch(&self, ret: &mut String, handles_error: bool, cases: &[LmCase],
                 targ: Option<StateId>, in_finish: bool) {
        ret.push_str(&format!("\tswitch( {} ) {{\n", self.act()));
        if handles_error {
            // the error-handling switch forces the error state upstream, so it exists
            let err = self.pd.red.error_state
                .expect("longest-match error handling without an error state");
            ret.push_str(&format!("\tcase 0: {} = {}; ", self.tokend(), self.tokstart()));
            self.goto_stmt(ret, &err.to_string(), in_finish);
            ret.push('\n');
        }
        for case in cases {
            ret.push_str(&format!("\tcase {}:\n", case.lm_id));
            ret.push_str("\t{");
            self.inline_list(ret, &case.body, targ, in_finish);
            ret.push_str("}\n");
            ret.push_str("\tbreak;\n");
        }
        // default required for D code
        ret.push_str("\tdefault: break;\n\t}\n\t");
    }

    /// A full action body: the line directive mapping diagnostics back to the user's
    /// source, then the braced block.
    fn action_block(&self, out: &mut String, act: ActionRef, targ: Option<StateId>, in_finish: bool) {
        let action = &self.pd.actions[act];
        self.line_directive(out, action.line);
        out.push_str("\t{");
        self.inline_list(out, &action.body, targ, in_finish);
        out.push_str("}\n");
    }

    // -----------------------------------------------------------------------------------------
    // data tables

    fn open_array(&self, out: &mut String, ty: &str, name: &str) {
        out.push_str(&(self.host.open_array)(ty, name));
        out.push('\n');
    }

    fn close_array(&self, out: &mut String) {
        out.push_str(self.host.close_array);
        out.push_str("\n\n");
    }

    fn write_rows(&self, out: &mut String, items: &[String]) {
        if items.is_empty() {
            // a placeholder entry, empty initializers are not portable
            out.push_str("\t0\n");
            return;
        }
        let last = (items.len() - 1) / 8;
        for (i, chunk) in items.chunks(8).enumerate() {
            out.push('\t');
            out.push_str(&chunk.join(", "));
            if i != last {
                out.push(',');
            }
            out.push('\n');
        }
    }

    fn write_num_array(&self, out: &mut String, ty: &str, name: &str, items: &[i64]) {
        self.open_array(out, ty, name);
        let items = items.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        self.write_rows(out, &items);
        self.close_array(out);
    }

    /// The packed action array: a reserved 0 slot, then each interned table as a length
    /// prefix followed by the member action ids.
    fn write_actions(&self, out: &mut String) {
        let mut items = vec!["0".to_string()];
        for table in &self.pd.red.tables {
            items.push(table.actions.len().to_string());
            for &act in &table.actions {
                let id = self.an.action_ids[act]
                    .unwrap_or_else(|| panic!("action {act} in a table but never referenced"));
                items.push(id.to_string());
            }
        }
        self.open_array(out, &self.array_type(self.an.bounds.max_act_arr_item), &self.arr("actions"));
        self.write_rows(out, &items);
        self.close_array(out);
    }

    fn write_cond_tables(&self, out: &mut String) {
        let b = &self.an.bounds;
        let mut offsets = Vec::new();
        let mut lengths = Vec::new();
        let mut keys = Vec::new();
        let mut spaces = Vec::new();
        let mut cur_offset = 0;
        for st in &self.pd.red.states {
            offsets.push(cur_offset);
            lengths.push(st.conds.len() as i64);
            cur_offset += st.conds.len() as i64;
            for cond in &st.conds {
                keys.push(self.key(cond.low));
                keys.push(self.key(cond.high));
                spaces.push(cond.cond_space as i64);
            }
        }
        self.write_num_array(out, &self.array_type(b.max_cond_offset), &self.arr("cond_offsets"), &offsets);
        self.write_num_array(out, &self.array_type(b.max_cond_len), &self.arr("cond_lengths"), &lengths);
        self.open_array(out, &self.wide_alph_type(), &self.arr("cond_keys"));
        self.write_rows(out, &keys);
        self.close_array(out);
        self.write_num_array(out, &self.array_type(b.max_cond_space_id), &self.arr("cond_spaces"), &spaces);
    }

    fn write_indirect_tables(&self, out: &mut String) {
        let b = &self.an.bounds;
        let red = &self.pd.red;
        let mut key_offsets = Vec::new();
        let mut keys = Vec::new();
        let mut single_lengths = Vec::new();
        let mut range_lengths = Vec::new();
        let mut index_offsets = Vec::new();
        let mut indicies = Vec::new();
        let mut cur_key = 0;
        let mut cur_index = 0;
        for st in &red.states {
            key_offsets.push(cur_key);
            index_offsets.push(cur_index);
            single_lengths.push(st.single.len() as i64);
            range_lengths.push(st.ranges.len() as i64);
            cur_key += (st.single.len() + 2 * st.ranges.len()) as i64;
            cur_index += (st.single.len() + st.ranges.len() + 1) as i64;
            for &(key, trans) in &st.single {
                keys.push(self.key(key));
                indicies.push(trans as i64);
            }
            for &(low, _, _) in &st.ranges {
                keys.push(self.key(low));
            }
            for &(_, high, _) in &st.ranges {
                keys.push(self.key(high));
            }
            for &(_, _, trans) in &st.ranges {
                indicies.push(trans as i64);
            }
            indicies.push(self.default_row(st) as i64);
        }
        self.write_num_array(out, &self.array_type(b.max_key_offset), &self.arr("key_offsets"), &key_offsets);
        self.open_array(out, &self.wide_alph_type(), &self.arr("trans_keys"));
        self.write_rows(out, &keys);
        self.close_array(out);
        self.write_num_array(out, &self.array_type(b.max_single_len), &self.arr("single_lengths"), &single_lengths);
        self.write_num_array(out, &self.array_type(b.max_range_len), &self.arr("range_lengths"), &range_lengths);
        self.write_num_array(out, &self.array_type(b.max_index_offset), &self.arr("index_offsets"), &index_offsets);
        self.write_num_array(out, &self.array_type(b.max_index), &self.arr("indicies"), &indicies);
    }

    /// Dense expansion of a state's transitions over its key domain.
    fn flat_row(&self, st: &RedState, key: Key) -> TransId {
        st.single.iter().find(|&&(k, _)| k == key).map(|&(_, t)| t)
            .or_else(|| st.ranges.iter().find(|&&(lo, hi, _)| lo <= key && key <= hi).map(|&(_, _, t)| t))
            .unwrap_or_else(|| self.default_row(st))
    }

    fn write_flat_tables(&self, out: &mut String) {
        let b = &self.an.bounds;
        let red = &self.pd.red;
        let key_ops = &self.pd.key_ops;
        let mut keys = Vec::new();
        let mut spans = Vec::new();
        let mut index_offsets = Vec::new();
        let mut indicies = Vec::new();
        let mut cur_index = 0;
        for st in &red.states {
            index_offsets.push(cur_index);
            match st.trans_span {
                Some((low, high)) => {
                    let span = key_ops.span(low, high);
                    keys.push(self.key(low));
                    keys.push(self.key(high));
                    spans.push(span as i64);
                    for offset in 0..span {
                        indicies.push(self.flat_row(st, Key(low.val() + offset as i64)) as i64);
                    }
                    cur_index += span as i64;
                }
                None => {
                    keys.push(self.key(key_ops.min_key));
                    keys.push(self.key(key_ops.min_key));
                    spans.push(0);
                }
            }
            // the out-of-domain slot
            indicies.push(self.default_row(st) as i64);
            cur_index += 1;
        }
        self.open_array(out, &self.wide_alph_type(), &self.arr("keys"));
        self.write_rows(out, &keys);
        self.close_array(out);
        self.write_num_array(out, &self.array_type(b.max_span), &self.arr("key_spans"), &spans);
        self.write_num_array(out, &self.array_type(b.max_flat_index_offset), &self.arr("index_offsets"), &index_offsets);
        self.write_num_array(out, &self.array_type(b.max_index), &self.arr("indicies"), &indicies);
    }

    fn write_trans_tables(&self, out: &mut String) {
        let red = &self.pd.red;
        let mut targs = Vec::new();
        let mut actions = Vec::new();
        for trans in &red.trans_set {
            targs.push(self.targ_val(trans));
            actions.push(self.an.table_loc(trans.table) as i64);
        }
        if self.error_row_needed() {
            targs.push(self.error_literal());
            actions.push(0);
        }
        self.write_num_array(out, &self.targs_type(), &self.arr("trans_targs"), &targs);
        if self.an.flags.any_actions {
            self.write_num_array(out, &self.array_type(self.an.bounds.max_action_loc), &self.arr("trans_actions"), &actions);
        }
    }

    fn write_state_action_table(&self, out: &mut String, name: &str, pick: fn(&RedState) -> Option<TableId>) {
        let locs = self.pd.red.states.iter()
            .map(|st| self.an.table_loc(pick(st)) as i64)
            .collect::<Vec<_>>();
        self.write_num_array(out, &self.array_type(self.an.bounds.max_action_loc), &self.arr(name), &locs);
    }

    fn write_data(&self, out: &mut String) {
        let flags = &self.an.flags;
        // the reserved 0 entry is present even in an actionless machine
        self.write_actions(out);
        if flags.any_conditions {
            self.write_cond_tables(out);
        }
        match self.an.style {
            TableStyle::Indirect => self.write_indirect_tables(out),
            TableStyle::Flat => self.write_flat_tables(out),
        }
        self.write_trans_tables(out);
        if flags.any_to_state_actions {
            self.write_state_action_table(out, "to_state_actions", |st| st.to_state);
        }
        if flags.any_from_state_actions {
            self.write_state_action_table(out, "from_state_actions", |st| st.from_state);
        }
        if flags.any_eof_actions {
            self.write_state_action_table(out, "eof_actions", |st| st.eof_table);
        }
        out.push_str(&format!("{} = {};\n", (self.host.static_var)("int", &self.var("start")), self.pd.red.start_state));
        out.push_str(&format!("{} = {};\n", (self.host.static_var)("int", &self.var("first_final")), self.pd.red.first_final_id()));
        out.push_str(&format!("{} = {};\n", (self.host.static_var)("int", &self.var("error")), self.error_literal()));
        out.push('\n');
    }

    // -----------------------------------------------------------------------------------------
    // routines

    fn write_init(&self, out: &mut String) {
        out.push_str(&(self.host.func_open)(&self.var("init")));
        out.push_str("\n{\n");
        out.push_str(&format!("\t{} = {};\n", self.cs(), self.var("start")));
        // the stack top only exists when the machine can call
        if self.an.flags.any_action_calls || self.an.flags.any_action_rets {
            out.push_str(&format!("\t{} = 0;\n", self.top()));
        }
        if self.pd.has_longest_match {
            out.push_str(&format!("\t{} = {};\n", self.tokstart(), self.host.null_item));
            out.push_str(&format!("\t{} = {};\n", self.tokend(), self.host.null_item));
            out.push_str(&format!("\t{} = 0;\n", self.act()));
        }
        out.push_str("}\n\n");
    }

    /// The action-dispatch loop shared by the switch blocks: reads a length-prefixed run
    /// of action ids out of the packed array at `_acts`.
    fn write_action_loop(&self, out: &mut String, cases: &str) {
        out.push_str(&format!("\t_nacts = {} {}[_acts++];\n", (self.host.cast)(self.host.uint()), self.arr("actions")));
        out.push_str("\twhile ( _nacts-- > 0 ) {\n");
        out.push_str(&format!("\t\tswitch ( {}[_acts++] ) {{\n", self.arr("actions")));
        out.push_str(cases);
        out.push_str(self.host.switch_default);
        out.push_str("\t\t}\n");
        out.push_str("\t}\n");
    }

    /// One `case` block per referenced action of the given hook class.
    fn action_switch(&self, pick: fn(&ActionCounts) -> usize, in_finish: bool) -> String {
        let mut out = String::new();
        for (act, counts) in self.an.counts.iter().enumerate() {
            if pick(counts) > 0 {
                let id = self.an.action_ids[act].unwrap();
                out.push_str(&format!("\tcase {id}:\n"));
                self.action_block(&mut out, act, None, in_finish);
                out.push_str("\tbreak;\n");
            }
        }
        out
    }

    fn write_cond_translate(&self, out: &mut String) {
        out.push_str(&format!("\t_widec = {};\n", self.get_key()));
        out.push_str(&format!("\t_klen = {}[{}];\n", self.arr("cond_lengths"), self.cs()));
        out.push_str(&format!("\t_keys = {}[{}]*2;\n", self.arr("cond_offsets"), self.cs()));
        out.push_str("\tif ( _klen > 0 ) {\n");
        out.push_str("\t\tint _lower = _keys;\n");
        out.push_str("\t\tint _mid;\n");
        out.push_str("\t\tint _upper = _keys + (_klen<<1) - 2;\n");
        out.push_str("\t\twhile (1) {\n");
        out.push_str("\t\t\tif ( _upper < _lower )\n\t\t\t\tbreak;\n\n");
        out.push_str("\t\t\t_mid = _lower + (((_upper-_lower) >> 1) & ~1);\n");
        out.push_str(&format!("\t\t\tif ( {} < {}[_mid] )\n\t\t\t\t_upper = _mid - 2;\n",
                              self.get_wide_key(), self.arr("cond_keys")));
        out.push_str(&format!("\t\t\telse if ( {} > {}[_mid+1] )\n\t\t\t\t_lower = _mid + 2;\n",
                              self.get_wide_key(), self.arr("cond_keys")));
        out.push_str("\t\t\telse {\n");
        out.push_str(&format!("\t\t\t\tswitch ( {}[{}[{}] + ((_mid - _keys)>>1)] ) {{\n",
                              self.arr("cond_spaces"), self.arr("cond_offsets"), self.cs()));
        for cond_space in &self.pd.cond_spaces {
            out.push_str(&format!("\tcase {}: {{\n", cond_space.id));
            out.push_str(&format!("\t\t_widec = {}({} + ({} - {}));\n",
                                  (self.host.cast)(&self.wide_alph_type()),
                                  self.key(cond_space.base_key), self.get_key(), self.key(self.pd.key_ops.min_key)));
            for (i, &cond_act) in cond_space.cond_set.iter().enumerate() {
                let action = &self.pd.actions[cond_act];
                out.push_str("\t\tif ( ");
                out.push('\n');
                self.line_directive(out, action.line);
                self.inline_list(out, &action.body, None, false);
                let cond_val_offset = (1u64 << i) * self.pd.key_ops.alph_size();
                out.push_str(&format!(" ) _widec += {cond_val_offset};\n"));
            }
            out.push_str("\t}\n\tbreak;\n");
        }
        out.push_str(self.host.switch_default);
        out.push_str("\t\t\t\t}\n");
        out.push_str("\t\t\t\tbreak;\n");
        out.push_str("\t\t\t}\n");
        out.push_str("\t\t}\n");
        out.push_str("\t}\n\n");
    }

    fn write_locate_indirect(&self, out: &mut String) {
        out.push_str(&format!("\t_keys = {}[{}];\n", self.arr("key_offsets"), self.cs()));
        out.push_str(&format!("\t_trans = {}[{}];\n\n", self.arr("index_offsets"), self.cs()));
        out.push_str(&format!("\t_klen = {}[{}];\n", self.arr("single_lengths"), self.cs()));
        out.push_str("\tif ( _klen > 0 ) {\n");
        out.push_str("\t\tint _lower = _keys;\n");
        out.push_str("\t\tint _mid;\n");
        out.push_str("\t\tint _upper = _keys + _klen - 1;\n");
        out.push_str("\t\twhile (1) {\n");
        out.push_str("\t\t\tif ( _upper < _lower )\n\t\t\t\tbreak;\n\n");
        out.push_str("\t\t\t_mid = _lower + ((_upper-_lower) >> 1);\n");
        out.push_str(&format!("\t\t\tif ( {} < {}[_mid] )\n\t\t\t\t_upper = _mid - 1;\n",
                              self.get_wide_key(), self.arr("trans_keys")));
        out.push_str(&format!("\t\t\telse if ( {} > {}[_mid] )\n\t\t\t\t_lower = _mid + 1;\n",
                              self.get_wide_key(), self.arr("trans_keys")));
        out.push_str("\t\t\telse {\n");
        out.push_str("\t\t\t\t_trans += (_mid - _keys);\n");
        out.push_str("\t\t\t\tgoto _match;\n");
        out.push_str("\t\t\t}\n");
        out.push_str("\t\t}\n");
        out.push_str("\t\t_keys += _klen;\n");
        out.push_str("\t\t_trans += _klen;\n");
        out.push_str("\t}\n\n");
        out.push_str(&format!("\t_klen = {}[{}];\n", self.arr("range_lengths"), self.cs()));
        out.push_str("\tif ( _klen > 0 ) {\n");
        out.push_str("\t\tint _lower = _keys;\n");
        out.push_str("\t\tint _mid;\n");
        out.push_str("\t\tint _upper = _keys + (_klen<<1) - 2;\n");
        out.push_str("\t\twhile (1) {\n");
        out.push_str("\t\t\tif ( _upper < _lower )\n\t\t\t\tbreak;\n\n");
        out.push_str("\t\t\t_mid = _lower + (((_upper-_lower) >> 1) & ~1);\n");
        out.push_str(&format!("\t\t\tif ( {} < {}[_mid] )\n\t\t\t\t_upper = _mid - 2;\n",
                              self.get_wide_key(), self.arr("trans_keys")));
        out.push_str(&format!("\t\t\telse if ( {} > {}[_mid+1] )\n\t\t\t\t_lower = _mid + 2;\n",
                              self.get_wide_key(), self.arr("trans_keys")));
        out.push_str("\t\t\telse {\n");
        out.push_str("\t\t\t\t_trans += ((_mid - _keys)>>1);\n");
        out.push_str("\t\t\t\tgoto _match;\n");
        out.push_str("\t\t\t}\n");
        out.push_str("\t\t}\n");
        out.push_str("\t\t_trans += _klen;\n");
        out.push_str("\t}\n\n");
        out.push_str("_match:\n");
        out.push_str(&format!("\t_trans = {}[_trans];\n", self.arr("indicies")));
    }

    fn write_locate_flat(&self, out: &mut String) {
        out.push_str(&format!("\t_keys = ({}<<1);\n", self.cs()));
        out.push_str(&format!("\t_inds = {}[{}];\n\n", self.arr("index_offsets"), self.cs()));
        out.push_str(&format!("\t_slen = {}[{}];\n", self.arr("key_spans"), self.cs()));
        out.push_str(&format!("\t_trans = {}[ _inds + (\n", self.arr("indicies")));
        out.push_str(&format!("\t\t_slen > 0 && {}[_keys] <= {} &&\n", self.arr("keys"), self.get_wide_key()));
        out.push_str(&format!("\t\t{} <= {}[_keys+1] ?\n", self.get_wide_key(), self.arr("keys")));
        out.push_str(&format!("\t\t{} - {}[_keys] : _slen ) ];\n", self.get_wide_key(), self.arr("keys")));
    }

    fn write_exec(&self, out: &mut String) {
        assert!(self.host.supports_goto,
                "{} cannot host the label-based driver loop", self.host.name);
        let flags = &self.an.flags;
        let any_dispatch = flags.any_actions;
        out.push_str(&(self.host.func_open)(&self.var("execute")));
        out.push_str("\n{\n");
        match self.an.style {
            TableStyle::Indirect => out.push_str("\tint _klen;\n"),
            TableStyle::Flat => {
                out.push_str("\tint _slen;\n\tint _inds;\n");
                // the condition translation bisects with _klen in both styles
                if flags.any_conditions {
                    out.push_str("\tint _klen;\n");
                }
            }
        }
        if flags.any_reg_cur_state_ref {
            out.push_str("\tint _ps;\n");
        }
        if flags.any_conditions {
            out.push_str(&format!("\t{} _widec;\n", self.wide_alph_type()));
        }
        out.push_str(&format!("\t{} _trans;\n", self.host.uint()));
        if any_dispatch {
            out.push_str(&format!("\tint _acts;\n\t{} _nacts;\n", self.host.uint()));
        }
        out.push_str("\tint _keys;\n\n");
        out.push_str(&format!("\tif ( {} == {} )\n\t\tgoto _out;\n", self.p(), self.pe()));
        out.push_str("_resume:\n");
        if self.pd.red.error_state.is_some() || self.error_row_needed() || self.any_error_targ() {
            out.push_str(&format!("\tif ( {} == {} )\n\t\tgoto _out;\n", self.cs(), self.error_literal()));
        }
        if flags.any_from_state_actions {
            out.push_str(&format!("\t_acts = {}[{}];\n", self.arr("from_state_actions"), self.cs()));
            self.write_action_loop(out, &self.action_switch(|c| c.from_state, false));
            out.push('\n');
        }
        if flags.any_conditions {
            self.write_cond_translate(out);
        }
        match self.an.style {
            TableStyle::Indirect => self.write_locate_indirect(out),
            TableStyle::Flat => self.write_locate_flat(out),
        }
        if flags.any_reg_cur_state_ref {
            out.push_str(&format!("\t_ps = {};\n", self.cs()));
        }
        out.push_str(&format!("\t{} = {}[_trans];\n\n", self.cs(), self.arr("trans_targs")));
        if flags.any_reg_actions {
            out.push_str(&format!("\tif ( {}[_trans] == 0 )\n\t\tgoto _again;\n\n", self.arr("trans_actions")));
            out.push_str(&format!("\t_acts = {}[_trans];\n", self.arr("trans_actions")));
            self.write_action_loop(out, &self.action_switch(|c| c.trans, false));
            out.push('\n');
        }
        out.push_str("_again:\n");
        if flags.any_to_state_actions {
            out.push_str(&format!("\t_acts = {}[{}];\n", self.arr("to_state_actions"), self.cs()));
            self.write_action_loop(out, &self.action_switch(|c| c.to_state, false));
            out.push('\n');
        }
        out.push_str(&format!("\tif ( ++{} != {} )\n\t\tgoto _resume;\n", self.p(), self.pe()));
        if flags.any_eof_actions {
            out.push_str("_out:\n");
            out.push_str(&format!("\tif ( {} == {} ) {{\n", self.p(), self.pe()));
            out.push_str(&format!("\t_acts = {}[{}];\n", self.arr("eof_actions"), self.cs()));
            self.write_action_loop(out, &self.action_switch(|c| c.eof, true));
            out.push_str("\t}\n");
        } else {
            out.push_str("_out: {}\n");
        }
        out.push_str("}\n");
    }

    // -----------------------------------------------------------------------------------------

    /// Diagnoses quantities no host integer type can represent, such as wide tables on a
    /// narrow host. Returns false when emission must not proceed.
    fn check_limits(&mut self) -> bool {
        let b = &self.an.bounds;
        let quantities = [
            ("key offset", b.max_key_offset),
            ("index offset", b.max_index_offset),
            ("flat index offset", b.max_flat_index_offset),
            ("action location", b.max_action_loc),
            ("state id", b.max_state),
            ("transition index", b.max_index),
        ];
        let mut ok = true;
        for (what, value) in quantities {
            if type_subsumes(self.host.types, value as i64).is_none() {
                self.log.add_error(format!("the {what} maximum {value} exceeds every {} integer type", self.host.name));
                ok = false;
            }
        }
        if type_subsumes_signed(self.host.types, self.pd.key_ops.signed, self.pd.max_key.val()).is_none() {
            self.log.add_error(format!("the widened key {} exceeds every {} integer type", self.pd.max_key, self.host.name));
            ok = false;
        }
        ok
    }
}
