// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.


use iter_index::IndexerIterator;
use crate::{ActionRef, TableId};
use crate::keyops::{type_subsumes, type_subsumes_signed, HostType};
use crate::redfsm::{InlineItem, InlineList, ParseData};

// ---------------------------------------------------------------------------------------------
// Analysis results
//
// Everything computed here is an external column over the ParseData arenas: the machine
// itself stays immutable and a second analysis of the same input yields the same result.

/// Reference counts of one action or action table, one counter per hook class.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ActionCounts {
    /// References from single, range and default transitions.
    pub trans: usize,
    pub to_state: usize,
    pub from_state: usize,
    pub eof: usize,
}

impl ActionCounts {
    #[inline]
    pub fn total(&self) -> usize {
        self.trans + self.to_state + self.from_state + self.eof
    }
}

/// Per-table facts about the inline trees of the member actions.
#[derive(Clone, Copy, Debug, Default)]
pub struct TableFlags {
    pub any_next_stmt: bool,
    pub any_cur_state_ref: bool,
    pub any_break_stmt: bool,
}

/// Position of a table in the packed action array: `location` is the offset of its length
/// prefix, `act_list_id` its ordinal.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TableLayout {
    pub location: usize,
    pub act_list_id: usize,
}

/// Machine-wide facts driving which variables, labels and tables the driver needs.
#[derive(Clone, Copy, Debug, Default)]
pub struct MachineFlags {
    pub any_actions: bool,
    pub any_to_state_actions: bool,
    pub any_from_state_actions: bool,
    pub any_reg_actions: bool,
    pub any_eof_actions: bool,
    pub any_action_gotos: bool,
    pub any_action_calls: bool,
    pub any_action_rets: bool,
    pub any_reg_action_rets: bool,
    pub any_reg_next_stmt: bool,
    pub any_reg_action_by_val_control: bool,
    pub any_reg_cur_state_ref: bool,
    pub any_reg_break: bool,
    pub any_lm_switch_error: bool,
    pub any_conditions: bool,
}

/// Numeric upper bounds over the machine, sizing every generated array element type.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bounds {
    pub max_single_len: u64,
    pub max_range_len: u64,
    pub max_key_offset: u64,
    pub max_index_offset: u64,
    pub max_flat_index_offset: u64,
    pub max_cond_offset: u64,
    pub max_cond_len: u64,
    pub max_cond_index_offset: u64,
    pub max_span: u64,
    pub max_cond_span: u64,
    pub max_act_list_id: u64,
    pub max_action_loc: u64,
    pub max_act_arr_item: u64,
    pub max_cond_space_id: u64,
    pub max_state: u64,
    /// Count of interned transitions; the 0 index slot stays reserved.
    pub max_index: u64,
    /// Count of condition spaces; the 0 slot stays reserved.
    pub max_cond: u64,
}

/// Transition table encoding selected for the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableStyle {
    /// Per state, a dense destination array over `[low_key, high_key]`.
    Flat,
    /// Per state, sorted key arrays searched by bisection, then a transition-id table.
    Indirect,
}

/// Value-typed result of the analysis sweep, threaded into the emitters.
#[derive(Clone, Debug)]
pub struct Analysis {
    /// Reference counts per action (action-arena column).
    pub counts: Vec<ActionCounts>,
    /// Reference counts per interned action table.
    pub table_counts: Vec<ActionCounts>,
    /// Dense ids of referenced actions, in arena order; unreferenced actions get none.
    pub action_ids: Vec<Option<usize>>,
    pub table_flags: Vec<TableFlags>,
    pub table_layout: Vec<TableLayout>,
    /// Per state: some outgoing transition action references the current state.
    pub state_cur_ref: Vec<bool>,
    pub flags: MachineFlags,
    pub bounds: Bounds,
    pub style: TableStyle,
}

impl Analysis {
    /// Packed-array index emitted for an optional table reference: `location + 1`, with 0
    /// meaning "no action".
    pub fn table_loc(&self, table: Option<TableId>) -> usize {
        match table {
            Some(t) => self.table_layout[t].location + 1,
            None => 0,
        }
    }
}

/// Runs the full analysis over a machine. Pure: only the returned columns are written.
pub fn analyze(pd: &ParseData, types: &'static [HostType]) -> Analysis {
    let mut an = Analyzer::new(pd, types);
    an.count_refs();
    an.scan_actions();
    an.scan_tables();
    an.find_state_refs();
    an.assign_action_ids();
    an.layout_tables();
    an.set_value_limits();
    an.finish()
}

// ---------------------------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Slot { Trans, ToState, FromState, Eof }

struct Analyzer<'a> {
    pd: &'a ParseData,
    types: &'static [HostType],
    counts: Vec<ActionCounts>,
    table_counts: Vec<ActionCounts>,
    action_ids: Vec<Option<usize>>,
    table_flags: Vec<TableFlags>,
    table_layout: Vec<TableLayout>,
    state_cur_ref: Vec<bool>,
    flags: MachineFlags,
    bounds: Bounds,
}

impl<'a> Analyzer<'a> {
    fn new(pd: &'a ParseData, types: &'static [HostType]) -> Analyzer<'a> {
        assert!(!pd.red.states.is_empty(), "machine without states");
        Analyzer {
            pd,
            types,
            counts: vec![ActionCounts::default(); pd.actions.len()],
            table_counts: vec![ActionCounts::default(); pd.red.tables.len()],
            action_ids: vec![None; pd.actions.len()],
            table_flags: vec![TableFlags::default(); pd.red.tables.len()],
            table_layout: vec![TableLayout::default(); pd.red.tables.len()],
            state_cur_ref: vec![false; pd.red.states.len()],
            flags: MachineFlags::default(),
            bounds: Bounds::default(),
        }
    }

    fn bump(&mut self, table: TableId, slot: Slot) {
        let pd = self.pd;
        match slot {
            Slot::Trans => self.table_counts[table].trans += 1,
            Slot::ToState => self.table_counts[table].to_state += 1,
            Slot::FromState => self.table_counts[table].from_state += 1,
            Slot::Eof => self.table_counts[table].eof += 1,
        }
        for &act in &pd.red.tables[table].actions {
            match slot {
                Slot::Trans => self.counts[act].trans += 1,
                Slot::ToState => self.counts[act].to_state += 1,
                Slot::FromState => self.counts[act].from_state += 1,
                Slot::Eof => self.counts[act].eof += 1,
            }
        }
    }

    /// Reference-counts every action-table occurrence over all states, and transitively
    /// the actions the tables name.
    fn count_refs(&mut self) {
        let pd = self.pd;
        for state in &pd.red.states {
            let trans_tables = state.single.iter().map(|&(_, t)| t)
                .chain(state.ranges.iter().map(|&(_, _, t)| t))
                .chain(state.default_trans)
                .filter_map(|t| pd.red.trans_set[t].table);
            for table in trans_tables {
                self.bump(table, Slot::Trans);
            }
            if let Some(table) = state.to_state {
                self.bump(table, Slot::ToState);
            }
            if let Some(table) = state.from_state {
                self.bump(table, Slot::FromState);
            }
            if let Some(table) = state.eof_table {
                self.bump(table, Slot::Eof);
            }
        }
    }

    /// Walks every action's inline tree, recording the machine-wide flags.
    fn scan_actions(&mut self) {
        let pd = self.pd;
        for (act, action) in pd.actions.iter().enumerate() {
            let counts = self.counts[act];
            if counts.to_state > 0 {
                self.flags.any_to_state_actions = true;
            }
            if counts.from_state > 0 {
                self.flags.any_from_state_actions = true;
            }
            if counts.eof > 0 {
                self.flags.any_eof_actions = true;
            }
            if counts.trans > 0 {
                self.flags.any_reg_actions = true;
            }
            self.scan_action_items(counts, &action.body);
        }
        self.flags.any_actions = !pd.red.tables.is_empty();
    }

    fn scan_action_items(&mut self, counts: ActionCounts, items: &InlineList) {
        for item in items {
            if counts.total() > 0 {
                match item {
                    InlineItem::Goto(_) | InlineItem::GotoExpr(_) => self.flags.any_action_gotos = true,
                    InlineItem::Call(_) | InlineItem::CallExpr(_) => self.flags.any_action_calls = true,
                    InlineItem::Ret => self.flags.any_action_rets = true,
                    _ => {}
                }
            }
            // facts only relevant when the action runs from a regular hook
            if counts.trans > 0 || counts.to_state > 0 || counts.from_state > 0 {
                match item {
                    InlineItem::Ret => self.flags.any_reg_action_rets = true,
                    InlineItem::Next(_) | InlineItem::NextExpr(_) => self.flags.any_reg_next_stmt = true,
                    InlineItem::GotoExpr(_) | InlineItem::CallExpr(_) => self.flags.any_reg_action_by_val_control = true,
                    InlineItem::Curs => self.flags.any_reg_cur_state_ref = true,
                    InlineItem::Break => self.flags.any_reg_break = true,
                    InlineItem::LmSwitch { handles_error: true, .. } => self.flags.any_lm_switch_error = true,
                    _ => {}
                }
            }
            for child in children(item) {
                self.scan_action_items(counts, child);
            }
        }
    }

    /// Walks the member actions of every interned table, recording per-table flags.
    fn scan_tables(&mut self) {
        let pd = self.pd;
        for (table, red_table) in pd.red.tables.iter().enumerate() {
            for &act in &red_table.actions {
                self.scan_table_items(table, &pd.actions[act].body);
            }
        }
    }

    fn scan_table_items(&mut self, table: TableId, items: &InlineList) {
        for item in items {
            match item {
                InlineItem::Next(_) | InlineItem::NextExpr(_) => self.table_flags[table].any_next_stmt = true,
                InlineItem::Curs => self.table_flags[table].any_cur_state_ref = true,
                InlineItem::Break => self.table_flags[table].any_break_stmt = true,
                _ => {}
            }
            for child in children(item) {
                self.scan_table_items(table, child);
            }
        }
    }

    /// Marks the states whose outgoing transition actions read the current state, and the
    /// machine-wide condition flag.
    fn find_state_refs(&mut self) {
        for state in &self.pd.red.states {
            let any = state.single.iter().map(|&(_, t)| t)
                .chain(state.ranges.iter().map(|&(_, _, t)| t))
                .chain(state.default_trans)
                .filter_map(|t| self.pd.red.trans_set[t].table)
                .any(|table| self.table_flags[table].any_cur_state_ref);
            if any {
                self.state_cur_ref[state.id] = true;
            }
            if !state.conds.is_empty() {
                self.flags.any_conditions = true;
            }
        }
    }

    /// Assigns dense ids to referenced actions, in arena order.
    fn assign_action_ids(&mut self) {
        let mut next_id = 0;
        for (act, counts) in self.counts.iter().index::<usize>() {
            if counts.total() > 0 {
                self.action_ids[act] = Some(next_id);
                next_id += 1;
            }
        }
    }

    /// Lays the interned tables out in the packed action array: a reserved 0 slot, then
    /// per table a length prefix followed by the member action ids.
    fn layout_tables(&mut self) {
        let mut location = 0;
        for (id, table) in self.pd.red.tables.iter().index::<usize>() {
            self.table_layout[id] = TableLayout { location, act_list_id: id };
            location += table.actions.len() + 1;
        }
    }

    fn set_value_limits(&mut self) {
        let red = &self.pd.red;
        let key_ops = &self.pd.key_ops;
        let b = &mut self.bounds;

        // the 0 index is reserved for "no value" in both of these, so the max is one more
        // than it would be if they started at 0
        b.max_index = red.trans_set.len() as u64;
        b.max_cond = self.pd.cond_spaces.len() as u64;

        b.max_state = (red.states.len() - 1) as u64;
        for cs in &self.pd.cond_spaces {
            b.max_cond_space_id = b.max_cond_space_id.max(cs.id as u64);
        }

        let last = red.states.len() - 1;
        for (i, st) in red.states.iter().enumerate() {
            b.max_cond_len = b.max_cond_len.max(st.conds.len() as u64);
            b.max_single_len = b.max_single_len.max(st.single.len() as u64);
            b.max_range_len = b.max_range_len.max(st.ranges.len() as u64);

            // the offsets of the state after the last are never consumed, skip them
            if i != last {
                b.max_cond_offset += st.conds.len() as u64;
                b.max_key_offset += (st.single.len() + st.ranges.len() * 2) as u64;
                b.max_index_offset += (st.single.len() + st.ranges.len() + 1) as u64;
            }

            if let Some((low, high)) = st.cond_span {
                b.max_cond_span = b.max_cond_span.max(key_ops.span(low, high));
            }
            if let Some((low, high)) = st.trans_span {
                b.max_span = b.max_span.max(key_ops.span(low, high));
            }

            if i != last {
                if let Some((low, high)) = st.cond_span {
                    b.max_cond_index_offset += key_ops.span(low, high);
                }
                if let Some((low, high)) = st.trans_span {
                    b.max_flat_index_offset += key_ops.span(low, high);
                }
                b.max_flat_index_offset += 1;
            }
        }

        for (id, table) in red.tables.iter().enumerate() {
            let layout = self.table_layout[id];
            b.max_act_list_id = b.max_act_list_id.max((layout.act_list_id + 1) as u64);
            b.max_action_loc = b.max_action_loc.max((layout.location + 1) as u64);
            b.max_act_arr_item = b.max_act_arr_item.max(table.actions.len() as u64);
            for &act in &table.actions {
                let action_id = self.action_ids[act]
                    .unwrap_or_else(|| panic!("action {act} is in table {id} but has no id"));
                b.max_act_arr_item = b.max_act_arr_item.max(action_id as u64);
            }
        }
    }

    /// Picks the cheaper of the two transition encodings by estimated table byte size,
    /// each slot weighted with the element type its maximum requires.
    fn decide_style(&self) -> TableStyle {
        let b = &self.bounds;
        if b.max_span == 0 {
            return TableStyle::Indirect;
        }
        let sz = |v: u64| self.type_size(v);
        let nbr_states = self.pd.red.states.len() as u64;
        let key_size = self.wide_key_size() as u64;
        let flat = key_size * 2 * nbr_states
            + sz(b.max_span) * nbr_states
            + sz(b.max_flat_index_offset) * nbr_states
            + sz(b.max_index) * (b.max_flat_index_offset + 1);
        let indirect = key_size * b.max_key_offset
            + (sz(b.max_single_len) + sz(b.max_range_len) + sz(b.max_index_offset)) * nbr_states
            + sz(b.max_index) * (b.max_index_offset + 1);
        if flat <= indirect { TableStyle::Flat } else { TableStyle::Indirect }
    }

    fn type_size(&self, max_val: u64) -> u64 {
        let t = type_subsumes(self.types, max_val as i64)
            .unwrap_or_else(|| panic!("no host type subsumes {max_val}"));
        t.size as u64
    }

    fn wide_key_size(&self) -> u32 {
        let key_ops = &self.pd.key_ops;
        if self.pd.max_key <= key_ops.max_key {
            key_ops.alph_type.size
        } else {
            type_subsumes_signed(self.types, key_ops.signed, self.pd.max_key.val())
                .unwrap_or_else(|| panic!("no host type subsumes the widened key {}", self.pd.max_key))
                .size
        }
    }

    fn finish(self) -> Analysis {
        let style = self.decide_style();
        Analysis {
            counts: self.counts,
            table_counts: self.table_counts,
            action_ids: self.action_ids,
            table_flags: self.table_flags,
            table_layout: self.table_layout,
            state_cur_ref: self.state_cur_ref,
            flags: self.flags,
            bounds: self.bounds,
            style,
        }
    }
}

/// Child lists of an inline item, for tree walks.
fn children(item: &InlineItem) -> Vec<&InlineList> {
    match item {
        InlineItem::GotoExpr(list)
        | InlineItem::CallExpr(list)
        | InlineItem::NextExpr(list)
        | InlineItem::Exec(list)
        | InlineItem::ExecTE(list)
        | InlineItem::SubAction(list) => vec![list],
        InlineItem::LmSwitch { cases, .. } => cases.iter().map(|c| &c.body).collect(),
        _ => vec![],
    }
}

/// An action reference usable by tests and upstream passes to sanity-check a bundle.
pub fn is_referenced(an: &Analysis, act: ActionRef) -> bool {
    an.counts[act].total() > 0
}
