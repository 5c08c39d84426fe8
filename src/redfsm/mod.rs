// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.


use std::fmt::{Display, Formatter};
use crate::{ActionRef, CondSpaceId, StateId, TableId, TransId};
use crate::fsm::Fsm;
use crate::keyops::{Key, KeyOps};

// ---------------------------------------------------------------------------------------------
// Inline item tree

/// One case of a longest-match dispatch.
#[derive(Clone, Debug, PartialEq)]
pub struct LmCase {
    pub lm_id: u32,
    pub body: InlineList,
}

/// A node of an action body: literal text or a semantic primitive. Control-transfer
/// variants reference states by id, never by pointer, so the tree shares the state arena
/// without owning into it.
#[derive(Clone, Debug, PartialEq)]
pub enum InlineItem {
    /// Literal text emitted verbatim.
    Text(String),
    /// Transfer control to a state.
    Goto(StateId),
    /// Transfer control to a computed state.
    GotoExpr(InlineList),
    /// Push the return state, then transfer control to a state.
    Call(StateId),
    /// Same with a computed target.
    CallExpr(InlineList),
    /// Pop the return state and transfer control to it.
    Ret,
    /// Overwrite the current state without yielding control.
    Next(StateId),
    /// Same with a computed state.
    NextExpr(InlineList),
    /// The input pointer.
    PChar,
    /// The current input symbol.
    Char,
    /// Re-read the current symbol on the next step.
    Hold,
    /// Reassign the input pointer from a computed expression.
    Exec(InlineList),
    /// [Hold](InlineItem::Hold) targeting the tokend register.
    HoldTE,
    /// [Exec](InlineItem::Exec) targeting the tokend register.
    ExecTE(InlineList),
    /// The current state id.
    Curs,
    /// The concrete target state id of the enclosing transition.
    Targs,
    /// The id of a named entry point.
    Entry(StateId),
    /// Longest-match dispatch on the `act` register.
    LmSwitch { handles_error: bool, cases: Vec<LmCase> },
    /// `act := n`
    LmSetActId(u32),
    /// `tokend := p + offset`
    LmSetTokEnd(u32),
    /// Read the tokend register.
    LmGetTokEnd,
    /// `tokstart := null`
    LmInitTokStart,
    /// `act := 0`
    LmInitAct,
    /// `tokstart := p`
    LmSetTokStart,
    /// A braced scope around a child list, elided when empty.
    SubAction(InlineList),
    /// Exit the dispatch loop.
    Break,
}

pub type InlineList = Vec<InlineItem>;

#[test]
fn inline_item_size() {
    let size = std::mem::size_of::<InlineItem>();
    assert!(size <= 40, "size of InlineItem is too big: {size}");
}

/// A user-written action fragment, attached to transitions or state hooks by reference.
#[derive(Clone, Debug, PartialEq)]
pub struct Action {
    pub name: String,
    pub body: InlineList,
    /// Line of the action in the original source, for line directives.
    pub line: u32,
}

impl Action {
    pub fn new<T: Into<String>>(name: T, body: InlineList, line: u32) -> Action {
        Action { name: name.into(), body, line }
    }
}

/// A set of conditional predicates specializing transitions over the same keys. The base
/// key offsets the widened key space of this condition space.
#[derive(Clone, Debug, PartialEq)]
pub struct CondSpace {
    pub id: CondSpaceId,
    pub base_key: Key,
    /// Condition actions, bit `i` of a condition value refers to `cond_set[i]`.
    pub cond_set: Vec<ActionRef>,
}

// ---------------------------------------------------------------------------------------------
// Reduced machine

/// An interned action table: the ordered actions executed together at one hook. Tables are
/// deduplicated by content, transitions share them by index.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionTable {
    pub actions: Vec<ActionRef>,
}

/// An interned transition: destination and optional action table. Two transitions are the
/// same iff both fields match.
#[derive(Clone, Debug, PartialEq)]
pub struct RedTrans {
    /// Destination, or `None` for the implicit error state.
    pub targ: Option<StateId>,
    pub table: Option<TableId>,
}

/// A condition interval of a state: keys in `[low, high]` are specialized by `cond_space`.
#[derive(Clone, Debug, PartialEq)]
pub struct StateCond {
    pub low: Key,
    pub high: Key,
    pub cond_space: CondSpaceId,
}

#[derive(Clone, Debug, Default)]
pub struct RedState {
    pub id: StateId,
    /// Exact-key transitions, sorted by key.
    pub single: Vec<(Key, TransId)>,
    /// Range transitions, sorted by low key.
    pub ranges: Vec<(Key, Key, TransId)>,
    pub default_trans: Option<TransId>,
    pub to_state: Option<TableId>,
    pub from_state: Option<TableId>,
    pub eof_table: Option<TableId>,
    /// Condition intervals in canonical insertion order.
    pub conds: Vec<StateCond>,
    /// Denormalized bounds of the transition key domain, `None` when the state has no
    /// keyed transitions.
    pub trans_span: Option<(Key, Key)>,
    /// Denormalized bounds of the condition key domain.
    pub cond_span: Option<(Key, Key)>,
}

impl RedState {
    pub fn new(id: StateId) -> RedState {
        RedState { id, ..RedState::default() }
    }
}

/// The post-reduction machine consumed by analysis and code generation. Read-only once
/// analysis has run; the interning methods are for the upstream construction pass.
#[derive(Clone, Debug, Default)]
pub struct RedFsm {
    pub states: Vec<RedState>,
    pub start_state: StateId,
    pub error_state: Option<StateId>,
    /// Final states occupy the id range `[first_final, nbr_states)`; `None` when the
    /// machine has no final state.
    pub first_final: Option<StateId>,
    /// Interned transitions; a [TransId] indexes this list.
    pub trans_set: Vec<RedTrans>,
    /// Interned action tables; a [TableId] indexes this list.
    pub tables: Vec<ActionTable>,
}

impl RedFsm {
    pub fn new() -> RedFsm {
        RedFsm::default()
    }

    /// Interns an action table, returning the index of an existing table with the same
    /// content when there is one.
    pub fn intern_table(&mut self, actions: Vec<ActionRef>) -> TableId {
        assert!(!actions.is_empty(), "empty action table");
        match self.tables.iter().position(|t| t.actions == actions) {
            Some(id) => id,
            None => {
                self.tables.push(ActionTable { actions });
                self.tables.len() - 1
            }
        }
    }

    /// Interns a transition, returning the index of an existing transition with the same
    /// destination and table when there is one.
    pub fn intern_trans(&mut self, targ: Option<StateId>, table: Option<TableId>) -> TransId {
        let trans = RedTrans { targ, table };
        match self.trans_set.iter().position(|t| *t == trans) {
            Some(id) => id,
            None => {
                self.trans_set.push(trans);
                self.trans_set.len() - 1
            }
        }
    }

    #[inline]
    pub fn nbr_states(&self) -> usize {
        self.states.len()
    }

    /// Id emitted for final-state comparisons: the first final state, or one past the last
    /// state when the machine has none.
    pub fn first_final_id(&self) -> StateId {
        self.first_final.unwrap_or(self.states.len())
    }
}

impl Display for RedFsm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "machine: {} states, start {}, first final {}", self.states.len(), self.start_state, self.first_final_id())?;
        for st in &self.states {
            write!(f, "  {}:", st.id)?;
            for (key, t) in &st.single {
                write!(f, " '{key}'->{}", TransFmt(&self.trans_set[*t]))?;
            }
            for (low, high, t) in &st.ranges {
                write!(f, " '{low}'..'{high}'->{}", TransFmt(&self.trans_set[*t]))?;
            }
            if let Some(t) = st.default_trans {
                write!(f, " *->{}", TransFmt(&self.trans_set[t]))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

struct TransFmt<'a>(&'a RedTrans);

impl Display for TransFmt<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0.targ {
            Some(s) => write!(f, "{s}")?,
            None => write!(f, "err")?,
        }
        if let Some(t) = self.0.table {
            write!(f, "/t{t}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------------------------
// Input bundle

/// Everything the back ends need, handed over by the upstream construction passes and
/// immutable from then on.
#[derive(Clone, Debug)]
pub struct ParseData {
    pub fsm_name: String,
    /// Original source file, referenced by line directives.
    pub file_name: String,
    /// The machine before reduction, read by the Graphviz back end only.
    pub graph: Fsm,
    /// The reduced machine, read by analysis and code generation.
    pub red: RedFsm,
    /// Action arena; an [ActionRef] indexes this list.
    pub actions: Vec<Action>,
    pub cond_spaces: Vec<CondSpace>,
    pub key_ops: KeyOps,
    /// Largest key after condition widening; beyond `key_ops.max_key` the key tables need
    /// a wider host type.
    pub max_key: Key,
    /// User expression prefixed to every machine variable.
    pub access_expr: Option<InlineList>,
    /// User expression reading the current state, replacing the `cs` variable.
    pub cur_state_expr: Option<InlineList>,
    /// User expression reading the current symbol, replacing the input dereference.
    pub get_key_expr: Option<InlineList>,
    pub has_longest_match: bool,
    /// Prefix every generated identifier with `<fsm_name>_`.
    pub data_prefix: bool,
    /// Emit the full driver (init and execute routines), not only the data tables.
    pub want_complete: bool,
    /// Render printable keys as glyphs in the Graphviz output.
    pub display_printables: bool,
}

impl ParseData {
    pub fn new<T: Into<String>>(fsm_name: T, file_name: T) -> ParseData {
        let key_ops = KeyOps::char_alphabet();
        let max_key = key_ops.max_key;
        ParseData {
            fsm_name: fsm_name.into(),
            file_name: file_name.into(),
            graph: Fsm::new(),
            red: RedFsm::new(),
            actions: Vec::new(),
            cond_spaces: Vec::new(),
            key_ops,
            max_key,
            access_expr: None,
            cur_state_expr: None,
            get_key_expr: None,
            has_longest_match: false,
            data_prefix: true,
            want_complete: true,
            display_printables: false,
        }
    }
}
