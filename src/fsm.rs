// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

use crate::{ActionRef, CondSpaceId, StateId};
use crate::keyops::Key;

// ---------------------------------------------------------------------------------------------
// Unreduced machine
//
// This is the machine as constructed, before determinization collapses shared transitions
// and interns the action tables. Only the Graphviz back end reads it; the code back end
// works on the reduced form.

/// One specialization of a keyed transition. Without conditions a transition has a single
/// specialization; with a condition space attached, one per combination of condition bits.
#[derive(Clone, Debug, Default)]
pub struct CondTrans {
    /// Condition-bit combination selecting this specialization (bit `i` set = condition `i`
    /// holds). Zero when the owning transition has no condition space.
    pub cond_vals: i64,
    /// Destination, or `None` when the key leads to the implicit error state.
    pub to: Option<StateId>,
    /// Actions executed when the transition is taken, in execution order.
    pub actions: Vec<ActionRef>,
}

/// An outgoing transition over the closed key interval `[low, high]`.
#[derive(Clone, Debug)]
pub struct FsmTrans {
    pub low: Key,
    pub high: Key,
    pub cond_space: Option<CondSpaceId>,
    pub conds: Vec<CondTrans>,
}

#[derive(Clone, Debug, Default)]
pub struct FsmState {
    /// State number, also the node name in the Graphviz output.
    pub num: StateId,
    pub is_final: bool,
    pub out: Vec<FsmTrans>,
    /// Actions run when any transition leaves this state.
    pub from_actions: Vec<ActionRef>,
    /// Actions run when any transition enters this state.
    pub to_actions: Vec<ActionRef>,
    /// Actions run when the input ends in this state.
    pub eof_actions: Vec<ActionRef>,
}

impl FsmState {
    pub fn new(num: StateId) -> FsmState {
        FsmState { num, ..FsmState::default() }
    }

    /// A state needs an error pseudo-node when some key of some specialization has no
    /// destination.
    pub fn has_error_trans(&self) -> bool {
        self.out.iter().any(|t| t.conds.iter().any(|ct| ct.to.is_none()))
    }
}

#[derive(Clone, Debug, Default)]
pub struct Fsm {
    pub states: Vec<FsmState>,
    pub start_state: Option<StateId>,
    /// Named entry points, in declaration order. The name is already flattened (scopes
    /// joined with `_`).
    pub entry_points: Vec<(String, StateId)>,
}

impl Fsm {
    pub fn new() -> Fsm {
        Fsm::default()
    }
}
