// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Code generation back end for reduced finite state machines. The crate consumes a
//! [ParseData](redfsm::ParseData) bundle built by upstream construction passes and produces
//! either a host-language recognizer (tables, init and execute routines) or a Graphviz
//! rendition of the machine before reduction.

pub mod log;
pub mod keyops;
pub mod fsm;
pub mod redfsm;
pub mod analysis;
pub mod codegen;
pub mod dotgen;

mod macros;
mod test_tools;

/// ID of a machine state; states are numbered densely in `[0, nbr_states)`.
pub type StateId = usize;
/// Index of an interned transition in the reduced machine's transition set.
pub type TransId = usize;
/// Index of an interned action table in the reduced machine's table map.
pub type TableId = usize;
/// Index of an action in the [ParseData](redfsm::ParseData) action list.
pub type ActionRef = usize;
/// ID of a condition space.
pub type CondSpaceId = usize;

// package name & version
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

pub trait CollectJoin {
    fn join(&mut self, separator: &str) -> String
        where Self: Iterator,
              <Self as Iterator>::Item: ToString
    {
        self.map(|x| x.to_string()).collect::<Vec<_>>().join(separator)
    }

    fn to_vec(self) -> Vec<<Self as Iterator>::Item>
        where Self: Iterator + Sized
    {
        self.collect::<Vec<_>>()
    }
}

impl<I: Iterator> CollectJoin for I {}
