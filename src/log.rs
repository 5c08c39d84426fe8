// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

use std::fmt::{Debug, Display, Formatter};

/// Common log functionalities for a message consumer/status verifier
pub trait LogStatus: Debug {
    fn num_notes(&self) -> usize;
    fn num_warnings(&self) -> usize;
    fn num_errors(&self) -> usize;
    #[inline]
    fn has_no_errors(&self) -> bool {
        self.num_errors() == 0
    }

    fn get_messages(&self) -> impl Iterator<Item = &LogMsg>;

    fn get_messages_str(&self) -> String {
        self.get_messages().map(|m| format!("- {m}")).collect::<Vec<_>>().join("\n")
    }

    fn get_errors(&self) -> impl Iterator<Item = &String> {
        self.get_messages().filter_map(|m| if let LogMsg::Error(s) = m { Some(s) } else { None })
    }
}

/// Common log functionalities for a message producer
pub trait Logger: Debug {
    fn add_note<T: Into<String>>(&mut self, msg: T);
    fn add_warning<T: Into<String>>(&mut self, msg: T);
    fn add_error<T: Into<String>>(&mut self, msg: T);
}

// ---------------------------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub enum LogMsg { Note(String), Warning(String), Error(String) }

impl Display for LogMsg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogMsg::Note(s) => write!(f, "Note: {s}"),
            LogMsg::Warning(s) => write!(f, "Warning: {s}"),
            LogMsg::Error(s) => write!(f, "ERROR: {s}"),
        }
    }
}

/// Log system that stores the messages
#[derive(Clone, Debug, Default)]
pub struct BufLog {
    messages: Vec<LogMsg>,
    num_notes: usize,
    num_warnings: usize,
    num_errors: usize
}

impl BufLog {
    pub fn new() -> Self {
        BufLog { messages: Vec::new(), num_notes: 0, num_warnings: 0, num_errors: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Extends the messages with another log's messages.
    pub fn extend(&mut self, other: BufLog) {
        self.num_notes += other.num_notes;
        self.num_warnings += other.num_warnings;
        self.num_errors += other.num_errors;
        self.messages.extend(other.messages)
    }
}

impl LogStatus for BufLog {
    fn num_notes(&self) -> usize {
        self.num_notes
    }

    fn num_warnings(&self) -> usize {
        self.num_warnings
    }

    fn num_errors(&self) -> usize {
        self.num_errors
    }

    fn get_messages(&self) -> impl Iterator<Item = &LogMsg> {
        self.messages.iter()
    }
}

impl Logger for BufLog {
    fn add_note<T: Into<String>>(&mut self, msg: T) {
        self.messages.push(LogMsg::Note(msg.into()));
        self.num_notes += 1;
    }

    fn add_warning<T: Into<String>>(&mut self, msg: T) {
        self.messages.push(LogMsg::Warning(msg.into()));
        self.num_warnings += 1;
    }

    fn add_error<T: Into<String>>(&mut self, msg: T) {
        self.messages.push(LogMsg::Error(msg.into()));
        self.num_errors += 1;
    }
}

// ---------------------------------------------------------------------------------------------
// blanket implementation: LogReader -> LogStatus

pub trait LogReader {
    type Item: LogStatus;

    fn get_log(&self) -> &Self::Item;

    fn give_log(self) -> Self::Item;
}

impl<T: LogReader + Debug> LogStatus for T {
    fn num_notes(&self) -> usize {
        self.get_log().num_notes()
    }

    fn num_warnings(&self) -> usize {
        self.get_log().num_warnings()
    }

    fn num_errors(&self) -> usize {
        self.get_log().num_errors()
    }

    fn get_messages(&self) -> impl Iterator<Item = &LogMsg> {
        self.get_log().get_messages()
    }
}

// ---------------------------------------------------------------------------------------------
// Local from/into and try_from/try_into
// - we have to redefine our own From/Into traits because the standard lib has a blanket
//   implementation that automatically generates TryFrom from From, which is always Ok...
// - we have to redefine our own TryFrom/TryInto traits, since it's otherwise not allowed to
//   implement a foreign trait on anything else than a local type (a local trait isn't enough)

pub trait BuildFrom<S>: Sized {
    /// Converts to this type from the input type.
    #[must_use]
    fn build_from(source: S) -> Self;
}

pub trait BuildInto<T>: Sized {
    /// Converts this type into the (usually inferred) input type.
    #[must_use]
    fn build_into(self) -> T;
}

impl<S, T> BuildInto<T> for S
where
    T: BuildFrom<S>,
{
    #[inline]
    fn build_into(self) -> T { T::build_from(self) }
}

// ---------------------------------------------------------------------------------------------

pub trait TryBuildFrom<T>: Sized {
    /// The type returned in the event of a conversion error.
    type Error;

    /// Performs the conversion.
    fn try_build_from(target: T) -> Result<Self, Self::Error>;
}

pub trait TryBuildInto<T>: Sized {
    /// The type returned in the event of a conversion error.
    type Error;

    /// Performs the conversion.
    fn try_build_into(self) -> Result<T, Self::Error>;
}

impl<S, T> TryBuildInto<T> for S
where
    T: TryBuildFrom<S>,
{
    type Error = T::Error;

    #[inline]
    fn try_build_into(self) -> Result<T, T::Error> { T::try_build_from(self) }
}

impl<S, T> TryBuildFrom<S> for T
where
    S: LogReader + Debug,
    T: LogReader<Item = S::Item> + BuildFrom<S> + Debug,
{
    type Error = S::Item;

    fn try_build_from(source: S) -> Result<Self, Self::Error> {
        if source.get_log().has_no_errors() {
            let dest = T::build_from(source);
            if dest.get_log().has_no_errors() {
                Ok(dest)
            } else {
                Err(dest.give_log())
            }
        } else {
            Err(source.give_log())
        }
    }
}

// ---------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Stage {
        log: BufLog,
    }

    impl Stage {
        fn new(error: Option<&str>) -> Stage {
            let mut log = BufLog::new();
            if let Some(msg) = error {
                log.add_error(msg);
            }
            Stage { log }
        }
    }

    impl LogReader for Stage {
        type Item = BufLog;
        fn get_log(&self) -> &BufLog { &self.log }
        fn give_log(self) -> BufLog { self.log }
    }

    #[derive(Debug)]
    struct Next {
        log: BufLog,
    }

    impl LogReader for Next {
        type Item = BufLog;
        fn get_log(&self) -> &BufLog { &self.log }
        fn give_log(self) -> BufLog { self.log }
    }

    impl BuildFrom<Stage> for Next {
        fn build_from(source: Stage) -> Next {
            Next { log: source.give_log() }
        }
    }

    #[test]
    fn buf_log_counts() {
        let mut log = BufLog::new();
        assert!(log.is_empty() && log.has_no_errors());
        log.add_note("n");
        log.add_warning("w1");
        log.add_warning("w2");
        log.add_error("e");
        assert_eq!((log.num_notes(), log.num_warnings(), log.num_errors()), (1, 2, 1));
        assert_eq!(log.get_errors().collect::<Vec<_>>(), vec!["e"]);
        let mut other = BufLog::new();
        other.add_error("e2");
        log.extend(other);
        assert_eq!(log.num_errors(), 2);
        assert!(log.get_messages_str().contains("ERROR: e2"));
    }

    #[test]
    fn try_build_gates_on_errors() {
        // a clean source converts
        let stage = Stage::new(None);
        let next: Result<Next, BufLog> = stage.try_build_into();
        assert!(next.is_ok());

        // a source with errors hands its log over instead
        let stage = Stage::new(Some("bad input"));
        let next: Result<Next, BufLog> = stage.try_build_into();
        let log = next.expect_err("errors must block the conversion");
        assert_eq!(log.num_errors(), 1);
        assert!(log.get_messages_str().contains("bad input"));
    }
}
