//! Events flowing from a sandbox to the session observer

use serde::{Deserialize, Serialize};

/// One event emitted by the sandbox
///
/// Within a run the order is FIFO; `Result` or `Error` is always last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputEvent {
    /// The interpreter finished loading
    Ready,
    /// Text written by the program
    Stdout { text: String },
    /// The run completed; `value` is the repr of a trailing expression
    Result { value: Option<String> },
    /// The run raised
    Error {
        message: String,
        /// Best-effort 1-based source line
        line: Option<u32>,
    },
    /// The program is parked on a blocking read
    InputRequest { prompt: String },
}

impl OutputEvent {
    /// `Result` and `Error` end a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, OutputEvent::Result { .. } | OutputEvent::Error { .. })
    }
}

/// Handle for answering an input request
///
/// Tagged with the generation of the sandbox that asked, so an answer meant
/// for a torn-down sandbox is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputTicket {
    generation: u64,
}

impl InputTicket {
    pub(crate) fn new(generation: u64) -> Self {
        Self { generation }
    }

    /// Generation the request arrived under
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// An [`OutputEvent`] stamped with the sandbox generation that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub generation: u64,
    pub event: OutputEvent,
}

impl SessionEvent {
    pub fn is_terminal(&self) -> bool {
        self.event.is_terminal()
    }

    /// Ticket for answering this event, if it is an input request
    pub fn input_ticket(&self) -> Option<InputTicket> {
        match self.event {
            OutputEvent::InputRequest { .. } => Some(InputTicket::new(self.generation)),
            _ => None,
        }
    }
}
