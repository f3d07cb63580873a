//! sandbox-playground: execution sessions for sandboxed code playgrounds
//!
//! Runs user programs in an isolated interpreter process, streams their
//! output back as events, and lets the running program block on a line of
//! input supplied by the controller without ever blocking the controller.
//!
//! # Modules
//!
//! - **bridge**: Blocking input rendezvous between sandbox and controller
//! - **execution**: Sandbox backends, the Python kernel and its protocol
//! - **storage**: Virtual file sets and sandbox workspaces
//! - **controller**: Session lifecycle, run/stop/restart and event dispatch
//!
//! # Example
//!
//! ```ignore
//! use sandbox_playground::{FileSet, OutputEvent, RunRequest, SessionBuilder, SessionUpdate};
//! use sandbox_playground::observer_channel;
//!
//! let (observer, updates) = observer_channel();
//! let session = SessionBuilder::new("demo").observer(observer).build()?;
//! session.start()?;
//!
//! let files: FileSet = [("main.py", "name = input('name? ')\nprint('hi', name)\n")]
//!     .into_iter()
//!     .collect();
//! // ... after the Ready event:
//! session.run(&RunRequest::new("main.py", files)?)?;
//!
//! for update in updates {
//!     if let SessionUpdate::Event(event) = update {
//!         if let Some(ticket) = event.input_ticket() {
//!             session.resolve_input(ticket, "Ada")?;
//!         }
//!         if event.is_terminal() {
//!             break;
//!         }
//!     }
//! }
//! ```

// Core modules
pub mod errors;
pub mod utils;

// Layered modules
pub mod bridge;
pub mod execution;
pub mod storage;

// Main controller
pub mod controller;

// Public API
pub use bridge::InputChannel;
pub use controller::{
    ChannelObserver, Session, SessionBuilder, SessionConfig, SessionNotice, SessionObserver,
    SessionState, SessionUpdate, observer_channel,
};
pub use errors::{Result, SandboxError};
pub use execution::{
    InputTicket, KernelConfig, OutputEvent, PythonBackend, RunRequest, SandboxBackend,
    SandboxInstance, SandboxLink, SessionEvent,
};
pub use storage::{FileSet, SourceFile, Workspace};

#[cfg(test)]
mod tests {
    use crate::SessionBuilder;

    #[test]
    fn test_module_imports() {
        // Verify core API is accessible
        let _builder = SessionBuilder::new("test");
    }
}
