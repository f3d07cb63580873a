//! Execution layer: sandbox backends, kernel processes and their event streams
//!
//! A session launches one sandbox per generation through a [`SandboxBackend`].
//! The bundled [`PythonBackend`] runs an interpreter kernel as a child process
//! in its own process group and speaks a JSON-lines protocol with it.
//!
//! # Features
//!
//! - **Backend seam**: launch/submit/terminate behind two traits
//! - **Kernel process**: Python child with its own workspace and process group
//! - **Protocol**: JSON lines, host commands in, kernel messages out
//! - **Reader thread**: turns kernel output into events and serves input requests
//!
//! # Examples
//!
//! ```ignore
//! use sandbox_playground::execution::{KernelConfig, PythonBackend};
//!
//! let backend = PythonBackend::new(KernelConfig {
//!     python: "/usr/bin/python3".into(),
//!     ..Default::default()
//! });
//! ```

pub mod backend;
pub mod events;
pub mod process;
pub mod protocol;
pub mod request;
pub mod stream;
pub use backend::{SandboxBackend, SandboxInstance, SandboxLink};
pub use events::{InputTicket, OutputEvent, SessionEvent};
pub use process::{KERNEL_SOURCE, KernelConfig, KernelProcess, PythonBackend};
pub use protocol::{HostCommand, KernelMessage};
pub use request::RunRequest;
pub use stream::STDERR_MARKER;
