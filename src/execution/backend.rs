//! Backend seam: how a session launches and talks to a sandbox

use crate::bridge::InputChannel;
use crate::errors::{Result, SandboxError};
use crate::execution::events::OutputEvent;
use crate::execution::request::RunRequest;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Launches sandbox instances for a session
pub trait SandboxBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Start a sandbox wired to `link`
    ///
    /// Must not wait for the runtime to load; the instance reports readiness
    /// by emitting [`OutputEvent::Ready`] through the link.
    fn launch(&self, link: SandboxLink) -> Result<Box<dyn SandboxInstance>>;
}

/// A live sandbox owned by a session
pub trait SandboxInstance: Send {
    /// Write the request's files into the sandbox and start executing the entry
    fn submit(&mut self, request: &RunRequest) -> Result<()>;

    /// Destroy the sandbox without waiting for the program
    fn terminate(&mut self) -> Result<()>;
}

/// Message from a sandbox to the session dispatcher
#[derive(Debug)]
pub(crate) enum SandboxMessage {
    Output(OutputEvent),
    LoadFailed(String),
    /// The sandbox went away (process exit, closed stream)
    Closed,
}

#[derive(Debug)]
pub(crate) enum Envelope {
    Sandbox {
        generation: u64,
        message: SandboxMessage,
    },
    Shutdown,
}

/// Sandbox-side handle: event stream to the session plus the input channel
#[derive(Clone)]
pub struct SandboxLink {
    generation: u64,
    events: Sender<Envelope>,
    input: Option<Arc<InputChannel>>,
    // Generation the session currently accepts input for (0 while tearing down)
    live: Option<Arc<AtomicU64>>,
}

impl SandboxLink {
    pub(crate) fn new(
        generation: u64,
        events: Sender<Envelope>,
        input: Option<Arc<InputChannel>>,
    ) -> Self {
        Self {
            generation,
            events,
            input,
            live: None,
        }
    }

    pub(crate) fn with_liveness(mut self, live: Arc<AtomicU64>) -> Self {
        self.live = Some(live);
        self
    }

    /// Generation of the sandbox this link belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether blocking reads are available to sandboxed code
    pub fn blocking_input_enabled(&self) -> bool {
        self.input.is_some()
    }

    /// Whether the session still owns this sandbox
    pub fn is_live(&self) -> bool {
        self.live
            .as_ref()
            .map_or(true, |live| live.load(Ordering::SeqCst) == self.generation)
    }

    /// Publish an event; `false` once the session is gone
    pub fn emit(&self, event: OutputEvent) -> bool {
        self.send(SandboxMessage::Output(event))
    }

    /// Report that the runtime could not load
    pub fn fail_load(&self, message: impl Into<String>) -> bool {
        self.send(SandboxMessage::LoadFailed(message.into()))
    }

    /// Report that the sandbox is gone
    pub fn close(&self) -> bool {
        self.send(SandboxMessage::Closed)
    }

    /// The blocking-read primitive: echo `prompt`, then park until answered
    pub fn blocking_read(&self, prompt: &str) -> Result<String> {
        if self.input.is_none() {
            return Err(SandboxError::BlockingInputUnsupported);
        }
        if !prompt.is_empty() {
            self.emit(OutputEvent::Stdout {
                text: prompt.to_string(),
            });
        }
        self.await_input(prompt)
    }

    /// Park until answered, for runtimes that already echoed the prompt
    pub fn await_input(&self, prompt: &str) -> Result<String> {
        let channel = self
            .input
            .as_ref()
            .ok_or(SandboxError::BlockingInputUnsupported)?;

        // A retired sandbox must not arm the channel shared with its successor
        if !self.is_live() {
            return Err(SandboxError::InputInterrupted);
        }
        channel.request(|| {
            self.is_live()
                && self.emit(OutputEvent::InputRequest {
                    prompt: prompt.to_string(),
                })
        })
    }

    fn send(&self, message: SandboxMessage) -> bool {
        self.events
            .send(Envelope::Sandbox {
                generation: self.generation,
                message,
            })
            .is_ok()
    }
}

impl std::fmt::Debug for SandboxLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxLink")
            .field("generation", &self.generation)
            .field("blocking_input", &self.blocking_input_enabled())
            .finish()
    }
}
