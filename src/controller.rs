//! Execution session controller

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};

use log::{debug, info, warn};

use crate::bridge::{DEFAULT_INPUT_BUFFER_BYTES, InputChannel, STATUS_CELL_BYTES};
use crate::errors::{Result, SandboxError};
use crate::execution::backend::{Envelope, SandboxMessage};
use crate::execution::process::{KernelConfig, PythonBackend};
use crate::execution::{
    InputTicket, OutputEvent, RunRequest, SandboxBackend, SandboxInstance, SandboxLink,
    SessionEvent,
};
use crate::utils::{self, lock};

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No sandbox has been started yet
    Uninitialized,
    /// A sandbox is starting; runs are rejected until it reports ready
    Loading,
    /// Idle sandbox, accepting one run
    Ready,
    /// A run is in flight
    Running,
    /// The sandbox is being destroyed
    Terminating,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Loading => "loading",
            SessionState::Ready => "ready",
            SessionState::Running => "running",
            SessionState::Terminating => "terminating",
        };
        f.write_str(name)
    }
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Session ID used in logs and thread names
    pub id: String,
    /// Python executable for the default backend
    pub python: PathBuf,
    /// Parent directory for sandbox workspaces
    pub workspace_root: Option<PathBuf>,
    /// Input buffer size in bytes, status cell included
    pub input_buffer_size: usize,
    /// Make blocking reads available to sandboxed code
    pub blocking_input: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            python: utils::default_python(),
            workspace_root: None,
            input_buffer_size: DEFAULT_INPUT_BUFFER_BYTES,
            blocking_input: true,
        }
    }
}

impl SessionConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(SandboxError::InvalidConfig(
                "Session ID cannot be empty".to_string(),
            ));
        }

        if self.python.as_os_str().is_empty() {
            return Err(SandboxError::InvalidConfig(
                "Python executable cannot be empty".to_string(),
            ));
        }

        if self.input_buffer_size <= STATUS_CELL_BYTES {
            return Err(SandboxError::InvalidConfig(format!(
                "Input buffer must be larger than the {}-byte status cell",
                STATUS_CELL_BYTES
            )));
        }

        Ok(())
    }
}

/// Out-of-band notifications about the sandbox itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// `stop()` destroyed the sandbox of this generation
    Stopped { generation: u64 },
    /// The sandbox runtime could not load; the session stays loading
    LoadFailed { message: String },
}

/// Receives everything a session reports
///
/// Events arrive on the session's dispatcher thread, one at a time, in the
/// order the sandbox emitted them. `Stopped` is delivered on the thread that
/// called [`Session::stop`].
pub trait SessionObserver: Send + Sync {
    fn on_event(&self, event: SessionEvent);

    fn on_notice(&self, notice: SessionNotice) {
        debug!("Unhandled session notice: {:?}", notice);
    }
}

impl<F> SessionObserver for F
where
    F: Fn(SessionEvent) + Send + Sync,
{
    fn on_event(&self, event: SessionEvent) {
        self(event)
    }
}

/// Either half of what an observer receives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Event(SessionEvent),
    Notice(SessionNotice),
}

/// Observer forwarding every update into an mpsc channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: Sender<SessionUpdate>,
}

impl SessionObserver for ChannelObserver {
    fn on_event(&self, event: SessionEvent) {
        let _ = self.sender.send(SessionUpdate::Event(event));
    }

    fn on_notice(&self, notice: SessionNotice) {
        let _ = self.sender.send(SessionUpdate::Notice(notice));
    }
}

/// Observer plus the receiving end of its channel
pub fn observer_channel() -> (ChannelObserver, Receiver<SessionUpdate>) {
    let (sender, receiver) = mpsc::channel();
    (ChannelObserver { sender }, receiver)
}

struct LogObserver;

impl SessionObserver for LogObserver {
    fn on_event(&self, event: SessionEvent) {
        debug!("Session event (generation {}): {:?}", event.generation, event.event);
    }

    fn on_notice(&self, notice: SessionNotice) {
        info!("Session notice: {:?}", notice);
    }
}

/// Builder pattern for session creation
pub struct SessionBuilder {
    config: SessionConfig,
    backend: Option<Box<dyn SandboxBackend>>,
    observer: Option<Arc<dyn SessionObserver>>,
}

impl SessionBuilder {
    /// Create new builder
    pub fn new(id: &str) -> Self {
        Self {
            config: SessionConfig {
                id: id.to_string(),
                ..Default::default()
            },
            backend: None,
            observer: None,
        }
    }

    /// Set Python executable
    pub fn python(mut self, path: impl AsRef<Path>) -> Self {
        self.config.python = path.as_ref().to_path_buf();
        self
    }

    /// Set parent directory for workspaces
    pub fn workspace_root(mut self, path: impl AsRef<Path>) -> Self {
        self.config.workspace_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set input buffer size in bytes (status cell included)
    pub fn input_buffer_size(mut self, bytes: usize) -> Self {
        self.config.input_buffer_size = bytes;
        self
    }

    /// Enable or disable blocking reads
    pub fn blocking_input(mut self, enabled: bool) -> Self {
        self.config.blocking_input = enabled;
        self
    }

    /// Use a custom sandbox backend instead of the Python kernel
    pub fn backend(mut self, backend: impl SandboxBackend + 'static) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    /// Set the observer
    pub fn observer(mut self, observer: impl SessionObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Build session (not started)
    pub fn build(self) -> Result<Session> {
        self.config.validate()?;

        let backend = self.backend.unwrap_or_else(|| {
            Box::new(PythonBackend::new(KernelConfig {
                python: self.config.python.clone(),
                workspace_root: self.config.workspace_root.clone(),
                env: Vec::new(),
            }))
        });
        let observer = self.observer.unwrap_or_else(|| Arc::new(LogObserver));

        Session::new(self.config, backend, observer)
    }
}

/// A sandbox instance; locked on its own so submits run outside the core lock
type SharedInstance = Arc<Mutex<Box<dyn SandboxInstance>>>;

struct Core {
    state: SessionState,
    generation: u64,
    instance: Option<SharedInstance>,
    // The current generation already reported a load failure
    load_failed: bool,
}

struct SessionInner {
    config: SessionConfig,
    backend: Box<dyn SandboxBackend>,
    observer: Arc<dyn SessionObserver>,
    input: Option<Arc<InputChannel>>,
    events: Sender<Envelope>,
    core: Mutex<Core>,
    // Held by the dispatcher for the duration of each observer call
    gate: Mutex<()>,
    live: Arc<AtomicU64>,
    dispatcher_thread: OnceLock<ThreadId>,
}

/// What the dispatcher does with one sandbox message
enum Delivery {
    Event(SessionEvent),
    Notice(SessionNotice),
    Drop,
}

impl SessionInner {
    fn on_dispatcher_thread(&self) -> bool {
        self.dispatcher_thread.get() == Some(&thread::current().id())
    }

    /// Launch a fresh sandbox generation; caller holds the core lock
    fn launch(&self, core: &mut Core) -> Result<()> {
        core.generation += 1;
        core.state = SessionState::Loading;
        core.load_failed = false;
        let generation = core.generation;
        self.live.store(generation, Ordering::SeqCst);

        let link = SandboxLink::new(generation, self.events.clone(), self.input.clone())
            .with_liveness(self.live.clone());

        info!(
            "Session {} loading {} sandbox (generation {})",
            self.config.id,
            self.backend.name(),
            generation
        );

        match self.backend.launch(link) {
            Ok(instance) => {
                core.instance = Some(Arc::new(Mutex::new(instance)));
                Ok(())
            }
            Err(e) => {
                warn!("Session {} failed to launch sandbox: {}", self.config.id, e);
                let message = match &e {
                    SandboxError::LoadFailed(message) => message.clone(),
                    other => other.to_string(),
                };
                let _ = self.events.send(Envelope::Sandbox {
                    generation,
                    message: SandboxMessage::LoadFailed(message.clone()),
                });
                Err(SandboxError::LoadFailed(message))
            }
        }
    }

    /// Retire the current sandbox; caller holds the core lock
    fn retire(&self, core: &mut Core) -> Option<SharedInstance> {
        core.state = SessionState::Terminating;
        self.live.store(0, Ordering::SeqCst);
        if let Some(input) = &self.input {
            input.interrupt();
        }
        core.instance.take()
    }

    /// Waits for an in-flight submit to the same instance
    fn destroy(&self, instance: Option<SharedInstance>) {
        if let Some(instance) = instance {
            if let Err(e) = lock(&instance).terminate() {
                warn!("Session {} failed to destroy sandbox: {}", self.config.id, e);
            }
        }
    }

    /// Apply one sandbox message to the state machine
    fn apply(&self, generation: u64, message: SandboxMessage) -> Delivery {
        let mut core = lock(&self.core);

        if generation != core.generation || core.state == SessionState::Terminating {
            debug!(
                "Dropping message from generation {} (current {}, {}): {:?}",
                generation, core.generation, core.state, message
            );
            return Delivery::Drop;
        }

        match message {
            SandboxMessage::Output(event) => self.apply_event(&mut core, event),
            SandboxMessage::LoadFailed(message) => {
                if core.state != SessionState::Loading || core.load_failed {
                    warn!(
                        "Session {} sandbox reported a failure while {}: {}",
                        self.config.id, core.state, message
                    );
                    return Delivery::Drop;
                }
                core.load_failed = true;
                warn!("Session {} failed to load: {}", self.config.id, message);
                Delivery::Notice(SessionNotice::LoadFailed { message })
            }
            SandboxMessage::Closed => self.apply_closed(&mut core),
        }
    }

    fn apply_event(&self, core: &mut Core, event: OutputEvent) -> Delivery {
        let accepted = match (&event, core.state) {
            (OutputEvent::Ready, SessionState::Loading) => {
                core.state = SessionState::Ready;
                info!(
                    "Session {} ready (generation {})",
                    self.config.id, core.generation
                );
                true
            }
            (OutputEvent::Stdout { .. }, SessionState::Loading | SessionState::Running) => true,
            (OutputEvent::InputRequest { .. }, SessionState::Running) => true,
            (OutputEvent::Result { .. } | OutputEvent::Error { .. }, SessionState::Running) => {
                // Runnable again before the observer sees the terminal event
                core.state = SessionState::Ready;
                true
            }
            _ => false,
        };

        if !accepted {
            debug!("Dropping {:?} while {}", event, core.state);
            if matches!(event, OutputEvent::InputRequest { .. }) {
                // Nobody will answer it; release the parked reader
                if let Some(input) = &self.input {
                    input.decline();
                }
            }
            return Delivery::Drop;
        }

        Delivery::Event(SessionEvent {
            generation: core.generation,
            event,
        })
    }

    fn apply_closed(&self, core: &mut Core) -> Delivery {
        let previous = core.state;
        let instance = core.instance.take();
        self.destroy(instance);

        match previous {
            SessionState::Loading => {
                if core.load_failed {
                    return Delivery::Drop;
                }
                core.load_failed = true;
                Delivery::Notice(SessionNotice::LoadFailed {
                    message: "sandbox exited while loading".to_string(),
                })
            }
            SessionState::Running | SessionState::Ready => {
                warn!(
                    "Session {} sandbox exited unexpectedly while {}",
                    self.config.id, previous
                );
                let crashed = core.generation;
                if let Err(e) = self.launch(core) {
                    warn!("Session {} relaunch failed: {}", self.config.id, e);
                }
                if previous == SessionState::Running {
                    Delivery::Event(SessionEvent {
                        generation: crashed,
                        event: OutputEvent::Error {
                            message: "sandbox exited unexpectedly".to_string(),
                            line: None,
                        },
                    })
                } else {
                    Delivery::Drop
                }
            }
            SessionState::Uninitialized | SessionState::Terminating => Delivery::Drop,
        }
    }
}

fn dispatch(inner: Arc<SessionInner>, receiver: Receiver<Envelope>) {
    while let Ok(envelope) = receiver.recv() {
        let (generation, message) = match envelope {
            Envelope::Shutdown => break,
            Envelope::Sandbox {
                generation,
                message,
            } => (generation, message),
        };

        let _gate = lock(&inner.gate);
        match inner.apply(generation, message) {
            Delivery::Event(event) => inner.observer.on_event(event),
            Delivery::Notice(notice) => inner.observer.on_notice(notice),
            Delivery::Drop => {}
        }
    }
    debug!("Session {} dispatcher exiting", inner.config.id);
}

/// An execution session: owns one sandbox at a time and routes its events
pub struct Session {
    inner: Arc<SessionInner>,
    dispatcher: Option<JoinHandle<()>>,
}

impl Session {
    /// Create a session with an explicit backend and observer
    pub fn new(
        config: SessionConfig,
        backend: Box<dyn SandboxBackend>,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self> {
        config.validate()?;

        let input = if config.blocking_input {
            Some(Arc::new(InputChannel::with_buffer_size(
                config.input_buffer_size,
            )?))
        } else {
            info!("Session {}: blocking input disabled", config.id);
            None
        };

        let (events, receiver) = mpsc::channel();
        let inner = Arc::new(SessionInner {
            config,
            backend,
            observer,
            input,
            events,
            core: Mutex::new(Core {
                state: SessionState::Uninitialized,
                generation: 0,
                instance: None,
                load_failed: false,
            }),
            gate: Mutex::new(()),
            live: Arc::new(AtomicU64::new(0)),
            dispatcher_thread: OnceLock::new(),
        });

        let dispatcher = {
            let inner = inner.clone();
            thread::Builder::new()
                .name(format!("session-{}", inner.config.id))
                .spawn(move || dispatch(inner, receiver))?
        };
        let _ = inner.dispatcher_thread.set(dispatcher.thread().id());

        Ok(Self {
            inner,
            dispatcher: Some(dispatcher),
        })
    }

    /// Get session ID
    pub fn id(&self) -> &str {
        &self.inner.config.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        lock(&self.inner.core).state
    }

    /// Generation of the current (or last) sandbox; 0 before the first start
    pub fn generation(&self) -> u64 {
        lock(&self.inner.core).generation
    }

    /// Whether sandboxed code may use blocking reads
    pub fn blocking_input_enabled(&self) -> bool {
        self.inner.input.is_some()
    }

    /// Launch the sandbox; readiness arrives later as an `OutputEvent::Ready`
    pub fn start(&self) -> Result<()> {
        let mut core = lock(&self.inner.core);
        match core.state {
            SessionState::Uninitialized | SessionState::Terminating => {}
            state => return Err(SandboxError::AlreadyStarted(state)),
        }
        self.inner.launch(&mut core)
    }

    /// Submit a run; fails without side effects unless the session is ready
    pub fn run(&self, request: &RunRequest) -> Result<()> {
        let (generation, instance) = {
            let mut core = lock(&self.inner.core);
            if core.state != SessionState::Ready {
                return Err(SandboxError::NotReady(core.state));
            }
            request.validate()?;

            let instance = core
                .instance
                .clone()
                .ok_or(SandboxError::NotReady(core.state))?;
            core.state = SessionState::Running;
            (core.generation, instance)
        };

        // Materializing files can be slow; the dispatcher keeps delivering meanwhile
        let submitted = lock(&instance).submit(request);

        if let Err(e) = submitted {
            warn!(
                "Session {} failed to submit {}: {}",
                self.inner.config.id,
                request.entry_path(),
                e
            );
            let mut core = lock(&self.inner.core);
            if core.generation == generation && core.state == SessionState::Running {
                core.state = SessionState::Ready;
            }
            return Err(e);
        }

        info!(
            "Session {} running {} (generation {})",
            self.inner.config.id,
            request.entry_path(),
            generation
        );
        Ok(())
    }

    /// Destroy the sandbox and start a fresh one
    ///
    /// Emits [`SessionNotice::Stopped`] before the new sandbox is launched.
    /// From any thread but the dispatcher this waits for an in-flight observer
    /// call to return, so nothing from the old sandbox is observed afterwards.
    pub fn stop(&self) -> Result<()> {
        let gate = if self.inner.on_dispatcher_thread() {
            None
        } else {
            Some(lock(&self.inner.gate))
        };

        let (retired, instance) = {
            let mut core = lock(&self.inner.core);
            if core.state == SessionState::Uninitialized {
                drop(core);
                drop(gate);
                return self.start();
            }
            let retired = core.generation;
            (retired, self.inner.retire(&mut core))
        };

        self.inner.destroy(instance);
        drop(gate);

        info!(
            "Session {} stopped sandbox generation {}",
            self.inner.config.id, retired
        );
        self.inner
            .observer
            .on_notice(SessionNotice::Stopped { generation: retired });

        let mut core = lock(&self.inner.core);
        if core.state != SessionState::Terminating {
            // A concurrent stop already relaunched
            return Ok(());
        }
        self.inner.launch(&mut core)
    }

    /// Answer the input request identified by `ticket`
    ///
    /// Returns the number of bytes delivered; longer values are truncated to
    /// the channel capacity.
    pub fn resolve_input(&self, ticket: InputTicket, value: &str) -> Result<usize> {
        let core = lock(&self.inner.core);
        if ticket.generation() != core.generation {
            return Err(SandboxError::StaleInput {
                ticket: ticket.generation(),
                current: core.generation,
            });
        }
        let input = self
            .inner
            .input
            .as_ref()
            .ok_or(SandboxError::BlockingInputUnsupported)?;
        input.resolve(value)
    }

    /// Data capacity of the input channel in bytes
    pub fn input_capacity(&self) -> Option<usize> {
        self.inner.input.as_ref().map(|input| input.capacity())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let instance = {
            let mut core = lock(&self.inner.core);
            self.inner.retire(&mut core)
        };
        self.inner.destroy(instance);

        let _ = self.inner.events.send(Envelope::Shutdown);
        if let Some(handle) = self.dispatcher.take() {
            if !self.inner.on_dispatcher_thread() {
                let _ = handle.join();
            }
        }
        debug!("Session {} dropped", self.inner.config.id);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.config.id)
            .field("state", &self.state())
            .field("generation", &self.generation())
            .finish()
    }
}
