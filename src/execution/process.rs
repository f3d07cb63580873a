//! Interpreter kernel process management

use crate::errors::{Result, SandboxError};
use crate::execution::backend::{SandboxBackend, SandboxInstance, SandboxLink};
use crate::execution::protocol::HostCommand;
use crate::execution::request::RunRequest;
use crate::execution::stream;
use crate::storage::Workspace;
use crate::utils;
use log::{debug, info, warn};
use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use std::fs;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Python source of the kernel run inside every sandbox
pub const KERNEL_SOURCE: &str = include_str!("kernel.py");

const KERNEL_FILE_NAME: &str = "playground_kernel.py";

/// Kernel process configuration
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Python executable
    pub python: PathBuf,
    /// Parent directory for per-sandbox workspaces (system temp dir if unset)
    pub workspace_root: Option<PathBuf>,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            python: utils::default_python(),
            workspace_root: None,
            env: Vec::new(),
        }
    }
}

/// Backend running each sandbox as a Python kernel process
#[derive(Debug, Clone, Default)]
pub struct PythonBackend {
    config: KernelConfig,
}

impl PythonBackend {
    pub fn new(config: KernelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }
}

impl SandboxBackend for PythonBackend {
    fn name(&self) -> &str {
        "python"
    }

    fn launch(&self, link: SandboxLink) -> Result<Box<dyn SandboxInstance>> {
        Ok(Box::new(KernelProcess::spawn(&self.config, link)?))
    }
}

/// A running kernel: child process, its workspace and protocol pipes
pub struct KernelProcess {
    child: Child,
    pid: Pid,
    stdin: Arc<Mutex<ChildStdin>>,
    workspace: Workspace,
    _script_dir: TempDir,
    terminated: bool,
}

impl KernelProcess {
    /// Spawn a kernel and start its reader threads
    ///
    /// Returns as soon as the process is running; readiness arrives later
    /// through the link.
    pub fn spawn(config: &KernelConfig, link: SandboxLink) -> Result<Self> {
        let script_dir = tempfile::Builder::new()
            .prefix("playground-kernel-")
            .tempdir()?;
        let script = script_dir.path().join(KERNEL_FILE_NAME);
        fs::write(&script, KERNEL_SOURCE)?;

        let workspace = Workspace::temporary(config.workspace_root.as_deref())?;

        let mut command = Command::new(&config.python);
        command
            .arg("-u")
            .arg(&script)
            .current_dir(workspace.root())
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .envs(config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Own process group so teardown reaches anything the program spawns
            .process_group(0);

        let mut child = command.spawn().map_err(|e| {
            SandboxError::LoadFailed(format!(
                "failed to start {}: {}",
                config.python.display(),
                e
            ))
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdin = child.stdin.take();
        let pid = Pid::from_raw(child.id() as i32);

        let (Some(stdout), Some(stderr), Some(stdin)) = (stdout, stderr, stdin) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SandboxError::LoadFailed(
                "kernel pipes unavailable".to_string(),
            ));
        };

        // From here on, Drop tears the process down on any error
        let process = Self {
            child,
            pid,
            stdin: Arc::new(Mutex::new(stdin)),
            workspace,
            _script_dir: script_dir,
            terminated: false,
        };

        let generation = link.generation();
        stream::write_command(
            &process.stdin,
            &HostCommand::Init {
                blocking_input: link.blocking_input_enabled(),
            },
        )?;
        stream::spawn_stderr_logger(stderr, generation)?;
        stream::spawn_kernel_reader(stdout, process.stdin.clone(), link)?;

        info!(
            "Kernel {} started for generation {} in {}",
            pid,
            generation,
            process.workspace.root().display()
        );
        Ok(process)
    }

    /// Kernel process id (also its process group id)
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Root of the kernel's virtual filesystem
    pub fn workspace_root(&self) -> &Path {
        self.workspace.root()
    }
}

impl SandboxInstance for KernelProcess {
    fn submit(&mut self, request: &RunRequest) -> Result<()> {
        let files = self.workspace.materialize(request.files())?;

        // The editor buffer may be newer than the snapshot
        let entry = request.entry_path();
        let snapshot_differs = request
            .files()
            .get(entry)
            .map_or(true, |file| file.content != request.entry_content());
        if snapshot_differs {
            self.workspace.write_file(entry, request.entry_content())?;
        }

        debug!(
            "Submitting {} ({} file(s)) to kernel {}",
            entry,
            files.len(),
            self.pid
        );
        stream::write_command(
            &self.stdin,
            &HostCommand::Run {
                entry: entry.to_string(),
                code: request.entry_content().to_string(),
                files,
            },
        )
    }

    fn terminate(&mut self) -> Result<()> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;

        match killpg(self.pid, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => {
                warn!("Failed to kill kernel group {}: {}", self.pid, e);
                // Fall back to the leader alone
                self.child.kill().map_err(|_| {
                    SandboxError::Syscall(format!("killpg {} failed: {}", self.pid, e))
                })?;
            }
        }

        let status = self.child.wait()?;
        debug!("Kernel {} exited: {}", self.pid, status);
        Ok(())
    }
}

impl Drop for KernelProcess {
    fn drop(&mut self) {
        let _ = self.terminate();
    }
}
