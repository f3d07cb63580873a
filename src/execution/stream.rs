//! Stream handling for kernel output

use crate::errors::{Result, SandboxError};
use crate::execution::backend::SandboxLink;
use crate::execution::events::OutputEvent;
use crate::execution::protocol::{self, HostCommand, KernelMessage};
use crate::utils::{self, lock};
use log::{debug, warn};
use std::io::{BufRead, BufReader, Read, Write};
use std::sync::{Arc, Mutex};
use std::thread;

/// Prefix marking interpreter stderr in the output log
pub const STDERR_MARKER: &str = "⚠ ";

/// Write one command to the kernel
pub fn write_command<W: Write>(writer: &Mutex<W>, command: &HostCommand) -> Result<()> {
    let line = protocol::encode_command(command)?;
    let mut guard = lock(writer);
    guard.write_all(line.as_bytes())?;
    guard.flush()?;
    Ok(())
}

/// Translate kernel protocol lines into session messages until the stream ends
///
/// Input requests are served in place: this thread parks on the input channel
/// and writes the reply back through `replies`. The link is closed on return.
pub fn pump_kernel_output<R, W>(reader: R, replies: &Mutex<W>, link: &SandboxLink)
where
    R: BufRead,
    W: Write,
{
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Kernel output unreadable, closing sandbox stream: {}", e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let message = match protocol::decode_message(&line) {
            Ok(message) => message,
            Err(e) => {
                warn!("Skipping malformed kernel line ({}): {}", e, line);
                continue;
            }
        };

        if !forward(message, replies, link) {
            break;
        }
    }

    link.close();
}

/// Returns `false` when pumping should stop
fn forward<W: Write>(message: KernelMessage, replies: &Mutex<W>, link: &SandboxLink) -> bool {
    let event = match message {
        KernelMessage::Ready => OutputEvent::Ready,
        KernelMessage::Stdout { text } => OutputEvent::Stdout { text },
        KernelMessage::Stderr { text } => OutputEvent::Stdout {
            text: format!("{}{}", STDERR_MARKER, text),
        },
        KernelMessage::Results { value } => OutputEvent::Result { value },
        KernelMessage::Error { error, line } => {
            let line = line.or_else(|| utils::extract_line_number(&error));
            OutputEvent::Error {
                message: error,
                line,
            }
        }
        KernelMessage::Fatal { error } => return link.fail_load(error),
        KernelMessage::InputRequest { prompt } => return serve_input(&prompt, replies, link),
    };

    link.emit(event)
}

fn serve_input<W: Write>(prompt: &str, replies: &Mutex<W>, link: &SandboxLink) -> bool {
    let reply = match link.await_input(prompt) {
        Ok(value) => HostCommand::input_value(value),
        Err(e @ (SandboxError::BlockingInputUnsupported | SandboxError::InputDeclined)) => {
            HostCommand::input_error(e.to_string())
        }
        Err(e) => {
            debug!("Input request abandoned: {}", e);
            return false;
        }
    };

    match write_command(replies, &reply) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to deliver input to kernel: {}", e);
            false
        }
    }
}

/// Spawn the sandbox reader thread for a kernel's stdout
pub fn spawn_kernel_reader<R, W>(
    stdout: R,
    replies: Arc<Mutex<W>>,
    link: SandboxLink,
) -> Result<thread::JoinHandle<()>>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    thread::Builder::new()
        .name(format!("sandbox-reader-{}", link.generation()))
        .spawn(move || pump_kernel_output(BufReader::new(stdout), &replies, &link))
        .map_err(SandboxError::Io)
}

/// Spawn a thread forwarding kernel stderr to the log
pub fn spawn_stderr_logger<R>(stderr: R, generation: u64) -> Result<thread::JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("sandbox-stderr-{}", generation))
        .spawn(move || {
            for line in BufReader::new(stderr).lines() {
                match line {
                    Ok(line) => debug!("[kernel {}] {}", generation, line),
                    Err(_) => break,
                }
            }
        })
        .map_err(SandboxError::Io)
}
