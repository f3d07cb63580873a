//! Fixed-capacity rendezvous buffer with a single status cell

use crate::errors::{Result, SandboxError};
use crate::utils::lock;
use log::debug;
use std::sync::{Condvar, Mutex};

/// Total buffer size, status cell included
pub const DEFAULT_INPUT_BUFFER_BYTES: usize = 4096;

/// Bytes taken by the status cell at the head of the buffer
pub const STATUS_CELL_BYTES: usize = 4;

/// Value of the status cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum InputStatus {
    /// Sandbox is (or will be) waiting for a value
    Awaiting = 0,
    /// Controller has written a value
    Ready = 1,
}

struct Cell {
    status: InputStatus,
    // A read has been armed and not yet resolved
    pending: bool,
    // Bumped by `interrupt` to release parked readers
    epoch: u64,
    // Set by `decline`, consumed by the parked reader
    declined: bool,
    data: Box<[u8]>,
}

/// Proof that the sandbox side armed the channel for one read
#[derive(Debug)]
#[must_use = "an armed read must be waited on"]
pub struct ArmedRead {
    epoch: u64,
}

/// Shared input buffer handed from the session to its sandbox
pub struct InputChannel {
    cell: Mutex<Cell>,
    signal: Condvar,
    capacity: usize,
}

impl InputChannel {
    /// Channel with `capacity` data bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            cell: Mutex::new(Cell {
                status: InputStatus::Awaiting,
                pending: false,
                epoch: 0,
                declined: false,
                data: vec![0u8; capacity].into_boxed_slice(),
            }),
            signal: Condvar::new(),
            capacity,
        }
    }

    /// Channel laid out over a buffer of `total` bytes, status cell first
    pub fn with_buffer_size(total: usize) -> Result<Self> {
        if total <= STATUS_CELL_BYTES {
            return Err(SandboxError::InvalidConfig(format!(
                "input buffer must be larger than {} bytes, got {}",
                STATUS_CELL_BYTES, total
            )));
        }
        Ok(Self::new(total - STATUS_CELL_BYTES))
    }

    /// Data capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current value of the status cell
    pub fn status(&self) -> InputStatus {
        lock(&self.cell).status
    }

    /// Whether a read is armed and waiting for `resolve`
    pub fn is_pending(&self) -> bool {
        lock(&self.cell).pending
    }

    /// Sandbox side: reset the status cell to awaiting and mark a read pending
    pub fn arm(&self) -> ArmedRead {
        let mut cell = lock(&self.cell);
        cell.status = InputStatus::Awaiting;
        cell.pending = true;
        cell.declined = false;
        ArmedRead { epoch: cell.epoch }
    }

    /// Sandbox side: park until the controller resolves the read
    ///
    /// Fails with `InputInterrupted` when the channel was interrupted after
    /// arming, and with `InputDeclined` when the controller refused the read.
    pub fn wait(&self, armed: ArmedRead) -> Result<String> {
        let mut cell = lock(&self.cell);
        loop {
            if cell.epoch != armed.epoch {
                return Err(SandboxError::InputInterrupted);
            }
            if cell.declined {
                cell.declined = false;
                return Err(SandboxError::InputDeclined);
            }
            if cell.status == InputStatus::Ready {
                break;
            }
            cell = self
                .signal
                .wait(cell)
                .unwrap_or_else(|poison| poison.into_inner());
        }

        let value = decode(&cell.data);
        // Re-arm for the next read
        cell.status = InputStatus::Awaiting;
        Ok(value)
    }

    /// Sandbox side: arm, publish the request, park, decode
    ///
    /// `publish` reports whether the request reached the controller.
    pub fn request<F>(&self, publish: F) -> Result<String>
    where
        F: FnOnce() -> bool,
    {
        let armed = self.arm();
        if !publish() {
            self.disarm();
            return Err(SandboxError::InputInterrupted);
        }
        self.wait(armed)
    }

    /// Controller side: store `value` and wake the sandbox
    ///
    /// Values longer than the capacity are truncated. Returns the number of
    /// bytes stored.
    pub fn resolve(&self, value: &str) -> Result<usize> {
        let stored = {
            let mut cell = lock(&self.cell);
            if !cell.pending {
                return Err(SandboxError::NoPendingInput);
            }

            let bytes = value.as_bytes();
            let stored = bytes.len().min(self.capacity);
            cell.data[..stored].copy_from_slice(&bytes[..stored]);
            cell.data[stored..].fill(0);
            cell.pending = false;
            cell.status = InputStatus::Ready;
            stored
        };
        self.signal.notify_all();

        if stored < value.len() {
            debug!(
                "Input truncated from {} to {} bytes",
                value.len(),
                stored
            );
        }
        Ok(stored)
    }

    /// Controller side: refuse the pending read without a value
    ///
    /// The parked reader wakes with `InputDeclined`. Returns `false` when no
    /// read was pending.
    pub fn decline(&self) -> bool {
        {
            let mut cell = lock(&self.cell);
            if !cell.pending {
                return false;
            }
            cell.pending = false;
            cell.declined = true;
        }
        self.signal.notify_all();
        true
    }

    /// Release any parked reader without a value
    pub fn interrupt(&self) {
        {
            let mut cell = lock(&self.cell);
            cell.epoch = cell.epoch.wrapping_add(1);
            cell.pending = false;
            cell.declined = false;
            cell.status = InputStatus::Awaiting;
        }
        self.signal.notify_all();
    }

    fn disarm(&self) {
        lock(&self.cell).pending = false;
    }
}

impl Default for InputChannel {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_BUFFER_BYTES - STATUS_CELL_BYTES)
    }
}

impl std::fmt::Debug for InputChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cell = lock(&self.cell);
        f.debug_struct("InputChannel")
            .field("capacity", &self.capacity)
            .field("status", &cell.status)
            .field("pending", &cell.pending)
            .finish()
    }
}

/// Decode up to the first zero byte; an incomplete trailing UTF-8 sequence is dropped
fn decode(data: &[u8]) -> String {
    let end = data.iter().position(|b| *b == 0).unwrap_or(data.len());
    let bytes = &data[..end];
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(err) => String::from_utf8_lossy(&bytes[..err.valid_up_to()]).into_owned(),
    }
}
