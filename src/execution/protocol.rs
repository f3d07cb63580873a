//! JSON-lines protocol between the host and the interpreter kernel

use crate::errors::Result;
use serde::{Deserialize, Serialize};

/// Host -> kernel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum HostCommand {
    /// First message after spawn; the kernel answers `ready`
    Init { blocking_input: bool },
    /// Execute `code` as the file `entry`
    Run {
        entry: String,
        code: String,
        files: Vec<String>,
    },
    /// Answer to a pending `input_request`
    InputReply {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl HostCommand {
    pub fn input_value(value: impl Into<String>) -> Self {
        HostCommand::InputReply {
            value: Some(value.into()),
            error: None,
        }
    }

    pub fn input_error(error: impl Into<String>) -> Self {
        HostCommand::InputReply {
            value: None,
            error: Some(error.into()),
        }
    }
}

/// Kernel -> host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KernelMessage {
    Ready,
    Stdout {
        text: String,
    },
    Stderr {
        text: String,
    },
    Results {
        #[serde(default)]
        value: Option<String>,
    },
    Error {
        error: String,
        #[serde(default)]
        line: Option<u32>,
    },
    InputRequest {
        #[serde(default)]
        prompt: String,
    },
    /// The kernel could not initialise
    Fatal {
        error: String,
    },
}

/// Encode a command as one protocol line, newline included
pub fn encode_command(command: &HostCommand) -> Result<String> {
    let mut line = serde_json::to_string(command)?;
    line.push('\n');
    Ok(line)
}

/// Decode one protocol line from the kernel
pub fn decode_message(line: &str) -> Result<KernelMessage> {
    Ok(serde_json::from_str(line.trim_end())?)
}
