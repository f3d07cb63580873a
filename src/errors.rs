//! Error types for playground sessions

use std::io;
use thiserror::Error;

use crate::controller::SessionState;

/// Result type for playground operations
pub type Result<T> = std::result::Result<T, SandboxError>;

/// Errors that can occur while driving a sandbox session
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Syscall error: {0}")]
    Syscall(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid virtual path: {0:?}")]
    InvalidPath(String),

    #[error("Entry file not found in file set: {0}")]
    UnknownEntry(String),

    #[error("Session not ready (state: {0})")]
    NotReady(SessionState),

    #[error("Session already started (state: {0})")]
    AlreadyStarted(SessionState),

    #[error("Sandbox failed to load: {0}")]
    LoadFailed(String),

    #[error("blocking input unsupported in this environment")]
    BlockingInputUnsupported,

    #[error("No input request is pending")]
    NoPendingInput,

    #[error("Input ticket from generation {ticket} is stale (current generation {current})")]
    StaleInput { ticket: u64, current: u64 },

    #[error("Input request interrupted by sandbox teardown")]
    InputInterrupted,

    #[error("input() outside an active run")]
    InputDeclined,
}

impl From<serde_json::Error> for SandboxError {
    fn from(err: serde_json::Error) -> Self {
        SandboxError::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SandboxError::NoPendingInput;
        assert_eq!(err.to_string(), "No input request is pending");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = SandboxError::from(io_err);
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = SandboxError::from(json_err);
        assert!(matches!(err, SandboxError::Protocol(_)));
    }

    #[test]
    fn test_not_ready_names_state() {
        let err = SandboxError::NotReady(SessionState::Loading);
        assert!(err.to_string().contains("loading"));
    }

    #[test]
    fn test_unsupported_input_diagnostic() {
        let err = SandboxError::BlockingInputUnsupported;
        assert_eq!(
            err.to_string(),
            "blocking input unsupported in this environment"
        );
    }

    #[test]
    fn test_declined_input_diagnostic() {
        assert_eq!(
            SandboxError::InputDeclined.to_string(),
            "input() outside an active run"
        );
    }

    #[test]
    fn test_stale_input_mentions_generations() {
        let err = SandboxError::StaleInput {
            ticket: 2,
            current: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains('2') && msg.contains('3'));
    }
}
