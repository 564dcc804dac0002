//! Error handling for the RMF audio capture suite
//!
//! Transport failures abort the current step, comparison failures are never
//! reported as passes, and sequencing mistakes are rejected before anything
//! reaches the device menu.

use thiserror::Error;

use crate::capture::{CaptureState, CaptureType};

/// Result type alias for suite operations
pub type Result<T> = std::result::Result<T, RmfAudioError>;

/// Main error type for suite operations
#[derive(Error, Debug)]
pub enum RmfAudioError {
    // Transport Errors
    #[error("Connection to {host}:{port} failed: {reason}")]
    Connection {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Authentication failed for {username}@{host}")]
    Authentication { username: String, host: String },

    #[error("Remote file not found: {path}")]
    RemoteFileNotFound { path: String },

    #[error("File transfer failed for {path}: {reason}")]
    Transfer { path: String, reason: String },

    #[error("Console closed before '{expected}' was seen")]
    ConsoleClosed { expected: String },

    // Audio Errors
    #[error("Invalid audio file: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    // Menu Errors
    #[error("Menu entry '{entry}' not found in listing")]
    MenuEntryNotFound { entry: String },

    #[error("Menu is not running")]
    MenuNotRunning,

    // Sequencing Errors
    #[error("Cannot {operation} on {capture_type} capture while {state}")]
    InvalidTransition {
        capture_type: CaptureType,
        state: CaptureState,
        operation: &'static str,
    },

    #[error("Invalid menu value: {reason}")]
    InvalidValue { reason: String },

    // Configuration Errors
    #[error("Configuration error in {path}: {reason}")]
    Config { path: String, reason: String },

    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Unknown test case: {name}")]
    UnknownTestCase { name: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl RmfAudioError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            RmfAudioError::Connection { .. } => "CONNECTION_FAILED",
            RmfAudioError::Authentication { .. } => "AUTHENTICATION_FAILED",
            RmfAudioError::RemoteFileNotFound { .. } => "REMOTE_FILE_NOT_FOUND",
            RmfAudioError::Transfer { .. } => "TRANSFER_FAILED",
            RmfAudioError::ConsoleClosed { .. } => "CONSOLE_CLOSED",
            RmfAudioError::InvalidAudio { .. } => "INVALID_AUDIO",
            RmfAudioError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            RmfAudioError::MenuEntryNotFound { .. } => "MENU_ENTRY_NOT_FOUND",
            RmfAudioError::MenuNotRunning => "MENU_NOT_RUNNING",
            RmfAudioError::InvalidTransition { .. } => "INVALID_TRANSITION",
            RmfAudioError::InvalidValue { .. } => "INVALID_VALUE",
            RmfAudioError::Config { .. } => "CONFIG_ERROR",
            RmfAudioError::ChecksumMismatch { .. } => "CHECKSUM_MISMATCH",
            RmfAudioError::UnknownTestCase { .. } => "UNKNOWN_TEST_CASE",
            RmfAudioError::Io(_) => "IO_ERROR",
            RmfAudioError::Serialization(_) => "SERIALIZATION_ERROR",
            RmfAudioError::Yaml(_) => "YAML_ERROR",
        }
    }

    /// Transport-level failures abort the running step and are never retried
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RmfAudioError::Connection { .. }
                | RmfAudioError::Authentication { .. }
                | RmfAudioError::RemoteFileNotFound { .. }
                | RmfAudioError::Transfer { .. }
                | RmfAudioError::ConsoleClosed { .. }
        )
    }

    /// Check if the suite can carry on with the next test case
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RmfAudioError::InvalidTransition { .. }
                | RmfAudioError::InvalidAudio { .. }
                | RmfAudioError::UnsupportedFormat { .. }
                | RmfAudioError::RemoteFileNotFound { .. }
                | RmfAudioError::ChecksumMismatch { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            RmfAudioError::Connection { .. } => vec![
                "Check the DUT is powered and reachable on the network",
                "Verify address and port in the rack configuration",
            ],
            RmfAudioError::Authentication { .. } => vec![
                "Verify username and password in the rack configuration",
            ],
            RmfAudioError::RemoteFileNotFound { .. } => vec![
                "Check the stream was staged to the target directory",
                "Check the capture wrote its output wav file",
            ],
            RmfAudioError::MenuEntryNotFound { .. } => vec![
                "The test binary on the device may be out of date",
                "Re-stage the test artifacts",
            ],
            RmfAudioError::InvalidTransition { .. } => vec![
                "Open the handle and select a test type before starting capture",
                "Stop capture before closing the handle",
            ],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = RmfAudioError::RemoteFileNotFound {
            path: "/tmp/output.wav".to_string(),
        };
        assert_eq!(err.error_code(), "REMOTE_FILE_NOT_FOUND");
        assert!(err.is_transport());
    }

    #[test]
    fn test_transition_error_message() {
        let err = RmfAudioError::InvalidTransition {
            capture_type: CaptureType::Auxiliary,
            state: CaptureState::Closed,
            operation: "start capture",
        };
        assert_eq!(
            err.to_string(),
            "Cannot start capture on auxiliary capture while closed"
        );
        assert!(err.is_recoverable());
        assert!(!err.recovery_suggestions().is_empty());
    }
}
