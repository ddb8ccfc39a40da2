use std::io;
use std::num::ParseIntError;
use std::str::Utf8Error;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdbError>;

#[derive(Debug, Error)]
pub enum AdbError {
    /// Dialing the ADB server failed, including the start-and-redial recovery.
    #[error("ADB connection error ({address}): {source}")]
    Connection {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("ADB server error: {0}")]
    Server(String),

    /// The server answered `FAIL`, the message is the diagnostic block it sent.
    #[error("ADB command failed: {0}")]
    Status(String),

    #[error("Failed to connect device: {0}")]
    ConnectFailed(String),

    /// An unexpected tag arrived where a fixed set was expected. The
    /// connection that produced it must not be reused.
    #[error("ADB protocol desync: {0}")]
    Desync(String),

    #[error("Truncated read: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Push of {path} not verified: expected {expected} bytes on device, found {actual}")]
    VerifyTimeout {
        path: String,
        expected: u64,
        actual: u64,
    },

    #[error("Invalid usage: {0}")]
    Usage(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    ParseInt(#[from] ParseIntError),

    #[error(transparent)]
    Utf8(#[from] Utf8Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AdbError {
    /// Whether the connection that raised this error can still carry commands.
    pub fn is_fatal_for_connection(&self) -> bool {
        matches!(
            self,
            AdbError::Desync(_) | AdbError::Truncated { .. } | AdbError::Io(_)
        )
    }
}
