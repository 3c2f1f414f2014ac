//! Error types for the change watcher.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Exit code used for every error that stops a session before it starts.
pub const INVALID_INPUT_EXIT_CODE: i32 = 255;

/// Errors that can occur while setting up or running a session.
///
/// Recoverable conditions (a file vanishing or coming back) are never
/// errors; they surface as events instead.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Path does not exist.
    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    /// Polling only works on explicitly listed files.
    #[error("cannot poll a directory: {}", .0.display())]
    NotAFile(PathBuf),

    /// Invalid regex or glob fragment.
    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Settings that cannot be combined.
    #[error("conflicting options: {0}")]
    Conflict(String),

    /// The OS notification backend could not be initialised.
    #[error("file notification backend unavailable ({0}); retry with polling (--poll)")]
    BackendUnavailable(#[source] notify::Error),

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Notification stream ended while the session was still running.
    #[error("channel error: notification stream closed")]
    ChannelClosed,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl WatcherError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        INVALID_INPUT_EXIT_CODE
    }
}
