//! Error types for modstage
//!
//! This module provides the error taxonomy for the staging pipeline:
//! - Stage-specific errors (planning, directory creation, file writes, launches)
//! - The top-level [`Error`] returned by the install orchestrator
//! - Stage attribution and machine-readable codes for user-facing messages
//! - A serializable [`ErrorReport`] carrying the offending path or process

use crate::types::Stage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for modstage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for modstage
///
/// Returned by the install orchestrator. Each stage failure wraps the
/// stage-specific error so callers can name the stage and the path or
/// process involved.
#[derive(Debug, Error)]
pub enum Error {
    /// No engine with the requested id is registered
    #[error("unknown engine: {0}")]
    UnknownEngine(String),

    /// The archive could not be accepted or decoded
    #[error("invalid archive {name}: {reason}")]
    InvalidArchive {
        /// Archive file name
        name: String,
        /// Why the archive was rejected
        reason: String,
    },

    /// A caller-supplied path is not usable
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// The rejected path
        path: String,
        /// Why the path was rejected
        reason: String,
    },

    /// Path planning failed
    #[error("planning failed: {0}")]
    Plan(#[from] PlanError),

    /// A directory could not be created in the guest filesystem
    #[error("directory creation failed: {0}")]
    CreateDirectory(#[source] IoError),

    /// A file could not be written to the mod-storage device
    #[error("file write failed: {0}")]
    WriteFile(#[source] IoError),

    /// The engine process could not be (re)started
    #[error("process launch failed: {0}")]
    Launch(#[from] LaunchError),

    /// Another install is still running
    #[error("an install is already in progress")]
    InstallInProgress,

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "mount_prefix")
        key: Option<String>,
    },

    /// I/O error outside the staging stages (e.g. attaching a host guest)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Path planning errors
#[derive(Debug, Error)]
pub enum PlanError {
    /// Root detection found no marker folder at the top level or one level down
    #[error(
        "could not determine the mod's root directory: no {} folder found",
        .markers.join(", ")
    )]
    NoRootFound {
        /// Marker folder names that were searched for
        markers: Vec<String>,
    },

    /// The target root is not an absolute device path
    #[error("target root {target_root} is not an absolute path")]
    InvalidTargetRoot {
        /// The rejected target root
        target_root: String,
    },
}

/// A filesystem operation failed on a specific path
#[derive(Debug, Error)]
#[error("{path}: {cause}")]
pub struct IoError {
    /// Guest or device path the operation targeted
    pub path: String,
    /// Underlying cause
    #[source]
    pub cause: std::io::Error,
}

impl IoError {
    /// Create a new path-scoped I/O error
    pub fn new(path: impl Into<String>, cause: std::io::Error) -> Self {
        Self {
            path: path.into(),
            cause,
        }
    }
}

/// Launching the engine process failed
#[derive(Debug, Error)]
#[error("{executable_path}: {cause}")]
pub struct LaunchError {
    /// Executable that was attempted
    pub executable_path: String,
    /// Underlying cause
    #[source]
    pub cause: LaunchCause,
}

/// Why a launch failed
#[derive(Debug, Error)]
pub enum LaunchCause {
    /// A process is already tracked; launching would leave two running
    #[error("process {pid} is already running")]
    AlreadyRunning {
        /// Pid of the tracked process
        pid: u32,
    },

    /// The guest runtime refused to start the executable
    #[error("{0}")]
    Runtime(#[from] std::io::Error),
}

impl Error {
    /// Stage this error belongs to, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::UnknownEngine(_) => Some(Stage::Resolve),
            Error::InvalidArchive { .. } => Some(Stage::Decode),
            Error::Plan(_) => Some(Stage::Plan),
            Error::CreateDirectory(_) => Some(Stage::CreateDirectories),
            Error::WriteFile(_) => Some(Stage::WriteFiles),
            Error::Launch(_) => Some(Stage::Restart),
            Error::InvalidPath { .. }
            | Error::InstallInProgress
            | Error::Config { .. }
            | Error::Io(_) => None,
        }
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::UnknownEngine(_) => "unknown_engine",
            Error::InvalidArchive { .. } => "invalid_archive",
            Error::InvalidPath { .. } => "invalid_path",
            Error::Plan(e) => match e {
                PlanError::NoRootFound { .. } => "no_root_found",
                PlanError::InvalidTargetRoot { .. } => "invalid_target_root",
            },
            Error::CreateDirectory(_) => "create_directory_failed",
            Error::WriteFile(_) => "write_failed",
            Error::Launch(e) => match e.cause {
                LaunchCause::AlreadyRunning { .. } => "already_running",
                LaunchCause::Runtime(_) => "launch_failed",
            },
            Error::InstallInProgress => "install_in_progress",
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
        }
    }

    /// Build a user-facing message naming the failing stage
    pub fn user_message(&self) -> String {
        match self.stage() {
            Some(stage) => format!("Failed to install mod during {}: {}", stage, self),
            None => format!("Failed to install mod: {}", self),
        }
    }
}

/// Serializable error report for presenting install failures
///
/// # Example JSON
///
/// ```json
/// {
///   "code": "write_failed",
///   "stage": "write_files",
///   "message": "file write failed: /mymod/data/song.json: disk full",
///   "details": { "path": "/mymod/data/song.json" }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Machine-readable error code
    pub code: String,
    /// Failing stage, if the error belongs to one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    /// Human-readable error message
    pub message: String,
    /// Offending path, process, or engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for ErrorReport {
    fn from(error: &Error) -> Self {
        let details = match error {
            Error::UnknownEngine(id) => Some(serde_json::json!({ "engine_id": id })),
            Error::InvalidArchive { name, .. } => Some(serde_json::json!({ "archive": name })),
            Error::InvalidPath { path, .. } => Some(serde_json::json!({ "path": path })),
            Error::Plan(PlanError::NoRootFound { markers }) => {
                Some(serde_json::json!({ "markers": markers }))
            }
            Error::Plan(PlanError::InvalidTargetRoot { target_root }) => {
                Some(serde_json::json!({ "target_root": target_root }))
            }
            Error::CreateDirectory(e) | Error::WriteFile(e) => {
                Some(serde_json::json!({ "path": e.path }))
            }
            Error::Launch(e) => match &e.cause {
                LaunchCause::AlreadyRunning { pid } => Some(serde_json::json!({
                    "executable_path": e.executable_path,
                    "pid": pid,
                })),
                LaunchCause::Runtime(_) => Some(serde_json::json!({
                    "executable_path": e.executable_path,
                })),
            },
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({ "key": key })),
            _ => None,
        };

        ErrorReport {
            code: error.error_code().to_string(),
            stage: error.stage(),
            message: error.to_string(),
            details,
        }
    }
}

impl From<Error> for ErrorReport {
    fn from(error: Error) -> Self {
        ErrorReport::from(&error)
    }
}
