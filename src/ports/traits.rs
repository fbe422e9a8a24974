//! Traits and types for talking to the guest

use crate::types::ArchiveEntry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;

/// Options for [`FilesystemPort::run`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Environment as `KEY=VALUE` pairs
    pub env: Vec<String>,
    /// Return once the process has started instead of waiting for it to exit
    pub background: bool,
}

/// Result of [`FilesystemPort::run`]
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOutcome {
    /// Guest process id
    pub pid: u32,
    /// Exit code for foreground runs; `None` for background runs
    pub exit_code: Option<i32>,
}

/// Signals that can be delivered to a guest process
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// Polite termination request (SIGTERM)
    Terminate,
    /// Forced kill (SIGKILL)
    Kill,
}

/// One entry in a guest directory listing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (single segment)
    pub name: String,
    /// Whether the entry is a directory
    pub is_dir: bool,
}

impl DirEntry {
    /// Directory entry
    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }

    /// File entry
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }
}

/// The guest's unified filesystem namespace and process runtime
///
/// All paths are absolute guest paths in the format produced by
/// [`guest_path::normalize`](crate::guest_path::normalize).
///
/// # Errors
///
/// Every operation reports failure as a plain `std::io::Error`; callers wrap
/// it with the path or process involved.
#[async_trait]
pub trait FilesystemPort: Send + Sync {
    /// Create a directory and any missing ancestors
    ///
    /// Succeeds without effect when the directory already exists.
    async fn create_dir_all(&self, path: &str) -> io::Result<()>;

    /// Run an executable
    ///
    /// With `options.background` set this returns as soon as the process has
    /// started; otherwise it waits for the exit code.
    async fn run(&self, path: &str, args: &[String], options: &RunOptions)
    -> io::Result<RunOutcome>;

    /// Deliver a signal to a running process
    async fn signal(&self, pid: u32, signal: Signal) -> io::Result<()>;

    /// List the entries of a directory
    async fn list_dir(&self, path: &str) -> io::Result<Vec<DirEntry>>;

    /// Write a file in the guest namespace (the parent must exist)
    async fn write_file(&self, path: &str, contents: &[u8]) -> io::Result<()>;

    /// Read a file from the guest namespace
    async fn read_file(&self, path: &str) -> io::Result<Vec<u8>>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// A block-level writable device the guest mounts under the mount prefix
///
/// Paths are relative to the device root (absolute, without the prefix).
#[async_trait]
pub trait WritablePort: Send + Sync {
    /// Write a file, replacing any existing content
    async fn write_file(&self, device_path: &str, contents: &[u8]) -> io::Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Decodes a raw archive into its entry list
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Decode archive bytes, returning entries in enumeration order
    async fn decode(&self, bytes: Vec<u8>) -> io::Result<Vec<ArchiveEntry>>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
