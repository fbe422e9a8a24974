//! Core types and events for modstage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One file or directory inside a decoded archive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Slash-separated, archive-internal path with no leading slash
    pub relative_path: String,
    /// Whether this entry is an explicit directory entry
    pub is_directory: bool,
    /// File content (empty for directory entries)
    pub content: Vec<u8>,
}

impl ArchiveEntry {
    /// Create a file entry
    pub fn file(relative_path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            relative_path: relative_path.into(),
            is_directory: false,
            content: content.into(),
        }
    }

    /// Create an explicit directory entry
    pub fn directory(relative_path: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            is_directory: true,
            content: Vec::new(),
        }
    }
}

/// Selects how the path planner maps archive entries onto the guest tree
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStrategy {
    /// Locate the mod root by looking for marker folders, then extract from there
    RootDetect,
    /// Extract the archive as-is under the target root
    DirectExtract,
}

/// Static description of a guest engine target
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineProfile {
    /// Unique key used for lookups (e.g. "vslice")
    pub id: String,
    /// Name shown to users
    pub display_name: String,
    /// Short description shown to users
    #[serde(default)]
    pub description: String,
    /// Absolute guest path of the engine executable
    pub executable_path: String,
    /// How mods for this engine are laid out
    pub install_strategy: InstallStrategy,
}

impl EngineProfile {
    /// Create a new engine profile
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        executable_path: impl Into<String>,
        install_strategy: InstallStrategy,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            description: description.into(),
            executable_path: executable_path.into(),
            install_strategy,
        }
    }
}

/// A single file write produced by the path planner
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedWrite {
    /// Path relative to the mod-storage device root (never includes the mount prefix)
    pub device_path: String,
    /// Bytes to write
    pub content: Vec<u8>,
}

/// Output of the path planner
///
/// Every write's parent directory is either listed in `directories` or is the
/// device root.
#[must_use]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstallPlan {
    /// Device-relative directories to create (deduplicated)
    pub directories: BTreeSet<String>,
    /// Files to write, in archive enumeration order
    pub writes: Vec<PlannedWrite>,
    /// Archive subfolder that was detected and stripped, if any
    pub detected_root: Option<String>,
}

impl InstallPlan {
    /// Whether the plan has nothing to do
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.writes.is_empty()
    }

    /// Number of files the plan writes
    pub fn file_count(&self) -> usize {
        self.writes.len()
    }
}

/// Identity of the tracked engine process
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessHandle {
    /// Guest process id
    pub pid: u32,
    /// Engine the process was launched for
    pub engine_id: String,
    /// When the launch request succeeded
    pub started_at: DateTime<Utc>,
}

/// A mod archive handed over by the caller (e.g. a dropped `.zip` file)
#[derive(Clone, Debug)]
pub struct ModArchive {
    /// Original file name, used to derive the target root
    pub file_name: String,
    /// Raw archive bytes
    pub bytes: Vec<u8>,
}

impl ModArchive {
    /// Create a new archive handle
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// A loose file to upload into a guest directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFile {
    /// File name (single path segment)
    pub name: String,
    /// File content
    pub contents: Vec<u8>,
}

impl UploadFile {
    /// Create a new upload
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

/// Summary of a successful install
#[must_use]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstallReport {
    /// Engine the mod was installed for
    pub engine_id: String,
    /// Device-relative root the mod was installed under
    pub target_root: String,
    /// Number of files written to the mod-storage device
    pub files_written: usize,
    /// Number of directories requested from the guest filesystem
    pub directories_created: usize,
    /// Archive subfolder stripped by root detection, if any
    pub detected_root: Option<String>,
    /// The engine process started after the install
    pub process: ProcessHandle,
}

/// Install pipeline stage, used to tell users where an install failed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Engine lookup
    Resolve,
    /// Archive decoding
    Decode,
    /// Path planning
    Plan,
    /// Directory creation
    CreateDirectories,
    /// File writes
    WriteFiles,
    /// Engine process restart
    Restart,
}

impl Stage {
    /// Human-readable stage name
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Resolve => "engine lookup",
            Stage::Decode => "archive decoding",
            Stage::Plan => "planning",
            Stage::CreateDirectories => "directory creation",
            Stage::WriteFiles => "file write",
            Stage::Restart => "process restart",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event emitted while installing mods and managing the engine process
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An install request was accepted
    InstallStarted {
        /// Archive file name
        archive: String,
        /// Target engine
        engine_id: String,
        /// Device-relative target root
        target_root: String,
    },

    /// The install plan was computed
    Planned {
        /// Number of directories to create
        directories: usize,
        /// Number of files to write
        files: usize,
        /// Archive subfolder stripped by root detection
        #[serde(skip_serializing_if = "Option::is_none")]
        detected_root: Option<String>,
    },

    /// All planned directories exist
    DirectoriesCreated {
        /// Number of directories requested
        count: usize,
    },

    /// All planned files were written
    FilesWritten {
        /// Number of files written
        count: usize,
    },

    /// The previously tracked process was stopped (or was already gone)
    ProcessStopped {
        /// Process id
        pid: u32,
        /// Engine the process belonged to
        engine_id: String,
    },

    /// A new engine process was launched
    ProcessLaunched {
        /// Process id
        pid: u32,
        /// Engine the process belongs to
        engine_id: String,
    },

    /// Install and restart finished
    InstallComplete {
        /// Device-relative target root
        target_root: String,
        /// Number of files written
        files_written: usize,
    },

    /// Install failed
    InstallFailed {
        /// Stage that failed, if the failure belongs to one
        #[serde(skip_serializing_if = "Option::is_none")]
        stage: Option<Stage>,
        /// Error message
        error: String,
    },
}
