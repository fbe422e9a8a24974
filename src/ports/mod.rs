//! Guest-facing ports and their adapters
//!
//! The staging pipeline talks to the guest through three traits:
//!
//! - [`FilesystemPort`]: the guest's unified filesystem namespace and process
//!   runtime (create directories, run executables, signal processes, list)
//! - [`WritablePort`]: the mod-storage device the guest mounts under the
//!   configured prefix
//! - [`ArchiveSource`]: turns raw archive bytes into [`ArchiveEntry`] values
//!
//! ## Adapters
//!
//! - [`MemoryGuest`] / [`MemoryDevice`]: an in-process guest with a path
//!   tree, process table, and mod-storage device; supports failure injection
//! - [`HostGuest`] / [`HostDevice`]: maps the guest namespace onto a host
//!   directory using `tokio::fs` and `tokio::process`
//! - [`ZipArchiveSource`]: decodes `.zip` archives with the `zip` crate
//! - [`GuestFileWriter`]: a [`WritablePort`] that writes through a
//!   [`FilesystemPort`], used for uploads into arbitrary guest directories
//!
//! [`ArchiveEntry`]: crate::types::ArchiveEntry

mod guest_writer;
mod host;
mod memory;
mod traits;
mod zip;

pub use guest_writer::GuestFileWriter;
pub use host::{HostDevice, HostGuest};
pub use memory::{GuestOp, MemoryDevice, MemoryGuest, MemoryProcess};
pub use traits::{
    ArchiveSource, DirEntry, FilesystemPort, RunOptions, RunOutcome, Signal, WritablePort,
};
pub use self::zip::ZipArchiveSource;
