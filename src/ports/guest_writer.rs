//! Writable port over a guest directory

use super::traits::{FilesystemPort, WritablePort};
use crate::guest_path;
use async_trait::async_trait;
use std::io;
use std::sync::Arc;

/// Writes files into a guest directory through [`FilesystemPort::write_file`]
///
/// Device paths are resolved below `base_dir`, which lets the bulk writer
/// upload loose files into any directory of the guest namespace.
#[derive(Clone)]
pub struct GuestFileWriter {
    filesystem: Arc<dyn FilesystemPort>,
    base_dir: String,
}

impl GuestFileWriter {
    /// Create a writer rooted at `base_dir`
    pub fn new(filesystem: Arc<dyn FilesystemPort>, base_dir: &str) -> Self {
        Self {
            filesystem,
            base_dir: guest_path::normalize(base_dir),
        }
    }

    /// Guest directory writes land in
    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }
}

impl std::fmt::Debug for GuestFileWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestFileWriter")
            .field("filesystem", &self.filesystem.name())
            .field("base_dir", &self.base_dir)
            .finish()
    }
}

#[async_trait]
impl WritablePort for GuestFileWriter {
    async fn write_file(&self, device_path: &str, contents: &[u8]) -> io::Result<()> {
        let path = guest_path::join(&self.base_dir, device_path);
        self.filesystem.write_file(&path, contents).await
    }

    fn name(&self) -> &'static str {
        "guest-file"
    }
}
