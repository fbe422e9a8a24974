//! Guest filesystem navigation
//!
//! [`ExplorerCursor`] remembers which guest directory is being browsed and
//! lists it through a [`FilesystemPort`]. Paths always follow the shared
//! guest format, so the cursor's path can be handed straight to
//! [`ModInstaller::upload_files`](crate::ModInstaller::upload_files).

use crate::error::{Error, Result};
use crate::guest_path;
use crate::ports::{DirEntry, FilesystemPort};
use serde::Serialize;
use tracing::debug;

/// Contents of one guest directory
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Listing {
    /// Directory that was listed
    pub path: String,
    /// Where "up" leads; `None` at the root
    pub parent: Option<String>,
    /// Entries, sorted by name
    pub entries: Vec<DirEntry>,
}

impl Listing {
    /// Sub-directories in this listing
    pub fn directories(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries.iter().filter(|e| e.is_dir)
    }

    /// Files in this listing
    pub fn files(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries.iter().filter(|e| !e.is_dir)
    }
}

/// Current position in the guest filesystem
///
/// The cursor only moves when the target directory could be listed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExplorerCursor {
    current_path: String,
}

impl Default for ExplorerCursor {
    fn default() -> Self {
        Self {
            current_path: guest_path::ROOT.to_string(),
        }
    }
}

impl ExplorerCursor {
    /// Cursor at the guest root
    pub fn new() -> Self {
        Self::default()
    }

    /// Cursor at `path` (normalized), without listing it
    pub fn at(path: &str) -> Self {
        Self {
            current_path: guest_path::normalize(path),
        }
    }

    /// Directory the cursor points at
    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    /// List the current directory again
    pub async fn refresh(&self, fs: &dyn FilesystemPort) -> Result<Listing> {
        list(fs, &self.current_path).await
    }

    /// Jump to `path` and list it
    pub async fn go_to(&mut self, fs: &dyn FilesystemPort, path: &str) -> Result<Listing> {
        let listing = list(fs, &guest_path::normalize(path)).await?;
        self.current_path = listing.path.clone();
        Ok(listing)
    }

    /// Enter the child directory `name` and list it
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] if `name` is not a single path segment.
    pub async fn enter(&mut self, fs: &dyn FilesystemPort, name: &str) -> Result<Listing> {
        if name.is_empty() || name.contains('/') || name == "." || name == ".." {
            return Err(Error::InvalidPath {
                path: name.to_string(),
                reason: "expected a single directory name".to_string(),
            });
        }
        let target = guest_path::join(&self.current_path, name);
        self.go_to(fs, &target).await
    }

    /// Move to the parent directory and list it; stays put at the root
    pub async fn up(&mut self, fs: &dyn FilesystemPort) -> Result<Listing> {
        let target = guest_path::parent(&self.current_path)
            .unwrap_or_else(|| guest_path::ROOT.to_string());
        self.go_to(fs, &target).await
    }
}

async fn list(fs: &dyn FilesystemPort, path: &str) -> Result<Listing> {
    let mut entries = fs.list_dir(path).await.map_err(|e| Error::InvalidPath {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(path, entries = entries.len(), "listed guest directory");

    Ok(Listing {
        path: path.to_string(),
        parent: guest_path::parent(path),
        entries,
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::MemoryGuest;

    async fn populated() -> MemoryGuest {
        let guest = MemoryGuest::new("/mods");
        guest.create_dir_all("/mods/mymod/data").await.unwrap();
        guest.write_file("/mods/mymod/readme.txt", b"r").await.unwrap();
        guest.create_dir_all("/usr/bin").await.unwrap();
        guest
    }

    #[tokio::test]
    async fn test_starts_at_root() {
        let guest = populated().await;
        let cursor = ExplorerCursor::new();
        let listing = cursor.refresh(&guest).await.unwrap();

        assert_eq!(listing.path, "/");
        assert_eq!(listing.parent, None);
        let names: Vec<_> = listing.directories().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["mods", "usr"]);
    }

    #[tokio::test]
    async fn test_enter_and_up() {
        let guest = populated().await;
        let mut cursor = ExplorerCursor::new();

        cursor.enter(&guest, "mods").await.unwrap();
        let listing = cursor.enter(&guest, "mymod").await.unwrap();
        assert_eq!(cursor.current_path(), "/mods/mymod");
        assert_eq!(listing.parent.as_deref(), Some("/mods"));
        assert_eq!(listing.files().count(), 1);
        assert_eq!(listing.directories().count(), 1);

        cursor.up(&guest).await.unwrap();
        assert_eq!(cursor.current_path(), "/mods");
        cursor.up(&guest).await.unwrap();
        assert_eq!(cursor.current_path(), "/");
        cursor.up(&guest).await.unwrap();
        assert_eq!(cursor.current_path(), "/");
    }

    #[tokio::test]
    async fn test_go_to_normalizes() {
        let guest = populated().await;
        let mut cursor = ExplorerCursor::new();
        let listing = cursor.go_to(&guest, "mods//mymod/").await.unwrap();
        assert_eq!(listing.path, "/mods/mymod");
        assert_eq!(cursor.current_path(), "/mods/mymod");
    }

    #[tokio::test]
    async fn test_failed_listing_keeps_position() {
        let guest = populated().await;
        let mut cursor = ExplorerCursor::at("/mods");

        assert!(cursor.go_to(&guest, "/missing").await.is_err());
        assert!(cursor.enter(&guest, "readme.txt").await.is_err());
        assert_eq!(cursor.current_path(), "/mods");
    }

    #[tokio::test]
    async fn test_enter_rejects_paths() {
        let guest = populated().await;
        let mut cursor = ExplorerCursor::new();
        for bad in ["", "..", ".", "mods/mymod"] {
            let err = cursor.enter(&guest, bad).await.unwrap_err();
            assert!(matches!(err, Error::InvalidPath { .. }), "{bad}");
        }
        assert_eq!(cursor.current_path(), "/");
    }
}
