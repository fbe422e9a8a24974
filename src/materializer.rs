//! Directory materialization
//!
//! Creates every planned directory in the guest namespace before any file is
//! written. Creation is idempotent, so re-running an install over an existing
//! tree is safe.

use crate::error::IoError;
use crate::guest_path;
use crate::ports::FilesystemPort;
use std::collections::BTreeSet;
use tracing::{debug, error};

/// Create each device-relative directory under `mount_prefix`
///
/// Directories are created one at a time in sorted order, each with
/// `create_dir_all`. The first failure stops the loop; directories created
/// before it are left in place.
///
/// Returns the number of directories requested.
///
/// # Errors
///
/// Returns an [`IoError`] carrying the guest path that could not be created.
pub async fn materialize(
    directories: &BTreeSet<String>,
    fs: &dyn FilesystemPort,
    mount_prefix: &str,
) -> Result<usize, IoError> {
    for directory in directories {
        let path = guest_path::mounted(mount_prefix, directory);
        if let Err(e) = fs.create_dir_all(&path).await {
            error!(path = %path, error = %e, "failed to create directory");
            return Err(IoError::new(path, e));
        }
        debug!(path = %path, "created directory");
    }
    Ok(directories.len())
}
