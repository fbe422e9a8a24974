//! Concurrent bulk writes to the mod-storage device

use crate::error::IoError;
use crate::ports::WritablePort;
use crate::types::PlannedWrite;
use futures::stream::{self, StreamExt};
use tracing::{debug, error};

/// Write every planned file to `device` concurrently
///
/// All writes are put in flight at once unless `max_concurrency` caps them.
/// The call waits for every write to finish, then succeeds only if all of
/// them did; otherwise it returns the first failure in completion order.
/// Files written by the other writes stay on the device.
///
/// Returns the number of files written.
///
/// # Errors
///
/// Returns an [`IoError`] carrying the device path of the first write to fail.
pub async fn write_all(
    writes: Vec<PlannedWrite>,
    device: &dyn WritablePort,
    max_concurrency: Option<usize>,
) -> Result<usize, IoError> {
    let limit = max_concurrency.unwrap_or(writes.len()).max(1);

    let mut completions = stream::iter(writes)
        .map(move |write| async move {
            match device.write_file(&write.device_path, &write.content).await {
                Ok(()) => {
                    debug!(path = %write.device_path, bytes = write.content.len(), "wrote file");
                    Ok(())
                }
                Err(e) => Err(IoError::new(write.device_path, e)),
            }
        })
        .buffer_unordered(limit);

    let mut written = 0;
    let mut first_failure: Option<IoError> = None;
    while let Some(result) = completions.next().await {
        match result {
            Ok(()) => written += 1,
            Err(e) => {
                error!(path = %e.path, error = %e.cause, device = device.name(), "file write failed");
                if first_failure.is_none() {
                    first_failure = Some(e);
                }
            }
        }
    }

    match first_failure {
        Some(e) => Err(e),
        None => Ok(written),
    }
}
