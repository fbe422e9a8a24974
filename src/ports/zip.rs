//! Zip-backed archive source

use super::traits::ArchiveSource;
use crate::types::ArchiveEntry;
use async_trait::async_trait;
use std::io::{self, Cursor, Read};
use tracing::{debug, warn};

/// Decodes `.zip` archives with the `zip` crate
///
/// Decoding runs on the blocking pool. Entries whose names would escape the
/// archive root (absolute paths, `..`) are skipped with a warning.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZipArchiveSource;

impl ZipArchiveSource {
    fn decode_blocking(bytes: Vec<u8>) -> io::Result<Vec<ArchiveEntry>> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive
                .by_index(index)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

            let Some(enclosed) = file.enclosed_name() else {
                warn!(name = file.name(), "skipping entry with unsafe path");
                continue;
            };
            let relative_path = enclosed
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            if relative_path.is_empty() {
                continue;
            }

            if file.is_dir() {
                entries.push(ArchiveEntry::directory(relative_path));
            } else {
                let mut content = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
                file.read_to_end(&mut content)?;
                entries.push(ArchiveEntry::file(relative_path, content));
            }
        }

        debug!(entries = entries.len(), "decoded zip archive");
        Ok(entries)
    }
}

#[async_trait]
impl ArchiveSource for ZipArchiveSource {
    async fn decode(&self, bytes: Vec<u8>) -> io::Result<Vec<ArchiveEntry>> {
        tokio::task::spawn_blocking(move || Self::decode_blocking(bytes))
            .await
            .map_err(|e| io::Error::other(format!("zip decoding task failed: {}", e)))?
    }

    fn name(&self) -> &'static str {
        "zip"
    }
}
