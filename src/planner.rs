//! Path planning
//!
//! Turns an archive's entry list into an [`InstallPlan`]: the directories to
//! create on the mod-storage device and the files to write, all relative to
//! the device root. Planning is pure; nothing here touches a port.
//!
//! Two strategies are supported:
//!
//! - [`InstallStrategy::DirectExtract`] places every entry under the target
//!   root exactly as it appears in the archive.
//! - [`InstallStrategy::RootDetect`] first locates the mod's root by looking
//!   for a marker folder (e.g. `data/`) at the archive's top level or one
//!   level below a single subfolder, then extracts relative to that root.

use crate::error::{Error, PlanError};
use crate::guest_path;
use crate::types::{ArchiveEntry, InstallPlan, InstallStrategy, PlannedWrite};
use std::path::Path;
use tracing::{debug, warn};

/// Where root detection found the mod's root inside an archive
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RootLocation {
    /// Marker folders sit at the archive's top level
    TopLevel,
    /// Marker folders sit inside this top-level subfolder
    Subfolder(String),
}

/// Path segments of an entry, or `None` if the entry climbs out with `..`
fn entry_segments(entry: &ArchiveEntry) -> Option<Vec<&str>> {
    let mut segments = Vec::new();
    for segment in entry.relative_path.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            other => segments.push(other),
        }
    }
    Some(segments)
}

/// Locate the mod root with a single scan in enumeration order
///
/// A segment counts as a marker folder only when something follows it in the
/// entry's path or the entry itself is a directory, so a top-level file named
/// `data` is not a match. The first entry that matches decides:
/// a marker as its first segment means [`RootLocation::TopLevel`], a marker
/// as its second segment means [`RootLocation::Subfolder`] of the first.
///
/// When an archive contains both layouts the winner depends on which entry
/// the archive lists first.
pub fn detect_root(entries: &[ArchiveEntry], markers: &[String]) -> Option<RootLocation> {
    for entry in entries {
        let Some(segments) = entry_segments(entry) else {
            continue;
        };
        let is_marker_folder = |index: usize| {
            segments.get(index).is_some_and(|segment| {
                markers.iter().any(|m| m == segment)
                    && (index + 1 < segments.len() || entry.is_directory)
            })
        };

        if is_marker_folder(0) {
            return Some(RootLocation::TopLevel);
        }
        if is_marker_folder(1) {
            return Some(RootLocation::Subfolder(segments[0].to_string()));
        }
    }
    None
}

/// Compute the directories and writes needed to install `entries` under
/// `target_root`
///
/// `target_root` is a device-relative absolute path such as `/mymod`; every
/// path in the returned plan is below it. Entries that climb out of the
/// archive with `..` are skipped with a warning.
///
/// # Errors
///
/// - [`PlanError::InvalidTargetRoot`] if `target_root` is not absolute and
///   normalized
/// - [`PlanError::NoRootFound`] if `RootDetect` finds no marker folder at the
///   top level or one level down
///
/// # Examples
///
/// ```
/// use modstage::planner::plan;
/// use modstage::types::{ArchiveEntry, InstallStrategy};
///
/// let entries = vec![ArchiveEntry::file("ModPack/data/x.json", b"{}".to_vec())];
/// let markers = vec!["data".to_string()];
/// let plan = plan(entries, InstallStrategy::RootDetect, "/mymod", &markers).unwrap();
///
/// assert_eq!(plan.writes[0].device_path, "/mymod/data/x.json");
/// assert_eq!(plan.detected_root.as_deref(), Some("ModPack"));
/// ```
pub fn plan(
    entries: Vec<ArchiveEntry>,
    strategy: InstallStrategy,
    target_root: &str,
    markers: &[String],
) -> Result<InstallPlan, PlanError> {
    if !target_root.starts_with('/') || !guest_path::is_normalized(target_root) {
        return Err(PlanError::InvalidTargetRoot {
            target_root: target_root.to_string(),
        });
    }

    let mut plan = InstallPlan::default();
    if entries.is_empty() {
        return Ok(plan);
    }

    let strip = match strategy {
        InstallStrategy::DirectExtract => None,
        InstallStrategy::RootDetect => match detect_root(&entries, markers) {
            Some(RootLocation::TopLevel) => None,
            Some(RootLocation::Subfolder(name)) => Some(name),
            None => {
                return Err(PlanError::NoRootFound {
                    markers: markers.to_vec(),
                });
            }
        },
    };
    plan.detected_root = strip.clone();

    for entry in entries {
        let Some(mut segments) = entry_segments(&entry) else {
            warn!(path = %entry.relative_path, "skipping archive entry with unsafe path");
            continue;
        };

        if let Some(root) = strip.as_deref() {
            if segments.first() != Some(&root) {
                debug!(path = %entry.relative_path, "skipping entry outside detected root");
                continue;
            }
            segments.remove(0);
        }
        if segments.is_empty() {
            continue;
        }

        let full = guest_path::join(target_root, &segments.join("/"));
        let mut dir = if entry.is_directory {
            Some(full.clone())
        } else {
            guest_path::parent(&full)
        };
        while let Some(current) = dir {
            if current == guest_path::ROOT || !guest_path::is_within(&current, target_root) {
                break;
            }
            let reached_root = current == target_root;
            // Ancestors of an already-planned directory are planned too
            if !plan.directories.insert(current.clone()) && !reached_root {
                break;
            }
            if reached_root {
                break;
            }
            dir = guest_path::parent(&current);
        }

        if !entry.is_directory {
            plan.writes.push(PlannedWrite {
                device_path: full,
                content: entry.content,
            });
        }
    }

    debug!(
        target_root,
        directories = plan.directories.len(),
        files = plan.writes.len(),
        detected_root = ?plan.detected_root,
        "planned install"
    );
    Ok(plan)
}

/// Derive the device-relative install root from an archive's file name
///
/// `MyMod.zip` installs under `/MyMod`. Directory components in the name are
/// ignored and the extension check is case-insensitive.
///
/// # Errors
///
/// Returns [`Error::InvalidArchive`] if the name does not end in `.zip` or
/// has nothing before the extension.
pub fn target_root_for_archive(file_name: &str) -> Result<String, Error> {
    let invalid = |reason: &str| Error::InvalidArchive {
        name: file_name.to_string(),
        reason: reason.to_string(),
    };

    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    let path = Path::new(base);
    let is_zip = path
        .extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("zip"));
    if !is_zip {
        return Err(invalid("only .zip archives are supported"));
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    if stem.is_empty() || stem == "." || stem == ".." {
        return Err(invalid("archive name has no usable stem"));
    }

    Ok(guest_path::join(guest_path::ROOT, &stem))
}
