//! Path helpers for the guest filesystem namespace
//!
//! Every path handed to a port, stored in a plan, or held by the explorer
//! cursor follows the same format: absolute, `/`-separated, no empty
//! segments, and no trailing slash except for the root itself.

/// The guest (and device) root
pub const ROOT: &str = "/";

/// Normalize a path into canonical guest form
///
/// Empty and `.` segments are dropped, `..` pops one segment (saturating at
/// the root), and relative input is treated as relative to the root.
///
/// # Examples
///
/// ```
/// use modstage::guest_path::normalize;
///
/// assert_eq!(normalize("mods//mymod/./data/"), "/mods/mymod/data");
/// assert_eq!(normalize("/a/b/../c"), "/a/c");
/// assert_eq!(normalize(""), "/");
/// ```
pub fn normalize(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }

    if stack.is_empty() {
        ROOT.to_string()
    } else {
        format!("/{}", stack.join("/"))
    }
}

/// Whether `path` is already in canonical form
pub fn is_normalized(path: &str) -> bool {
    normalize(path) == path
}

/// Join a child path onto a base and normalize the result
///
/// # Examples
///
/// ```
/// use modstage::guest_path::join;
///
/// assert_eq!(join("/", "mymod"), "/mymod");
/// assert_eq!(join("/mods", "/mymod/data"), "/mods/mymod/data");
/// ```
pub fn join(base: &str, child: &str) -> String {
    normalize(&format!("{}/{}", base, child))
}

/// Parent of a path, or `None` for the root
pub fn parent(path: &str) -> Option<String> {
    let normalized = normalize(path);
    if normalized == ROOT {
        return None;
    }
    match normalized.rsplit_once('/') {
        Some(("", _)) | None => Some(ROOT.to_string()),
        Some((head, _)) => Some(head.to_string()),
    }
}

/// Last segment of a path, or `None` for the root
pub fn file_name(path: &str) -> Option<String> {
    let normalized = normalize(path);
    normalized
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Map a device-relative path into the guest namespace under `mount_prefix`
pub fn mounted(mount_prefix: &str, device_path: &str) -> String {
    join(mount_prefix, device_path)
}

/// Whether `path` equals `ancestor` or lies below it (both normalized)
pub fn is_within(path: &str, ancestor: &str) -> bool {
    let path = normalize(path);
    let ancestor = normalize(ancestor);
    if ancestor == ROOT || path == ancestor {
        return true;
    }
    path.strip_prefix(&ancestor)
        .is_some_and(|rest| rest.starts_with('/'))
}
