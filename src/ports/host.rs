//! Host-directory guest adapter
//!
//! Maps the guest namespace onto a directory on the host: guest path `/a/b`
//! becomes `<root>/a/b`. Executables are started with `tokio::process`.

use super::traits::{DirEntry, FilesystemPort, RunOptions, RunOutcome, Signal, WritablePort};
use crate::guest_path;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Resolve a guest path below `root`, rejecting `..` segments
fn resolve(root: &Path, path: &str) -> io::Result<PathBuf> {
    if path.split('/').any(|segment| segment == "..") {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("path escapes the guest root: {}", path),
        ));
    }
    let normalized = guest_path::normalize(path);
    let mut resolved = root.to_path_buf();
    resolved.extend(normalized.split('/').filter(|s| !s.is_empty()));
    Ok(resolved)
}

/// Split `KEY=VALUE` pairs; entries without `=` are ignored
fn env_pairs(env: &[String]) -> impl Iterator<Item = (&str, &str)> {
    env.iter().filter_map(|pair| pair.split_once('='))
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: Signal) -> io::Result<()> {
    let signum = match signal {
        Signal::Terminate => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    let raw_pid =
        libc::pid_t::try_from(pid).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // SAFETY: kill(2) takes plain integers and has no memory effects.
    // The pid belongs to a child we still own and have not reaped, so
    // it cannot have been recycled for an unrelated process.
    if unsafe { libc::kill(raw_pid, signum) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Hard-kill a child whose signal was not delivered, then reap it in the
/// background so it never lingers as a zombie
fn settle_signalled(pid: u32, mut child: Child, delivered: io::Result<()>) -> io::Result<()> {
    let result = match delivered {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!(pid, error = %e, "signal delivery failed, killing guest process");
            child.start_kill().map_err(|_| e)
        }
    };

    tokio::spawn(async move {
        if let Err(e) = child.wait().await {
            warn!(pid, error = %e, "failed to reap guest process");
        }
    });
    result
}

/// Guest backed by a host directory
#[derive(Clone, Debug)]
pub struct HostGuest {
    root: PathBuf,
    children: Arc<Mutex<HashMap<u32, Child>>>,
}

impl HostGuest {
    /// Create a guest rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            children: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Host directory the guest root maps to
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host path for a guest path
    pub fn host_path(&self, path: &str) -> io::Result<PathBuf> {
        resolve(&self.root, path)
    }

    /// The mod-storage device mounted at `mount_prefix` in this guest
    pub fn device(&self, mount_prefix: &str) -> io::Result<HostDevice> {
        Ok(HostDevice::new(self.host_path(mount_prefix)?))
    }
}

#[async_trait]
impl FilesystemPort for HostGuest {
    async fn create_dir_all(&self, path: &str) -> io::Result<()> {
        let target = self.host_path(path)?;
        tokio::fs::create_dir_all(&target).await
    }

    async fn run(
        &self,
        path: &str,
        args: &[String],
        options: &RunOptions,
    ) -> io::Result<RunOutcome> {
        let executable = self.host_path(path)?;
        let mut command = Command::new(&executable);
        command.args(args).envs(env_pairs(&options.env));

        let mut child = command.spawn()?;
        let pid = child
            .id()
            .ok_or_else(|| io::Error::other("process exited before its pid was read"))?;
        debug!(pid, executable = %executable.display(), "spawned guest process");

        if options.background {
            self.children.lock().await.insert(pid, child);
            return Ok(RunOutcome {
                pid,
                exit_code: None,
            });
        }

        let status = child.wait().await?;
        Ok(RunOutcome {
            pid,
            exit_code: status.code(),
        })
    }

    async fn signal(&self, pid: u32, signal: Signal) -> io::Result<()> {
        let child = self.children.lock().await.remove(&pid).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such process: {}", pid))
        })?;

        #[cfg(unix)]
        let delivered = send_signal(pid, signal);
        // Without signals the fallback kill below stops the child
        #[cfg(not(unix))]
        let delivered = {
            let _ = signal;
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "signals are not supported on this platform",
            ))
        };

        settle_signalled(pid, child, delivered)
    }

    async fn list_dir(&self, path: &str) -> io::Result<Vec<DirEntry>> {
        let target = self.host_path(path)?;
        let mut reader = tokio::fs::read_dir(&target).await?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let is_dir = entry.file_type().await?.is_dir();
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn write_file(&self, path: &str, contents: &[u8]) -> io::Result<()> {
        let target = self.host_path(path)?;
        tokio::fs::write(&target, contents).await
    }

    async fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        let target = self.host_path(path)?;
        tokio::fs::read(&target).await
    }

    fn name(&self) -> &'static str {
        "host"
    }
}

/// Mod-storage device backed by a host directory
#[derive(Clone, Debug)]
pub struct HostDevice {
    root: PathBuf,
}

impl HostDevice {
    /// Create a device whose root is `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Host directory the device root maps to
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl WritablePort for HostDevice {
    async fn write_file(&self, device_path: &str, contents: &[u8]) -> io::Result<()> {
        let target = resolve(&self.root, device_path)?;
        tokio::fs::write(&target, contents).await
    }

    fn name(&self) -> &'static str {
        "host-device"
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_maps_under_root() {
        let root = Path::new("/srv/guest");
        assert_eq!(
            resolve(root, "/mods/m/a.txt").unwrap(),
            PathBuf::from("/srv/guest/mods/m/a.txt")
        );
        assert_eq!(resolve(root, "/").unwrap(), PathBuf::from("/srv/guest"));
    }

    #[test]
    fn test_resolve_rejects_parent_segments() {
        let err = resolve(Path::new("/srv/guest"), "/mods/../../etc").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_env_pairs() {
        let env = vec!["DISPLAY=:0".to_string(), "BROKEN".to_string(), "A=b=c".to_string()];
        let pairs: Vec<_> = env_pairs(&env).collect();
        assert_eq!(pairs, vec![("DISPLAY", ":0"), ("A", "b=c")]);
    }

    #[tokio::test]
    async fn test_round_trip_through_host_dir() {
        let dir = tempfile::tempdir().unwrap();
        let guest = HostGuest::new(dir.path());

        guest.create_dir_all("/mods/m/data").await.unwrap();
        guest.write_file("/mods/m/data/a.json", b"{}").await.unwrap();
        assert_eq!(guest.read_file("/mods/m/data/a.json").await.unwrap(), b"{}");
        assert!(dir.path().join("mods/m/data/a.json").is_file());
    }

    #[tokio::test]
    async fn test_device_writes_below_mount() {
        let dir = tempfile::tempdir().unwrap();
        let guest = HostGuest::new(dir.path());
        guest.create_dir_all("/mods/m").await.unwrap();

        let device = guest.device("/mods").unwrap();
        device.write_file("/m/x.txt", b"x").await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("mods/m/x.txt")).unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_list_dir() {
        let dir = tempfile::tempdir().unwrap();
        let guest = HostGuest::new(dir.path());
        guest.create_dir_all("/b").await.unwrap();
        guest.write_file("/a.txt", b"").await.unwrap();

        let entries = guest.list_dir("/").await.unwrap();
        assert_eq!(entries, vec![DirEntry::file("a.txt"), DirEntry::dir("b")]);
    }

    #[tokio::test]
    async fn test_run_missing_executable_fails() {
        let dir = tempfile::tempdir().unwrap();
        let guest = HostGuest::new(dir.path());
        let options = RunOptions {
            env: vec!["DISPLAY=:0".into()],
            background: true,
        };
        let err = guest.run("/usr/bin/nope", &[], &options).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_signal_unknown_pid() {
        let dir = tempfile::tempdir().unwrap();
        let guest = HostGuest::new(dir.path());
        let err = guest.signal(4_000_000, Signal::Terminate).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_undelivered_signal_still_kills_and_reaps() {
        let Some(sleep) = ["/bin/sleep", "/usr/bin/sleep"]
            .into_iter()
            .map(Path::new)
            .find(|p| p.exists())
        else {
            return;
        };
        let child = Command::new(sleep).arg("30").spawn().unwrap();
        let pid = child.id().unwrap();

        settle_signalled(pid, child, Err(io::Error::other("refused"))).unwrap();

        let raw_pid = libc::pid_t::try_from(pid).unwrap();
        let gone = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            // SAFETY: signal 0 only checks that the pid exists
            while unsafe { libc::kill(raw_pid, 0) } == 0 {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(gone.is_ok(), "process {pid} was not killed and reaped");
    }
}
