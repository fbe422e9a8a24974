//! In-memory guest: filesystem tree, process table, and mod-storage device

use super::traits::{DirEntry, FilesystemPort, RunOptions, RunOutcome, Signal, WritablePort};
use crate::guest_path;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const FIRST_PID: u32 = 100;

/// One operation observed by a [`MemoryGuest`], in the order it was applied
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuestOp {
    /// `create_dir_all` on a guest path
    CreateDir(String),
    /// File write at a guest path (through either the namespace or the device)
    Write(String),
    /// Executable started
    Run {
        /// Executable path
        path: String,
        /// Assigned pid
        pid: u32,
    },
    /// Signal delivered
    Signal {
        /// Target pid
        pid: u32,
        /// Delivered signal
        signal: Signal,
    },
}

/// A process started by [`FilesystemPort::run`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryProcess {
    /// Executable path
    pub path: String,
    /// Arguments
    pub args: Vec<String>,
    /// Environment as `KEY=VALUE` pairs
    pub env: Vec<String>,
}

#[derive(Debug, Default)]
struct Faults {
    create_dir: HashSet<String>,
    write: HashMap<String, io::ErrorKind>,
    run: HashSet<String>,
    signal: bool,
}

#[derive(Debug)]
struct GuestState {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    processes: BTreeMap<u32, MemoryProcess>,
    next_pid: u32,
    ops: Vec<GuestOp>,
    faults: Faults,
    write_delays: HashMap<String, Duration>,
}

impl GuestState {
    fn new() -> Self {
        let mut dirs = BTreeSet::new();
        dirs.insert(guest_path::ROOT.to_string());
        Self {
            dirs,
            files: BTreeMap::new(),
            processes: BTreeMap::new(),
            next_pid: FIRST_PID,
            ops: Vec::new(),
            faults: Faults::default(),
            write_delays: HashMap::new(),
        }
    }

    fn create_dir_all(&mut self, path: &str) -> io::Result<()> {
        let mut chain = vec![path.to_string()];
        let mut current = path.to_string();
        while let Some(parent) = guest_path::parent(&current) {
            chain.push(parent.clone());
            current = parent;
        }
        for dir in &chain {
            if self.files.contains_key(dir) {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} exists and is not a directory", dir),
                ));
            }
        }
        self.dirs.extend(chain);
        Ok(())
    }

    fn write_file(&mut self, path: &str, contents: &[u8]) -> io::Result<()> {
        if let Some(kind) = self.faults.write.get(path) {
            return Err(io::Error::new(*kind, "injected write failure"));
        }
        if self.dirs.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("{} is a directory", path),
            ));
        }
        let parent = guest_path::parent(path).unwrap_or_else(|| guest_path::ROOT.to_string());
        if !self.dirs.contains(&parent) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("parent directory {} does not exist", parent),
            ));
        }
        self.files.insert(path.to_string(), contents.to_vec());
        self.ops.push(GuestOp::Write(path.to_string()));
        Ok(())
    }
}

/// In-process guest with a path tree, process table, and failure injection
///
/// Cloning shares the same state. The mod-storage device is a view
/// ([`MemoryDevice`]) whose writes land under the mount prefix.
///
/// # Examples
///
/// ```
/// use modstage::ports::{FilesystemPort, MemoryGuest, WritablePort};
///
/// # #[tokio::main]
/// # async fn main() -> std::io::Result<()> {
/// let guest = MemoryGuest::new("/mods");
/// guest.create_dir_all("/mods/mymod").await?;
/// guest.device().write_file("/mymod/readme.txt", b"hi").await?;
/// assert_eq!(guest.file("/mods/mymod/readme.txt"), Some(b"hi".to_vec()));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct MemoryGuest {
    state: Arc<Mutex<GuestState>>,
    mount_prefix: String,
}

impl MemoryGuest {
    /// Create a guest with the device mounted at `mount_prefix`
    pub fn new(mount_prefix: &str) -> Self {
        let mount_prefix = guest_path::normalize(mount_prefix);
        let mut state = GuestState::new();
        // The mount point exists as soon as the device is attached
        let _ = state.create_dir_all(&mount_prefix);
        Self {
            state: Arc::new(Mutex::new(state)),
            mount_prefix,
        }
    }

    fn lock(&self) -> MutexGuard<'_, GuestState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The mod-storage device mounted under this guest's prefix
    pub fn device(&self) -> MemoryDevice {
        MemoryDevice {
            guest: self.clone(),
        }
    }

    /// Mount prefix of the device
    pub fn mount_prefix(&self) -> &str {
        &self.mount_prefix
    }

    /// Place an executable file at `path`, creating its parent directories
    pub fn install_executable(&self, path: &str) {
        let path = guest_path::normalize(path);
        let mut state = self.lock();
        if let Some(parent) = guest_path::parent(&path) {
            let _ = state.create_dir_all(&parent);
        }
        state.files.insert(path, b"#!/bin/sh\n".to_vec());
    }

    /// Make `create_dir_all` fail for this guest path
    pub fn fail_create_dir(&self, path: &str) {
        self.lock()
            .faults
            .create_dir
            .insert(guest_path::normalize(path));
    }

    /// Make writes to this guest path fail with the given kind
    pub fn fail_write(&self, path: &str, kind: io::ErrorKind) {
        self.lock()
            .faults
            .write
            .insert(guest_path::normalize(path), kind);
    }

    /// Make `run` fail for this executable path
    pub fn fail_run(&self, path: &str) {
        self.lock().faults.run.insert(guest_path::normalize(path));
    }

    /// Make every `signal` call fail
    pub fn fail_signals(&self, fail: bool) {
        self.lock().faults.signal = fail;
    }

    /// Delay writes to this guest path before they are applied
    pub fn delay_write(&self, path: &str, delay: Duration) {
        self.lock()
            .write_delays
            .insert(guest_path::normalize(path), delay);
    }

    /// Simulate a process exiting on its own
    pub fn exit_process(&self, pid: u32) -> bool {
        self.lock().processes.remove(&pid).is_some()
    }

    /// Pids of processes that are still running
    pub fn running_pids(&self) -> Vec<u32> {
        self.lock().processes.keys().copied().collect()
    }

    /// Details of a running process
    pub fn process(&self, pid: u32) -> Option<MemoryProcess> {
        self.lock().processes.get(&pid).cloned()
    }

    /// Content of the file at a guest path
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(&guest_path::normalize(path)).cloned()
    }

    /// Whether a directory exists at a guest path
    pub fn is_dir(&self, path: &str) -> bool {
        self.lock().dirs.contains(&guest_path::normalize(path))
    }

    /// Every directory in the tree, sorted
    pub fn directories(&self) -> Vec<String> {
        self.lock().dirs.iter().cloned().collect()
    }

    /// Every file path in the tree, sorted
    pub fn files(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    /// Operations applied so far, oldest first
    pub fn operations(&self) -> Vec<GuestOp> {
        self.lock().ops.clone()
    }

    async fn apply_write(&self, path: &str, contents: &[u8]) -> io::Result<()> {
        let delay = self.lock().write_delays.get(path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.lock().write_file(path, contents)
    }
}

impl Default for MemoryGuest {
    fn default() -> Self {
        Self::new("/mods")
    }
}

#[async_trait]
impl FilesystemPort for MemoryGuest {
    async fn create_dir_all(&self, path: &str) -> io::Result<()> {
        let path = guest_path::normalize(path);
        let mut state = self.lock();
        if state.faults.create_dir.contains(&path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "injected create_dir failure",
            ));
        }
        state.create_dir_all(&path)?;
        state.ops.push(GuestOp::CreateDir(path));
        Ok(())
    }

    async fn run(
        &self,
        path: &str,
        args: &[String],
        options: &RunOptions,
    ) -> io::Result<RunOutcome> {
        let path = guest_path::normalize(path);
        let mut state = self.lock();
        if state.faults.run.contains(&path) {
            return Err(io::Error::other("injected run failure"));
        }
        if !state.files.contains_key(&path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: no such executable", path),
            ));
        }

        let pid = state.next_pid;
        state.next_pid += 1;
        state.ops.push(GuestOp::Run {
            path: path.clone(),
            pid,
        });

        if options.background {
            state.processes.insert(
                pid,
                MemoryProcess {
                    path,
                    args: args.to_vec(),
                    env: options.env.clone(),
                },
            );
            Ok(RunOutcome {
                pid,
                exit_code: None,
            })
        } else {
            Ok(RunOutcome {
                pid,
                exit_code: Some(0),
            })
        }
    }

    async fn signal(&self, pid: u32, signal: Signal) -> io::Result<()> {
        let mut state = self.lock();
        if state.faults.signal {
            return Err(io::Error::other("injected signal failure"));
        }
        if state.processes.remove(&pid).is_none() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such process: {}", pid),
            ));
        }
        state.ops.push(GuestOp::Signal { pid, signal });
        Ok(())
    }

    async fn list_dir(&self, path: &str) -> io::Result<Vec<DirEntry>> {
        let path = guest_path::normalize(path);
        let state = self.lock();
        if !state.dirs.contains(&path) {
            let kind = if state.files.contains_key(&path) {
                io::ErrorKind::NotADirectory
            } else {
                io::ErrorKind::NotFound
            };
            return Err(io::Error::new(kind, format!("{}: not a directory", path)));
        }

        let is_child = |candidate: &str| {
            candidate != path && guest_path::parent(candidate).as_deref() == Some(path.as_str())
        };
        let mut entries: Vec<DirEntry> = state
            .dirs
            .iter()
            .filter(|d| is_child(d))
            .filter_map(|d| guest_path::file_name(d).map(DirEntry::dir))
            .chain(
                state
                    .files
                    .keys()
                    .filter(|f| is_child(f))
                    .filter_map(|f| guest_path::file_name(f).map(DirEntry::file)),
            )
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn write_file(&self, path: &str, contents: &[u8]) -> io::Result<()> {
        self.apply_write(&guest_path::normalize(path), contents)
            .await
    }

    async fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        let path = guest_path::normalize(path);
        self.lock().files.get(&path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{}: no such file", path))
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Mod-storage device view of a [`MemoryGuest`]
///
/// Device paths are mapped under the guest's mount prefix, so anything
/// written here is visible through the guest namespace.
#[derive(Clone, Debug)]
pub struct MemoryDevice {
    guest: MemoryGuest,
}

impl MemoryDevice {
    /// Guest path a device path is visible at
    pub fn guest_path(&self, device_path: &str) -> String {
        guest_path::mounted(&self.guest.mount_prefix, device_path)
    }

    /// Make writes to this device path fail with the given kind
    pub fn fail_write(&self, device_path: &str, kind: io::ErrorKind) {
        self.guest.fail_write(&self.guest_path(device_path), kind);
    }

    /// Delay writes to this device path
    pub fn delay_write(&self, device_path: &str, delay: Duration) {
        self.guest
            .delay_write(&self.guest_path(device_path), delay);
    }

    /// Content of the file at a device path
    pub fn file(&self, device_path: &str) -> Option<Vec<u8>> {
        self.guest.file(&self.guest_path(device_path))
    }
}

#[async_trait]
impl WritablePort for MemoryDevice {
    async fn write_file(&self, device_path: &str, contents: &[u8]) -> io::Result<()> {
        self.guest
            .apply_write(&self.guest_path(device_path), contents)
            .await
    }

    fn name(&self) -> &'static str {
        "memory-device"
    }
}
