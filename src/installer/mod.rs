//! Install orchestration
//!
//! [`ModInstaller`] ties the pipeline together. Its methods are split by
//! concern:
//! - [`install`] - `install_and_restart` and advanced-mode uploads
//! - [`control`] - explicit launch, stop, and restart of the engine process
//! - [`guard`] - the single-flight flag that rejects overlapping installs

mod control;
mod guard;
mod install;


use crate::config::Config;
use crate::error::Result;
use crate::lifecycle::ProcessTracker;
use crate::ports::{
    ArchiveSource, FilesystemPort, HostGuest, MemoryGuest, WritablePort, ZipArchiveSource,
};
use crate::registry::EngineRegistry;
use crate::types::{EngineProfile, Event};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, broadcast};

/// The guest-side ports the installer drives
#[derive(Clone)]
pub struct GuestPorts {
    /// Guest filesystem namespace and process runtime
    pub filesystem: Arc<dyn FilesystemPort>,
    /// Mod-storage device mounted under the configured prefix
    pub device: Arc<dyn WritablePort>,
    /// Archive decoder
    pub archives: Arc<dyn ArchiveSource>,
}

impl GuestPorts {
    /// Ports backed by an in-memory guest, decoding zip archives
    pub fn memory(guest: &MemoryGuest) -> Self {
        Self {
            filesystem: Arc::new(guest.clone()),
            device: Arc::new(guest.device()),
            archives: Arc::new(ZipArchiveSource),
        }
    }

    /// Ports backed by a host directory, with the device at `mount_prefix`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the mount prefix escapes the
    /// guest root or the mount point is not a directory on the host.
    pub fn host(guest: HostGuest, mount_prefix: &str) -> Result<Self> {
        let device = guest.device(mount_prefix)?;
        if !device.root().is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("mount point {} is not a directory", device.root().display()),
            )
            .into());
        }
        Ok(Self {
            filesystem: Arc::new(guest),
            device: Arc::new(device),
            archives: Arc::new(ZipArchiveSource),
        })
    }
}

impl std::fmt::Debug for GuestPorts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestPorts")
            .field("filesystem", &self.filesystem.name())
            .field("device", &self.device.name())
            .field("archives", &self.archives.name())
            .finish()
    }
}

/// Installs mods into the guest and keeps the engine process in step
/// (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct ModInstaller {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Engine lookup table
    pub(crate) registry: Arc<EngineRegistry>,
    /// Guest-side ports
    pub(crate) ports: GuestPorts,
    /// The single tracked engine process
    pub(crate) tracker: Arc<Mutex<ProcessTracker>>,
    /// Set while an install is running
    pub(crate) in_flight: Arc<AtomicBool>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
}

impl ModInstaller {
    /// Create an installer over the given guest ports
    ///
    /// The configuration is validated and its engine table becomes the
    /// registry. No process is started.
    ///
    /// # Examples
    ///
    /// ```
    /// use modstage::{Config, GuestPorts, ModInstaller};
    /// use modstage::ports::MemoryGuest;
    ///
    /// let guest = MemoryGuest::default();
    /// let installer = ModInstaller::new(Config::default(), GuestPorts::memory(&guest)).unwrap();
    /// assert!(installer.engines().iter().any(|e| e.id == "vslice"));
    /// ```
    pub fn new(config: Config, ports: GuestPorts) -> Result<Self> {
        config.validate()?;
        let registry = EngineRegistry::new(config.engines.clone())?;
        let (event_tx, _rx) = broadcast::channel(config.event_capacity);
        let tracker = ProcessTracker::new(config.launch_env.clone());

        tracing::info!(
            filesystem = ports.filesystem.name(),
            device = ports.device.name(),
            archives = ports.archives.name(),
            mount_prefix = %config.mount_prefix,
            engines = registry.list().len(),
            "mod installer initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            ports,
            tracker: Arc::new(Mutex::new(tracker)),
            in_flight: Arc::new(AtomicBool::new(false)),
            event_tx,
        })
    }

    /// Subscribe to install and process events
    ///
    /// Each subscriber receives every event sent after it subscribed. A
    /// subscriber that falls more than `event_capacity` events behind gets
    /// `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Registered engines
    pub fn engines(&self) -> &[EngineProfile] {
        self.registry.list()
    }

    /// Get the current configuration
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Whether an install is currently running
    pub fn is_installing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Send an event to all subscribers; dropped when nobody is listening
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

impl std::fmt::Debug for ModInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModInstaller")
            .field("ports", &self.ports)
            .field("mount_prefix", &self.config.mount_prefix)
            .field("installing", &self.is_installing())
            .finish()
    }
}
