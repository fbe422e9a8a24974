//! Test installer construction

use modstage::ports::{HostGuest, MemoryGuest};
use modstage::{Config, EngineProfile, GuestPorts, InstallStrategy, ModInstaller};
use std::path::Path;
use tempfile::TempDir;

/// Guest path of the engine executable used by host tests
pub const HOST_ENGINE_PATH: &str = "/bin/engine";

/// Create an installer over a fresh in-memory guest with every built-in
/// engine executable present
pub fn memory_installer() -> (MemoryGuest, ModInstaller) {
    let config = Config::default();
    let guest = MemoryGuest::new(&config.mount_prefix);
    for engine in &config.engines {
        guest.install_executable(&engine.executable_path);
    }
    let installer = ModInstaller::new(config, GuestPorts::memory(&guest))
        .expect("failed to create installer");
    (guest, installer)
}

/// Config with two host engines sharing one executable
pub fn host_config() -> Config {
    Config {
        engines: vec![
            EngineProfile::new(
                "flat",
                "Flat",
                "extracts as-is",
                HOST_ENGINE_PATH,
                InstallStrategy::DirectExtract,
            ),
            EngineProfile::new(
                "detect",
                "Detect",
                "finds the mod root",
                HOST_ENGINE_PATH,
                InstallStrategy::RootDetect,
            ),
        ],
        ..Default::default()
    }
}

/// A host binary that exits immediately, if the system has one
pub fn host_true_binary() -> Option<&'static Path> {
    ["/bin/true", "/usr/bin/true"]
        .into_iter()
        .map(Path::new)
        .find(|p| p.exists())
}

/// Create an installer over a temporary host directory
///
/// The mount point exists. When `with_engine` is set, the engine executable
/// is a symlink to the system `true` binary; returns `None` if there is none.
#[cfg(unix)]
pub fn host_installer(with_engine: bool) -> Option<(TempDir, HostGuest, ModInstaller)> {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = host_config();
    let guest = HostGuest::new(dir.path());

    std::fs::create_dir_all(guest.host_path(&config.mount_prefix).expect("mount path"))
        .expect("failed to create mount point");

    if with_engine {
        let target = host_true_binary()?;
        let link = guest.host_path(HOST_ENGINE_PATH).expect("engine path");
        std::fs::create_dir_all(link.parent().expect("engine dir"))
            .expect("failed to create engine dir");
        std::os::unix::fs::symlink(target, &link).expect("failed to link engine");
    }

    let ports =
        GuestPorts::host(guest.clone(), &config.mount_prefix).expect("failed to create ports");
    let installer = ModInstaller::new(config, ports).expect("failed to create installer");
    Some((dir, guest, installer))
}
