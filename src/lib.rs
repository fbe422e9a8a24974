//! # modstage
//!
//! Stages mod archives into a guest filesystem and restarts the guest's
//! engine process so the new content is picked up.
//!
//! ## Design Philosophy
//!
//! modstage is designed to be:
//! - **Port-driven** - The guest filesystem, mod-storage device, and archive
//!   decoder are traits; in-memory and host-directory adapters are included
//! - **Sensible defaults** - Works out of the box with the stock engine table
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Pipeline
//!
//! An install runs these stages in order, stopping at the first failure:
//!
//! 1. Look up the engine and derive the target root from the archive name
//! 2. Decode the archive ([`ports::ArchiveSource`])
//! 3. Plan directories and writes ([`planner::plan`])
//! 4. Create every directory ([`materializer::materialize`])
//! 5. Write every file concurrently ([`writer::write_all`])
//! 6. Restart the engine process ([`lifecycle::ProcessTracker`])
//!
//! ## Quick Start
//!
//! ```no_run
//! use modstage::{Config, GuestPorts, ModArchive, ModInstaller};
//! use modstage::ports::HostGuest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let ports = GuestPorts::host(HostGuest::new("/srv/guest"), &config.mount_prefix)?;
//!     let installer = ModInstaller::new(config, ports)?;
//!
//!     // Subscribe to events
//!     let mut events = installer.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     installer.launch("vslice").await?;
//!     let bytes = std::fs::read("MyMod.zip")?;
//!     let report = installer
//!         .install_and_restart(ModArchive::new("MyMod.zip", bytes), "vslice")
//!         .await?;
//!     println!("installed {} files under {}", report.files_written, report.target_root);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Guest filesystem navigation
pub mod explorer;
/// Guest path format helpers
pub mod guest_path;
/// Install orchestration
pub mod installer;
/// Engine process lifecycle
pub mod lifecycle;
/// Directory creation
pub mod materializer;
/// Path planning
pub mod planner;
/// Guest-facing ports and adapters
pub mod ports;
/// Engine registry
pub mod registry;
/// Core types and events
pub mod types;
/// Concurrent file writes
pub mod writer;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, ErrorReport, IoError, LaunchCause, LaunchError, PlanError, Result};
pub use explorer::{ExplorerCursor, Listing};
pub use installer::{GuestPorts, ModInstaller};
pub use lifecycle::{ProcessTracker, TrackerState};
pub use registry::EngineRegistry;
pub use types::{
    ArchiveEntry, EngineProfile, Event, InstallPlan, InstallReport, InstallStrategy, ModArchive,
    PlannedWrite, ProcessHandle, Stage, UploadFile,
};

/// Run until a termination signal arrives, then stop the engine process.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// Returns the handle of the process that was stopped, if one was running.
///
/// # Example
///
/// ```no_run
/// use modstage::{Config, GuestPorts, ModInstaller, run_with_shutdown};
/// use modstage::ports::HostGuest;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let ports = GuestPorts::host(HostGuest::new("/srv/guest"), &config.mount_prefix)?;
///     let installer = ModInstaller::new(config, ports)?;
///     installer.launch("default").await?;
///
///     // Stop the engine when the host process is asked to exit
///     run_with_shutdown(installer).await;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(installer: ModInstaller) -> Option<ProcessHandle> {
    wait_for_signal().await;
    installer.stop().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration can fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
