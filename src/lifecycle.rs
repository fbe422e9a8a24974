//! Engine process lifecycle
//!
//! [`ProcessTracker`] owns the single tracked engine process. Its transitions
//! are explicit:
//!
//! ```text
//! Stopped --launch ok--> Running(h)
//! Stopped --launch err-> Stopped
//! Running(h) --stop----> Stopped        (signal failures are logged, not returned)
//! Running(h) --launch--> error AlreadyRunning, state unchanged
//! ```
//!
//! `restart` is `stop_if_running` followed by `launch`, so a successful
//! restart always moves `Running(h)` to `Running(h')` with a new handle, and a
//! failed one ends in `Stopped`. Two handles are never tracked at once.
//!
//! The tracker is not internally synchronized; the installer keeps it behind
//! an async mutex.

use crate::error::{LaunchCause, LaunchError};
use crate::ports::{FilesystemPort, RunOptions, Signal};
use crate::types::{EngineProfile, ProcessHandle};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

/// State of the tracked engine process
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "process", rename_all = "snake_case")]
pub enum TrackerState {
    /// No process is tracked
    #[default]
    Stopped,
    /// This process was launched and has not been stopped
    Running(ProcessHandle),
}

/// Owner of the single tracked engine process
#[derive(Debug)]
pub struct ProcessTracker {
    state: TrackerState,
    launch_env: Vec<String>,
}

impl ProcessTracker {
    /// Create a stopped tracker that launches processes with `launch_env`
    pub fn new(launch_env: Vec<String>) -> Self {
        Self {
            state: TrackerState::Stopped,
            launch_env,
        }
    }

    /// Current state
    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    /// The tracked process, if any
    pub fn handle(&self) -> Option<&ProcessHandle> {
        match &self.state {
            TrackerState::Running(handle) => Some(handle),
            TrackerState::Stopped => None,
        }
    }

    /// Whether a process is tracked
    pub fn is_running(&self) -> bool {
        matches!(self.state, TrackerState::Running(_))
    }

    /// Launch the engine in the background
    ///
    /// # Errors
    ///
    /// - [`LaunchCause::AlreadyRunning`] if a process is already tracked
    /// - [`LaunchCause::Runtime`] if the guest refused to start the executable;
    ///   the tracker stays `Stopped`
    pub async fn launch(
        &mut self,
        engine: &EngineProfile,
        fs: &dyn FilesystemPort,
    ) -> Result<ProcessHandle, LaunchError> {
        if let TrackerState::Running(handle) = &self.state {
            return Err(LaunchError {
                executable_path: engine.executable_path.clone(),
                cause: LaunchCause::AlreadyRunning { pid: handle.pid },
            });
        }

        let options = RunOptions {
            env: self.launch_env.clone(),
            background: true,
        };
        let outcome = fs
            .run(&engine.executable_path, &[], &options)
            .await
            .map_err(|e| LaunchError {
                executable_path: engine.executable_path.clone(),
                cause: LaunchCause::Runtime(e),
            })?;

        let handle = ProcessHandle {
            pid: outcome.pid,
            engine_id: engine.id.clone(),
            started_at: Utc::now(),
        };
        info!(
            pid = handle.pid,
            engine_id = %engine.id,
            executable = %engine.executable_path,
            "launched engine process"
        );
        self.state = TrackerState::Running(handle.clone());
        Ok(handle)
    }

    /// Terminate the tracked process, if there is one
    ///
    /// A failed signal usually means the process already exited; it is
    /// logged and the tracker moves to `Stopped` regardless. Returns the
    /// handle that was tracked.
    pub async fn stop_if_running(&mut self, fs: &dyn FilesystemPort) -> Option<ProcessHandle> {
        let TrackerState::Running(handle) = std::mem::take(&mut self.state) else {
            return None;
        };

        match fs.signal(handle.pid, Signal::Terminate).await {
            Ok(()) => info!(pid = handle.pid, engine_id = %handle.engine_id, "stopped engine process"),
            Err(e) => warn!(
                pid = handle.pid,
                engine_id = %handle.engine_id,
                error = %e,
                "failed to signal engine process, treating it as stopped"
            ),
        }
        Some(handle)
    }

    /// Stop the tracked process (if any), then launch `engine`
    ///
    /// # Errors
    ///
    /// Returns the launch error; the tracker is `Stopped` afterwards.
    pub async fn restart(
        &mut self,
        engine: &EngineProfile,
        fs: &dyn FilesystemPort,
    ) -> Result<ProcessHandle, LaunchError> {
        self.stop_if_running(fs).await;
        self.launch(engine, fs).await
    }
}

impl Default for ProcessTracker {
    fn default() -> Self {
        Self::new(vec!["DISPLAY=:0".to_string()])
    }
}
