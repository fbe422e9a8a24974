//! Explicit engine process control: launch, stop, restart.

use crate::error::{Error, Result};
use crate::lifecycle::TrackerState;
use crate::types::{EngineProfile, Event, ProcessHandle};

use super::ModInstaller;

impl ModInstaller {
    /// Look up a registered engine
    pub(super) fn engine(&self, engine_id: &str) -> Result<EngineProfile> {
        self.registry
            .lookup(engine_id)
            .cloned()
            .ok_or_else(|| Error::UnknownEngine(engine_id.to_string()))
    }

    /// Launch an engine when none is running
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownEngine`] if `engine_id` is not registered
    /// - [`Error::Launch`] if a process is already tracked or the guest
    ///   refused to start the executable
    pub async fn launch(&self, engine_id: &str) -> Result<ProcessHandle> {
        let engine = self.engine(engine_id)?;
        let mut tracker = self.tracker.lock().await;
        let handle = tracker
            .launch(&engine, self.ports.filesystem.as_ref())
            .await?;

        self.emit_event(Event::ProcessLaunched {
            pid: handle.pid,
            engine_id: handle.engine_id.clone(),
        });
        Ok(handle)
    }

    /// Stop the tracked engine process, if any
    ///
    /// Returns the handle that was tracked.
    pub async fn stop(&self) -> Option<ProcessHandle> {
        let stopped = self
            .tracker
            .lock()
            .await
            .stop_if_running(self.ports.filesystem.as_ref())
            .await;

        if let Some(handle) = &stopped {
            self.emit_event(Event::ProcessStopped {
                pid: handle.pid,
                engine_id: handle.engine_id.clone(),
            });
        }
        stopped
    }

    /// Stop whatever is running and launch `engine_id`
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownEngine`] if `engine_id` is not registered (nothing is stopped)
    /// - [`Error::Launch`] if the new process could not be started; the
    ///   tracker is left `Stopped`
    pub async fn restart(&self, engine_id: &str) -> Result<ProcessHandle> {
        let engine = self.engine(engine_id)?;
        self.restart_engine(&engine).await
    }

    /// Snapshot of the tracked process state
    pub async fn process_state(&self) -> TrackerState {
        self.tracker.lock().await.state().clone()
    }
}
