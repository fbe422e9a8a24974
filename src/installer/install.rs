//! Install pipeline: decode, plan, create directories, write, restart

use crate::error::{Error, IoError, Result};
use crate::guest_path;
use crate::materializer;
use crate::planner;
use crate::ports::GuestFileWriter;
use crate::types::{
    EngineProfile, Event, InstallReport, ModArchive, PlannedWrite, ProcessHandle, UploadFile,
};
use crate::writer;
use tracing::{error, info};

use super::ModInstaller;
use super::guard::InstallGuard;

impl ModInstaller {
    /// Install a mod archive for an engine, then restart the engine
    ///
    /// Runs the whole pipeline in order: engine lookup, target root from the
    /// archive name, decoding, planning, directory creation, file writes, and
    /// finally a restart of the tracked process. The first failing stage
    /// aborts the rest. Files already written stay on the device, and the
    /// engine is not restarted when staging failed.
    ///
    /// # Errors
    ///
    /// - [`Error::InstallInProgress`] if another install is running
    /// - [`Error::UnknownEngine`] if `engine_id` is not registered
    /// - [`Error::InvalidArchive`] if the archive is not a `.zip` or cannot be decoded
    /// - [`Error::Plan`] if root detection finds no marker folder
    /// - [`Error::CreateDirectory`] / [`Error::WriteFile`] with the failing path
    /// - [`Error::Launch`] if the engine could not be started again
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use modstage::{ModArchive, ModInstaller};
    /// # async fn example(installer: ModInstaller, bytes: Vec<u8>) -> modstage::Result<()> {
    /// let report = installer
    ///     .install_and_restart(ModArchive::new("MyMod.zip", bytes), "vslice")
    ///     .await?;
    /// println!("installed {} files under {}", report.files_written, report.target_root);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn install_and_restart(
        &self,
        archive: ModArchive,
        engine_id: &str,
    ) -> Result<InstallReport> {
        let Some(_guard) = InstallGuard::acquire(&self.in_flight) else {
            return Err(Error::InstallInProgress);
        };

        let archive_name = archive.file_name.clone();
        let result = self.run_install(archive, engine_id).await;
        if let Err(e) = &result {
            error!(
                archive = %archive_name,
                engine_id,
                stage = ?e.stage(),
                error = %e,
                "mod install failed"
            );
            self.emit_event(Event::InstallFailed {
                stage: e.stage(),
                error: e.to_string(),
            });
        }
        result
    }

    async fn run_install(&self, archive: ModArchive, engine_id: &str) -> Result<InstallReport> {
        let engine = self.engine(engine_id)?;

        let ModArchive { file_name, bytes } = archive;
        let target_root = planner::target_root_for_archive(&file_name)?;

        info!(
            archive = %file_name,
            engine_id = %engine.id,
            target_root = %target_root,
            strategy = ?engine.install_strategy,
            "installing mod"
        );
        self.emit_event(Event::InstallStarted {
            archive: file_name.clone(),
            engine_id: engine.id.clone(),
            target_root: target_root.clone(),
        });

        let entries = self
            .ports
            .archives
            .decode(bytes)
            .await
            .map_err(|e| Error::InvalidArchive {
                name: file_name.clone(),
                reason: e.to_string(),
            })?;

        let plan = planner::plan(
            entries,
            engine.install_strategy,
            &target_root,
            &self.config.marker_folders,
        )?;
        info!(
            directories = plan.directories.len(),
            files = plan.file_count(),
            detected_root = ?plan.detected_root,
            "install planned"
        );
        self.emit_event(Event::Planned {
            directories: plan.directories.len(),
            files: plan.file_count(),
            detected_root: plan.detected_root.clone(),
        });

        let directories_created = materializer::materialize(
            &plan.directories,
            self.ports.filesystem.as_ref(),
            &self.config.mount_prefix,
        )
        .await
        .map_err(Error::CreateDirectory)?;
        self.emit_event(Event::DirectoriesCreated {
            count: directories_created,
        });

        let detected_root = plan.detected_root;
        let files_written = writer::write_all(
            plan.writes,
            self.ports.device.as_ref(),
            self.config.max_concurrent_writes,
        )
        .await
        .map_err(Error::WriteFile)?;
        info!(files_written, "mod files written");
        self.emit_event(Event::FilesWritten {
            count: files_written,
        });

        let process = self.restart_engine(&engine).await?;

        info!(
            engine_id = %engine.id,
            target_root = %target_root,
            pid = process.pid,
            "mod installed"
        );
        self.emit_event(Event::InstallComplete {
            target_root: target_root.clone(),
            files_written,
        });

        Ok(InstallReport {
            engine_id: engine.id,
            target_root,
            files_written,
            directories_created,
            detected_root,
            process,
        })
    }

    /// Stop the tracked process (if any) and launch `engine`, emitting events
    pub(crate) async fn restart_engine(&self, engine: &EngineProfile) -> Result<ProcessHandle> {
        let mut tracker = self.tracker.lock().await;
        let previous = tracker.handle().cloned();
        let result = tracker
            .restart(engine, self.ports.filesystem.as_ref())
            .await;

        if let Some(previous) = previous {
            self.emit_event(Event::ProcessStopped {
                pid: previous.pid,
                engine_id: previous.engine_id,
            });
        }
        let handle = result?;
        self.emit_event(Event::ProcessLaunched {
            pid: handle.pid,
            engine_id: handle.engine_id.clone(),
        });
        Ok(handle)
    }

    /// Upload loose files into a guest directory
    ///
    /// All files are written concurrently with the same first-failure rules
    /// as mod installs. `dest_dir` must already exist.
    ///
    /// Returns the number of files written.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPath`] if a file name is not a single path segment
    /// - [`Error::WriteFile`] with the guest path of the first failed write
    pub async fn upload_files(&self, dest_dir: &str, files: Vec<UploadFile>) -> Result<usize> {
        let dest_dir = guest_path::normalize(dest_dir);

        let mut writes = Vec::with_capacity(files.len());
        for file in files {
            if file.name.is_empty() || file.name.contains('/') || file.name == "." || file.name == ".."
            {
                return Err(Error::InvalidPath {
                    path: file.name,
                    reason: "upload names must be a single file name".to_string(),
                });
            }
            writes.push(PlannedWrite {
                device_path: guest_path::join(guest_path::ROOT, &file.name),
                content: file.contents,
            });
        }

        info!(dest_dir = %dest_dir, files = writes.len(), "uploading files");
        let port = GuestFileWriter::new(self.ports.filesystem.clone(), &dest_dir);
        let written = writer::write_all(writes, &port, self.config.max_concurrent_writes)
            .await
            .map_err(|e| {
                Error::WriteFile(IoError::new(guest_path::join(&dest_dir, &e.path), e.cause))
            })?;

        info!(dest_dir = %dest_dir, written, "upload complete");
        Ok(written)
    }
}
