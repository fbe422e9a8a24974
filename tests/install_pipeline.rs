//! End-to-end install tests against the in-memory guest

mod common;

use common::{Entry, build_zip, drain_events, flat_mod, markerless_mod, memory_installer, wrapped_mod};
use modstage::ports::GuestOp;
use modstage::{Error, ErrorReport, Event, ModArchive, Stage, TrackerState};

#[tokio::test]
async fn test_flat_mod_installs_and_launches_engine() {
    let (guest, installer) = memory_installer();
    let mut events = installer.subscribe();

    let report = installer
        .install_and_restart(ModArchive::new("Flat.zip", flat_mod()), "psych104")
        .await
        .unwrap();

    assert_eq!(report.target_root, "/Flat");
    assert_eq!(report.files_written, 3);
    assert_eq!(report.detected_root, None);
    assert_eq!(
        guest.file("/mods/Flat/data/song.json").unwrap(),
        b"{\"song\":\"tutorial\"}"
    );
    assert_eq!(guest.file("/mods/Flat/pack.json").unwrap(), b"{}");
    assert_eq!(guest.running_pids(), vec![report.process.pid]);

    let events = drain_events(&mut events);
    let kinds: Vec<&str> = events
        .iter()
        .map(|e| match e {
            Event::InstallStarted { .. } => "started",
            Event::Planned { .. } => "planned",
            Event::DirectoriesCreated { .. } => "dirs",
            Event::FilesWritten { .. } => "files",
            Event::ProcessStopped { .. } => "stopped",
            Event::ProcessLaunched { .. } => "launched",
            Event::InstallComplete { .. } => "complete",
            Event::InstallFailed { .. } => "failed",
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["started", "planned", "dirs", "files", "launched", "complete"]
    );
}

#[tokio::test]
async fn test_wrapped_mod_is_unwrapped_for_root_detect_engine() {
    let (guest, installer) = memory_installer();

    let report = installer
        .install_and_restart(ModArchive::new("Wrapped.zip", wrapped_mod("Inner")), "vslice")
        .await
        .unwrap();

    assert_eq!(report.detected_root.as_deref(), Some("Inner"));
    let mut files: Vec<String> = guest
        .files()
        .into_iter()
        .filter(|f| f.starts_with("/mods/"))
        .collect();
    files.sort();
    assert_eq!(
        files,
        vec![
            "/mods/Wrapped/_polymod_meta.json",
            "/mods/Wrapped/data/chart.json",
            "/mods/Wrapped/scripts/init.hx",
        ]
    );
    assert!(!guest.is_dir("/mods/Wrapped/Inner"));
}

#[tokio::test]
async fn test_same_archive_keeps_wrapper_for_direct_extract_engine() {
    let (guest, installer) = memory_installer();

    let report = installer
        .install_and_restart(ModArchive::new("Wrapped.zip", wrapped_mod("Inner")), "codename")
        .await
        .unwrap();

    assert_eq!(report.detected_root, None);
    assert!(guest.file("/mods/Wrapped/Inner/data/chart.json").is_some());
}

#[tokio::test]
async fn test_every_directory_exists_before_the_first_write() {
    let (guest, installer) = memory_installer();

    let report = installer
        .install_and_restart(ModArchive::new("Flat.zip", flat_mod()), "psych073")
        .await
        .unwrap();
    assert_eq!(report.directories_created, 3);

    let ops = guest.operations();
    let last_dir = ops
        .iter()
        .rposition(|op| matches!(op, GuestOp::CreateDir(_)))
        .unwrap();
    let first_write = ops
        .iter()
        .position(|op| matches!(op, GuestOp::Write(_)))
        .unwrap();
    let run = ops
        .iter()
        .position(|op| matches!(op, GuestOp::Run { .. }))
        .unwrap();
    assert!(last_dir < first_write);
    assert!(ops[first_write..run].iter().all(|op| matches!(op, GuestOp::Write(_))));
}

#[tokio::test]
async fn test_second_install_replaces_the_running_process() {
    let (guest, installer) = memory_installer();

    let first = installer
        .install_and_restart(ModArchive::new("Flat.zip", flat_mod()), "psych104")
        .await
        .unwrap();
    let mut events = installer.subscribe();
    let second = installer
        .install_and_restart(ModArchive::new("Wrapped.zip", wrapped_mod("W")), "vslice")
        .await
        .unwrap();

    assert_ne!(first.process.pid, second.process.pid);
    assert_eq!(guest.running_pids(), vec![second.process.pid]);
    assert_eq!(
        installer.process_state().await,
        TrackerState::Running(second.process.clone())
    );

    let stopped = drain_events(&mut events).into_iter().find_map(|e| match e {
        Event::ProcessStopped { pid, engine_id } => Some((pid, engine_id)),
        _ => None,
    });
    assert_eq!(stopped, Some((first.process.pid, "psych104".to_string())));
}

#[tokio::test]
async fn test_markerless_archive_fails_planning_without_touching_guest() {
    let (guest, installer) = memory_installer();
    let mut events = installer.subscribe();

    let err = installer
        .install_and_restart(ModArchive::new("Odd.zip", markerless_mod()), "vslice")
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Plan));
    assert_eq!(err.error_code(), "no_root_found");
    assert!(!guest.is_dir("/mods/Odd"));
    assert!(guest.running_pids().is_empty());

    let report = ErrorReport::from(&err);
    assert_eq!(report.stage, Some(Stage::Plan));

    let last = drain_events(&mut events).pop().unwrap();
    assert!(matches!(
        last,
        Event::InstallFailed {
            stage: Some(Stage::Plan),
            ..
        }
    ));
}

#[tokio::test]
async fn test_write_failure_names_the_file_and_skips_restart() {
    let (guest, installer) = memory_installer();
    guest.fail_write("/mods/Flat/images/bg.png", std::io::ErrorKind::Other);

    let err = installer
        .install_and_restart(ModArchive::new("Flat.zip", flat_mod()), "psych104")
        .await
        .unwrap_err();

    match err {
        Error::WriteFile(e) => assert_eq!(e.path, "/Flat/images/bg.png"),
        other => panic!("expected write failure, got {other:?}"),
    }
    assert!(guest.running_pids().is_empty());
    assert_eq!(installer.process_state().await, TrackerState::Stopped);
}

#[tokio::test]
async fn test_non_zip_archive_is_rejected() {
    let (_guest, installer) = memory_installer();

    let err = installer
        .install_and_restart(ModArchive::new("Flat.rar", flat_mod()), "psych104")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArchive { .. }));

    let err = installer
        .install_and_restart(ModArchive::new("Broken.zip", b"not a zip".to_vec()), "psych104")
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Decode));
}

#[tokio::test]
async fn test_empty_archive_still_restarts_engine() {
    let (guest, installer) = memory_installer();

    let report = installer
        .install_and_restart(ModArchive::new("Empty.zip", build_zip(&[])), "psych104")
        .await
        .unwrap();

    assert_eq!(report.files_written, 0);
    assert_eq!(guest.running_pids(), vec![report.process.pid]);
}

#[tokio::test]
async fn test_unsafe_entries_are_skipped() {
    let (guest, installer) = memory_installer();
    let archive = build_zip(&[
        Entry::File("../escape.txt", b"nope"),
        Entry::File("data/ok.json", b"{}"),
    ]);

    let report = installer
        .install_and_restart(ModArchive::new("Safe.zip", archive), "psych104")
        .await
        .unwrap();

    assert_eq!(report.files_written, 1);
    assert!(guest.file("/mods/Safe/data/ok.json").is_some());
    assert!(guest.files().iter().all(|f| !f.contains("escape")));
}
