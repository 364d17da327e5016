//! Exercises the `start` pipeline up to (but not including) the exec, with
//! the plist tool, process probe and mount helper replaced by test doubles.

use std::{
    cell::RefCell,
    ffi::OsString,
    fs,
    os::unix::process::ExitStatusExt,
    path::{Path, PathBuf},
    process::ExitStatus,
};

use pgwrap::{
    args::PlistReader,
    cli::start::{prepare, StartPlan},
    launch::{self, MountWaiter},
    lockfile::{ProcessProbe, ProcessState, RepairOutcome, LOCK_FILE_NAME},
};
use tempfile::tempdir;

struct CannedReader(Vec<String>);

impl PlistReader for CannedReader {
    fn read_program_arguments(&self, _path: &Path) -> pgwrap::Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

struct FixedProbe(ProcessState);

impl ProcessProbe for FixedProbe {
    fn state(&self, _pid: i32) -> ProcessState {
        self.0
    }
}

/// Records the paths it was asked to wait for and returns a fixed raw status.
struct RecordingWaiter {
    raw_status: i32,
    waited: RefCell<Vec<PathBuf>>,
}

impl RecordingWaiter {
    fn exiting_with(code: i32) -> Self {
        Self {
            raw_status: code << 8,
            waited: RefCell::new(Vec::new()),
        }
    }
}

impl MountWaiter for RecordingWaiter {
    fn wait_for(&self, path: &Path) -> pgwrap::Result<ExitStatus> {
        self.waited.borrow_mut().push(path.to_path_buf());
        Ok(ExitStatus::from_raw(self.raw_status))
    }
}

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

#[test]
fn merges_repairs_and_waits_before_exec() -> pgwrap::Result<()> {
    let root = tempdir()?;
    let data = root.path().join("cluster.pg");
    fs::create_dir(&data)?;
    fs::write(data.join(LOCK_FILE_NAME), "777\n/db\n1700000000\n5432\n/tmp\n\n 5432001 65536\n")?;
    let plist = root.path().join("org.postgresql.postgres.plist");
    fs::write(&plist, b"<plist/>")?;

    let reader = CannedReader(strings(&["-D", data.to_str().unwrap(), "-c", "port=5433"]));
    let waiter = RecordingWaiter::exiting_with(0);

    let plan = prepare(
        strings(&["--apple-configuration", plist.to_str().unwrap()]),
        None,
        &reader,
        &FixedProbe(ProcessState::Absent),
        &waiter,
    )?;

    assert_eq!(
        plan,
        StartPlan {
            server_args: strings(&["-D", data.to_str().unwrap(), "-c", "port=5433"]),
            data_dir: Some(data.clone()),
            repair: Some(RepairOutcome::Repaired(777)),
            mount_wait_code: Some(0),
        }
    );
    assert_eq!(waiter.waited.borrow().as_slice(), &[data.clone()]);
    assert_eq!(
        fs::read_to_string(data.join(LOCK_FILE_NAME))?,
        "777\n/db\n1700000000\n5432\n/tmp\n\n"
    );
    Ok(())
}

#[test]
fn no_data_dir_skips_repair_and_wait() -> pgwrap::Result<()> {
    let waiter = RecordingWaiter::exiting_with(0);
    let plan = prepare(
        strings(&["-c", "port=5433"]),
        None,
        &CannedReader(Vec::new()),
        &FixedProbe(ProcessState::Absent),
        &waiter,
    )?;

    assert_eq!(plan.data_dir, None);
    assert_eq!(plan.repair, None);
    assert_eq!(plan.mount_wait_code, None);
    assert!(waiter.waited.borrow().is_empty());
    Ok(())
}

#[test]
fn pgdata_environment_is_last_resort() -> pgwrap::Result<()> {
    let data = tempdir()?;
    let waiter = RecordingWaiter::exiting_with(0);
    let plan = prepare(
        Vec::new(),
        Some(OsString::from(data.path())),
        &CannedReader(Vec::new()),
        &FixedProbe(ProcessState::Alive),
        &waiter,
    )?;

    assert_eq!(plan.data_dir.as_deref(), Some(data.path()));
    assert_eq!(plan.repair, Some(RepairOutcome::Missing));
    assert_eq!(waiter.waited.borrow().len(), 1);
    Ok(())
}

#[test]
fn failed_mount_wait_does_not_abort_start() -> pgwrap::Result<()> {
    let data = tempdir()?;
    let waiter = RecordingWaiter::exiting_with(1);
    let plan = prepare(
        strings(&["-D", data.path().to_str().unwrap()]),
        None,
        &CannedReader(Vec::new()),
        &FixedProbe(ProcessState::Absent),
        &waiter,
    )?;
    assert_eq!(plan.mount_wait_code, Some(1));
    Ok(())
}

#[test]
fn unreadable_lock_file_is_not_fatal() -> pgwrap::Result<()> {
    let data = tempdir()?;
    // A directory where the lock file should be makes the read fail.
    fs::create_dir(data.path().join(LOCK_FILE_NAME))?;
    let waiter = RecordingWaiter::exiting_with(0);

    let plan = prepare(
        strings(&["-D", data.path().to_str().unwrap()]),
        None,
        &CannedReader(Vec::new()),
        &FixedProbe(ProcessState::Absent),
        &waiter,
    )?;

    assert_eq!(plan.repair, None);
    assert_eq!(waiter.waited.borrow().len(), 1);
    Ok(())
}

#[test]
fn dangling_directive_stops_before_waiting() {
    let waiter = RecordingWaiter::exiting_with(0);
    let err = prepare(
        strings(&["-D", "/db", "-a"]),
        None,
        &CannedReader(Vec::new()),
        &FixedProbe(ProcessState::Absent),
        &waiter,
    )
    .expect_err("usage error expected");

    assert!(matches!(
        err.downcast_ref::<pgwrap::Error>(),
        Some(pgwrap::Error::Usage(_))
    ));
    assert!(waiter.waited.borrow().is_empty());
}

#[test]
fn exec_failure_is_reported() {
    let err = launch::exec_server(Path::new("/nonexistent/postgres_real"), &strings(&["-D", "/db"]));
    assert!(matches!(err, pgwrap::Error::Exec { ref program, .. } if program == "/nonexistent/postgres_real"));
}

#[test]
fn wait4path_helper_exit_code_is_returned() -> pgwrap::Result<()> {
    let data = tempdir()?;
    let status = launch::Wait4Path::new("/bin/true").wait_for(data.path())?;
    assert_eq!(status.code(), Some(0));

    let status = launch::Wait4Path::new("/bin/false").wait_for(data.path())?;
    assert_eq!(status.code(), Some(1));

    let err = launch::Wait4Path::new("/nonexistent/wait4path")
        .wait_for(data.path())
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<pgwrap::Error>(),
        Some(pgwrap::Error::Spawn { .. })
    ));
    Ok(())
}
