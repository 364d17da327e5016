use std::{
    fs,
    os::unix::fs::{MetadataExt, PermissionsExt},
    path::Path,
};

use pgwrap::lockfile::{
    self, LockFileInfo, ProcessProbe, ProcessState, RepairOutcome, ShmemDescriptor, SignalProbe,
    LOCK_FILE_NAME,
};
use tempfile::tempdir;

struct FixedProbe(ProcessState);

impl ProcessProbe for FixedProbe {
    fn state(&self, _pid: i32) -> ProcessState {
        self.0
    }
}

const LOCK_WITH_SHMEM: &str =
    "4242\n/Library/Server/Wiki/Database.xpg/cluster.pg\n1700000000\n5432\n/var/pgsql_socket\n\n  5432001     65536\n";

fn write_lock(dir: &Path, contents: &str) {
    fs::write(dir.join(LOCK_FILE_NAME), contents).unwrap();
}

fn read_lock(dir: &Path) -> String {
    fs::read_to_string(dir.join(LOCK_FILE_NAME)).unwrap()
}

#[test]
fn dead_postmaster_loses_shmem_line() -> pgwrap::Result<()> {
    let data = tempdir()?;
    write_lock(data.path(), LOCK_WITH_SHMEM);

    let outcome = lockfile::repair(data.path(), &FixedProbe(ProcessState::Absent))?;

    assert_eq!(outcome, RepairOutcome::Repaired(4242));
    let repaired = read_lock(data.path());
    assert_eq!(
        repaired,
        "4242\n/Library/Server/Wiki/Database.xpg/cluster.pg\n1700000000\n5432\n/var/pgsql_socket\n\n"
    );
    assert_eq!(repaired.lines().next(), Some("4242"));
    Ok(())
}

#[test]
fn live_postmaster_leaves_file_untouched() -> pgwrap::Result<()> {
    let data = tempdir()?;
    write_lock(data.path(), LOCK_WITH_SHMEM);

    let outcome = lockfile::repair(data.path(), &FixedProbe(ProcessState::Alive))?;

    assert_eq!(outcome, RepairOutcome::ProcessAlive(4242));
    assert_eq!(read_lock(data.path()), LOCK_WITH_SHMEM);
    Ok(())
}

#[test]
fn non_descriptor_last_line_is_preserved() -> pgwrap::Result<()> {
    let data = tempdir()?;
    let contents = "4242\n/db\n1700000000\n5432\n/tmp\n*\n  5432001     65536\nready   \n";
    write_lock(data.path(), contents);

    let outcome = lockfile::repair(data.path(), &FixedProbe(ProcessState::Absent))?;

    assert_eq!(outcome, RepairOutcome::NoDescriptor(4242));
    assert_eq!(read_lock(data.path()), contents);
    Ok(())
}

#[test]
fn pid_only_lock_file_is_not_truncated() -> pgwrap::Result<()> {
    let data = tempdir()?;
    write_lock(data.path(), "4242\n");

    let outcome = lockfile::repair(data.path(), &FixedProbe(ProcessState::Absent))?;
    assert_eq!(outcome, RepairOutcome::NoDescriptor(4242));
    assert_eq!(read_lock(data.path()), "4242\n");
    Ok(())
}

#[test]
fn unparsable_pid_is_reported_not_fatal() -> pgwrap::Result<()> {
    let data = tempdir()?;
    write_lock(data.path(), "not-a-pid\n1 2\n");

    let outcome = lockfile::repair(data.path(), &FixedProbe(ProcessState::Absent))?;
    assert_eq!(outcome, RepairOutcome::Unparsable);
    assert_eq!(read_lock(data.path()), "not-a-pid\n1 2\n");
    Ok(())
}

#[test]
fn missing_lock_file_is_a_no_op() -> pgwrap::Result<()> {
    let data = tempdir()?;
    let outcome = lockfile::repair(data.path(), &FixedProbe(ProcessState::Absent))?;
    assert_eq!(outcome, RepairOutcome::Missing);
    assert!(!data.path().join(LOCK_FILE_NAME).exists());
    Ok(())
}

#[test]
fn repair_keeps_permissions_and_leaves_no_temp_file() -> pgwrap::Result<()> {
    let data = tempdir()?;
    write_lock(data.path(), LOCK_WITH_SHMEM);
    let path = data.path().join(LOCK_FILE_NAME);
    fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;

    lockfile::repair(data.path(), &FixedProbe(ProcessState::Absent))?;

    assert_eq!(fs::metadata(&path)?.permissions().mode() & 0o7777, 0o600);
    let entries: Vec<_> = fs::read_dir(data.path())?.collect::<Result<_, _>>()?;
    assert_eq!(entries.len(), 1);
    Ok(())
}

#[test]
fn repair_keeps_owner_and_group() -> pgwrap::Result<()> {
    let data = tempdir()?;
    write_lock(data.path(), LOCK_WITH_SHMEM);
    let path = data.path().join(LOCK_FILE_NAME);

    // Only root can hand the file to another user.
    let running_as_root = unsafe { libc::geteuid() } == 0;
    if running_as_root {
        std::os::unix::fs::chown(&path, Some(65534), Some(65534))?;
    }
    let before = fs::metadata(&path)?;

    lockfile::repair(data.path(), &FixedProbe(ProcessState::Absent))?;

    let after = fs::metadata(&path)?;
    assert_eq!((after.uid(), after.gid()), (before.uid(), before.gid()));
    if running_as_root {
        assert_eq!((after.uid(), after.gid()), (65534, 65534));
    }
    assert!(!read_lock(data.path()).contains("5432001"));
    Ok(())
}

#[test]
fn signal_probe_distinguishes_live_and_absent() {
    let probe = SignalProbe;
    assert_eq!(probe.state(std::process::id() as i32), ProcessState::Alive);
    // Far above any kernel pid_max.
    assert_eq!(probe.state(i32::MAX), ProcessState::Absent);
    assert_eq!(probe.state(0), ProcessState::Absent);
    assert_eq!(probe.state(-1), ProcessState::Absent);
}

#[test]
fn reads_pre_status_lock_file_layout() -> pgwrap::Result<()> {
    let data = tempdir()?;
    write_lock(data.path(), LOCK_WITH_SHMEM);

    let info = LockFileInfo::read(&data.path().join(LOCK_FILE_NAME))?;
    assert_eq!(info.pid, 4242);
    assert_eq!(info.start_time, Some(1_700_000_000));
    assert_eq!(info.port, Some(5432));
    assert_eq!(info.listen_address, None);
    assert_eq!(
        info.shmem,
        Some(ShmemDescriptor {
            key: 5432001,
            id: 65536
        })
    );
    assert_eq!(info.status, None);
    Ok(())
}

#[test]
fn lock_file_without_pid_is_invalid() {
    let err = LockFileInfo::parse("\n/db\n", Path::new("postmaster.pid")).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<pgwrap::Error>(),
        Some(pgwrap::Error::InvalidLockFile { .. })
    ));
}
