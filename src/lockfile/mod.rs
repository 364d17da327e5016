//! `postmaster.pid` parsing and stale shared-memory repair.
//!
//! PostgreSQL refuses to start when the lock file names a shared-memory
//! segment it believes is still attached. After an unclean shutdown the
//! recorded postmaster is gone but the descriptor line remains; `repair`
//! drops that line so the next start does not trip over it.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{Error, Result};

pub const LOCK_FILE_NAME: &str = "postmaster.pid";

// 1-based line numbers as written by the postmaster.
const LINE_PID: usize = 1;
const LINE_DATA_DIR: usize = 2;
const LINE_START_TIME: usize = 3;
const LINE_PORT: usize = 4;
const LINE_SOCKET_DIR: usize = 5;
const LINE_LISTEN_ADDR: usize = 6;
const LINE_SHMEM_KEY: usize = 7;
const LINE_PM_STATUS: usize = 8;

static SHMEM_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(-?\d+)\s+(-?\d+)\s*$").expect("static regex"));

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShmemDescriptor {
    pub key: i64,
    pub id: i64,
}

impl ShmemDescriptor {
    /// Parse a `<key> <id>` line; anything else is `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let caps = SHMEM_LINE.captures(line)?;
        Some(Self {
            key: caps[1].parse().ok()?,
            id: caps[2].parse().ok()?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockFileInfo {
    pub pid: i32,
    pub data_dir: Option<PathBuf>,
    pub start_time: Option<i64>,
    pub port: Option<u16>,
    pub socket_dir: Option<PathBuf>,
    pub listen_address: Option<String>,
    pub shmem: Option<ShmemDescriptor>,
    pub status: Option<String>,
}

impl LockFileInfo {
    pub fn parse(contents: &str, path: &Path) -> Result<Self> {
        let lines: Vec<&str> = contents.lines().collect();
        let pid = parse_pid(lines.first().copied()).ok_or_else(|| Error::InvalidLockFile {
            path: path.display().to_string(),
            reason: "first line is not a process id".into(),
        })?;

        let line = |n: usize| {
            lines
                .get(n - 1)
                .map(|l| l.trim())
                .filter(|l| !l.is_empty())
        };

        // Older servers stop after the descriptor, so fall back to the last line.
        let shmem = line(LINE_SHMEM_KEY)
            .and_then(ShmemDescriptor::parse)
            .or_else(|| {
                (lines.len() > LINE_PID)
                    .then(|| lines.last().and_then(|l| ShmemDescriptor::parse(l)))
                    .flatten()
            });

        Ok(Self {
            pid,
            data_dir: line(LINE_DATA_DIR).map(PathBuf::from),
            start_time: line(LINE_START_TIME).and_then(|l| l.parse().ok()),
            port: line(LINE_PORT).and_then(|l| l.parse().ok()),
            socket_dir: line(LINE_SOCKET_DIR).map(PathBuf::from),
            listen_address: line(LINE_LISTEN_ADDR).map(str::to_string),
            shmem,
            status: line(LINE_PM_STATUS).map(str::to_string),
        })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents, path)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Alive,
    Absent,
}

pub trait ProcessProbe {
    fn state(&self, pid: i32) -> ProcessState;
}

/// Probes with `kill(pid, 0)`. `EPERM` means the process exists under another
/// user, so only `ESRCH` counts as absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalProbe;

impl ProcessProbe for SignalProbe {
    fn state(&self, pid: i32) -> ProcessState {
        if pid <= 0 {
            return ProcessState::Absent;
        }
        if unsafe { libc::kill(pid, 0) } == 0 {
            return ProcessState::Alive;
        }
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            ProcessState::Absent
        } else {
            ProcessState::Alive
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    Missing,
    Unparsable,
    ProcessAlive(i32),
    NoDescriptor(i32),
    Repaired(i32),
}

pub fn lock_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join(LOCK_FILE_NAME)
}

/// Drop the trailing shared-memory line of `<data_dir>/postmaster.pid` when the
/// recorded postmaster is no longer running.
pub fn repair(data_dir: &Path, probe: &dyn ProcessProbe) -> Result<RepairOutcome> {
    let path = lock_file_path(data_dir);
    if !path.exists() {
        debug!(lock_file = %path.display(), "no lock file present");
        return Ok(RepairOutcome::Missing);
    }

    let contents = fs::read_to_string(&path)?;
    let lines: Vec<&str> = contents.lines().collect();

    let Some(pid) = parse_pid(lines.first().copied()) else {
        warn!(lock_file = %path.display(), "could not parse process id from lock file");
        return Ok(RepairOutcome::Unparsable);
    };

    if probe.state(pid) == ProcessState::Alive {
        info!(pid, "postmaster from lock file is running; leaving lock file alone");
        return Ok(RepairOutcome::ProcessAlive(pid));
    }

    let descriptor = match lines.split_last() {
        Some((last, rest)) if !rest.is_empty() => ShmemDescriptor::parse(last).map(|d| (d, rest)),
        _ => None,
    };
    let Some((descriptor, rest)) = descriptor else {
        debug!(pid, lock_file = %path.display(), "last line is not a shared memory descriptor");
        return Ok(RepairOutcome::NoDescriptor(pid));
    };

    let mut repaired = String::with_capacity(contents.len());
    for line in rest {
        repaired.push_str(line);
        repaired.push('\n');
    }
    crate::fs::rewrite_in_place(&path, repaired.as_bytes())?;

    info!(
        pid,
        shmem_key = descriptor.key,
        shmem_id = descriptor.id,
        lock_file = %path.display(),
        "removed stale shared memory descriptor from lock file"
    );
    Ok(RepairOutcome::Repaired(pid))
}

fn parse_pid(line: Option<&str>) -> Option<i32> {
    line?.trim().parse().ok()
}
