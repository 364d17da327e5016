//! Hand-off to the real database server: wait for the data volume, then exec.

use std::{
    os::unix::process::CommandExt,
    path::{Path, PathBuf},
    process::{Command, ExitStatus},
};

use tracing::info;

use crate::{Error, Result};

pub trait MountWaiter {
    /// Block until `path` is available and report the helper's exit status.
    fn wait_for(&self, path: &Path) -> Result<ExitStatus>;
}

/// Delegates to the `wait4path` helper, which blocks with no timeout.
#[derive(Debug, Clone)]
pub struct Wait4Path {
    pub program: PathBuf,
}

impl Wait4Path {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl MountWaiter for Wait4Path {
    fn wait_for(&self, path: &Path) -> Result<ExitStatus> {
        info!(data_directory = %path.display(), "waiting for data directory");
        let status = Command::new(&self.program)
            .arg(path)
            .status()
            .map_err(|source| Error::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;
        Ok(status)
    }
}

/// Replace the current process with `program args...`. Only returns on failure.
pub fn exec_server(program: &Path, args: &[String]) -> Error {
    info!(server = %program.display(), ?args, "executing database server");
    let source = Command::new(program).args(args).exec();
    Error::Exec {
        program: program.display().to_string(),
        source,
    }
}
