//! Property-list access through an external query tool.

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use tracing::debug;

use crate::{Error, Result};

/// Key holding the extra startup arguments inside the configuration plist.
pub const PROGRAM_ARGUMENTS_KEY: &str = "ProgramArguments";

pub trait PlistReader {
    /// Return the string entries of the `ProgramArguments` array in `path`.
    fn read_program_arguments(&self, path: &Path) -> Result<Vec<String>>;
}

/// Reads plists by shelling out to `PlistBuddy -c "Print :<key>" <file>`.
#[derive(Debug, Clone)]
pub struct PlistBuddyReader {
    pub program: PathBuf,
    pub key: String,
}

impl PlistBuddyReader {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            key: PROGRAM_ARGUMENTS_KEY.to_string(),
        }
    }
}

impl PlistReader for PlistBuddyReader {
    fn read_program_arguments(&self, path: &Path) -> Result<Vec<String>> {
        debug!(tool = %self.program.display(), plist = %path.display(), key = %self.key, "querying property list");
        let output = Command::new(&self.program)
            .arg("-c")
            .arg(format!("Print :{}", self.key))
            .arg(path)
            .output()
            .map_err(|source| Error::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let reason = match output.status.code() {
                Some(code) => format!("exit code {code}: {}{}", stderr.trim(), stdout.trim()),
                None => format!("terminated by signal: {}", stderr.trim()),
            };
            return Err(Error::PlistRead {
                path: path.display().to_string(),
                reason,
            }
            .into());
        }

        Ok(parse_framed_list(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Strip the `Array {` / `}` framing lines of a printed plist array and return
/// the trimmed entries in order.
pub fn parse_framed_list(output: &str) -> Vec<String> {
    let lines: Vec<&str> = output.trim_end().lines().collect();
    if lines.len() < 2 {
        return Vec::new();
    }
    lines[1..lines.len() - 1]
        .iter()
        .map(|line| line.trim().to_string())
        .collect()
}
