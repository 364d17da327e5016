//! Server configuration files: installation and archive-logging edits.

use std::{
    fs::{self, Permissions},
    os::unix::fs::PermissionsExt,
    path::Path,
};

use tracing::info;

use crate::{fs::FileAttrs, Error, Result};

pub mod wal;

pub const POSTGRES_CONF: &str = "postgresql.conf";
pub const HBA_CONF: &str = "pg_hba.conf";
pub const DEFAULT_INSTALL_MODE: u32 = 0o644;

/// Copy `source` to `dest` atomically with the given permission bits.
///
/// An existing destination is only replaced when `force` is set. Missing
/// parent directories of `dest` are created.
pub fn install_file(source: &Path, dest: &Path, force: bool, mode: u32) -> Result<()> {
    if !source.is_file() {
        return Err(Error::MissingSource(source.display().to_string()).into());
    }
    if dest.exists() && !force {
        return Err(Error::DestinationExists(dest.display().to_string()).into());
    }
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let contents = fs::read(source)?;
    crate::fs::atomic_write(
        dest,
        &contents,
        Some(FileAttrs::mode(Permissions::from_mode(mode))),
    )?;
    info!(
        source = %source.display(),
        dest = %dest.display(),
        mode = %format!("{mode:o}"),
        "configuration file installed"
    );
    Ok(())
}

/// Parse an octal mode such as `644` or `0o600`.
pub fn parse_mode(raw: &str) -> Result<u32> {
    let digits = raw.trim_start_matches("0o");
    u32::from_str_radix(digits, 8)
        .ok()
        .filter(|m| *m <= 0o7777)
        .ok_or_else(|| Error::Usage(format!("invalid file mode: {raw}")).into())
}
