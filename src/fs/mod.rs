//! Filesystem helpers shared by the lock-file repair, config installer,
//! archive copier and relocation tool.

use std::{
    fs::{self, File, Metadata, Permissions},
    io::Write,
    os::unix::fs::MetadataExt,
    path::Path,
    process::Command,
};

use tempfile::{Builder, NamedTempFile};
use tracing::{debug, info};

use crate::{Error, Result};

/// Extension of files still being written. Leftovers after a crash are safe to
/// delete.
pub const IN_PROGRESS_EXT: &str = "in-progress";

/// Permission bits and ownership to put on a replacement file.
#[derive(Debug, Clone)]
pub struct FileAttrs {
    pub permissions: Permissions,
    pub owner: Option<(u32, u32)>,
}

impl FileAttrs {
    pub fn mode(permissions: Permissions) -> Self {
        Self {
            permissions,
            owner: None,
        }
    }

    /// Same mode, owner and group as an existing file.
    pub fn like(meta: &Metadata) -> Self {
        Self {
            permissions: meta.permissions(),
            owner: Some((meta.uid(), meta.gid())),
        }
    }
}

fn temp_sibling(path: &Path) -> std::io::Result<NamedTempFile> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(&format!(".{IN_PROGRESS_EXT}"))
        .tempfile_in(dir)
}

/// Fill a temp sibling of `path` with `fill`, apply `attrs`, then rename it
/// over `path`. The temp file is removed if any step before the rename fails.
pub fn replace_with<F>(path: &Path, attrs: Option<FileAttrs>, fill: F) -> Result<()>
where
    F: FnOnce(&mut File) -> std::io::Result<()>,
{
    let mut tmp = temp_sibling(path)?;
    fill(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;

    if let Some(attrs) = attrs {
        if let Some((uid, gid)) = attrs.owner {
            let current = tmp.as_file().metadata()?;
            if (current.uid(), current.gid()) != (uid, gid) {
                std::os::unix::fs::fchown(tmp.as_file(), Some(uid), Some(gid))?;
            }
        }
        // After fchown, which may clear setuid/setgid bits.
        tmp.as_file().set_permissions(attrs.permissions)?;
    }

    tmp.persist(path).map_err(|err| Error::Io(err.error))?;
    Ok(())
}

/// Replace `path` with `contents` atomically.
pub fn atomic_write(path: &Path, contents: &[u8], attrs: Option<FileAttrs>) -> Result<()> {
    replace_with(path, attrs, |file| file.write_all(contents))?;
    debug!(path = %path.display(), bytes = contents.len(), "file replaced");
    Ok(())
}

/// Rewrite an existing file, keeping its mode, owner and group.
pub fn rewrite_in_place(path: &Path, contents: &[u8]) -> Result<()> {
    let attrs = FileAttrs::like(&fs::metadata(path)?);
    atomic_write(path, contents, Some(attrs))
}

/// Move a directory tree. Uses `rename(2)` and falls back to `mv` when source
/// and destination live on different filesystems.
pub fn move_dir(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(err) if err.raw_os_error() == Some(libc::EXDEV) => {
            info!(from = %from.display(), to = %to.display(), "cross-device move; using mv");
        }
        Err(err) => {
            return Err(Error::MoveFailed(format!(
                "{} -> {}: {err}",
                from.display(),
                to.display()
            ))
            .into())
        }
    }

    let output = Command::new("mv")
        .arg(from)
        .arg(to)
        .output()
        .map_err(|source| Error::Spawn {
            program: "mv".into(),
            source,
        })?;
    if !output.status.success() {
        return Err(Error::MoveFailed(format!(
            "mv {} {} failed: {}",
            from.display(),
            to.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        ))
        .into());
    }
    Ok(())
}
