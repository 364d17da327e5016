//! WAL segment archive directory: the copier behind `archive_command` and
//! cleanup of files that must not be replayed.

use std::{
    fs::{self, File, Permissions},
    io,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use anyhow::Context;
use tracing::info;

use crate::{
    fs::{FileAttrs, IN_PROGRESS_EXT},
    Result,
};

pub const ARCHIVED_SEGMENT_MODE: u32 = 0o600;
pub const PARTIAL_EXT: &str = "partial";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// Destination already holds a file of the same size.
    AlreadyArchived,
    Copied { bytes: u64 },
}

/// Copy a finished WAL segment into the archive.
///
/// The server retries `archive_command` after a crash, so a destination of the
/// same size counts as done. Otherwise the segment is copied to an
/// `.in-progress` sibling and renamed into place with mode 0600.
pub fn archive_segment(from: &Path, to: &Path) -> Result<ArchiveOutcome> {
    let source_len = fs::metadata(from)
        .with_context(|| format!("failed to stat segment {}", from.display()))?
        .len();

    if let Ok(existing) = fs::metadata(to) {
        if existing.is_file() && existing.len() == source_len {
            info!(from = %from.display(), to = %to.display(), "segment already archived");
            return Ok(ArchiveOutcome::AlreadyArchived);
        }
    }

    let mut copied = 0;
    let attrs = FileAttrs::mode(Permissions::from_mode(ARCHIVED_SEGMENT_MODE));
    crate::fs::replace_with(to, Some(attrs), |file| {
        let mut source = File::open(from)?;
        copied = io::copy(&mut source, file)?;
        Ok(())
    })
    .with_context(|| format!("failed to archive {} to {}", from.display(), to.display()))?;

    info!(from = %from.display(), to = %to.display(), bytes = copied, "segment archived");
    Ok(ArchiveOutcome::Copied { bytes: copied })
}

/// Delete `.partial` segments whose complete copy exists, and `.in-progress`
/// files left by an interrupted copy. Returns the removed paths, sorted.
pub fn prune(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        let Some((stem, ext)) = name.rsplit_once('.') else {
            continue;
        };

        if ext == PARTIAL_EXT {
            let complete = dir.join(stem);
            if complete.exists() {
                info!(partial = %path.display(), complete = %complete.display(), "removing partial segment");
                fs::remove_file(&path)?;
                removed.push(path);
            }
        } else if ext == IN_PROGRESS_EXT {
            info!(path = %path.display(), "removing incomplete archive file");
            fs::remove_file(&path)?;
            removed.push(path);
        }
    }
    removed.sort();
    Ok(removed)
}
