//! Startup argument assembly and data directory resolution.
//!
//! `assemble` folds the arguments listed in an `--apple-configuration` plist
//! into the server's argument list; `resolve_data_dir` then works out which
//! data directory the server is about to use.

use std::{ffi::OsString, path::PathBuf};

use tracing::{info, warn};

use crate::{Error, Result};

pub mod plist;

pub use plist::{PlistBuddyReader, PlistReader};

pub const DIRECTIVE_SHORT: &str = "-a";
pub const DIRECTIVE_LONG: &str = "--apple-configuration";

/// Merge extra arguments from every `-a/--apple-configuration <plist>` pair.
///
/// The directive and its path are removed in place; merged entries are
/// appended at the end in file order. A path that does not exist is skipped
/// with a warning. A directive without a path is a usage error.
pub fn assemble(args: Vec<String>, reader: &dyn PlistReader) -> Result<Vec<String>> {
    let mut kept = Vec::with_capacity(args.len());
    let mut extra = Vec::new();
    let mut iter = args.into_iter();

    while let Some(arg) = iter.next() {
        let path = if arg == DIRECTIVE_SHORT || arg == DIRECTIVE_LONG {
            iter.next().ok_or_else(|| {
                Error::Usage(format!("{arg} requires a configuration file path"))
            })?
        } else if let Some(inline) = arg.strip_prefix("--apple-configuration=") {
            if inline.is_empty() {
                return Err(
                    Error::Usage(format!("{DIRECTIVE_LONG} requires a configuration file path"))
                        .into(),
                );
            }
            inline.to_string()
        } else {
            kept.push(arg);
            continue;
        };

        let path = PathBuf::from(path);
        if !path.exists() {
            warn!(plist = %path.display(), "configuration file not found; no arguments merged");
            continue;
        }

        let merged = reader.read_program_arguments(&path)?;
        info!(plist = %path.display(), count = merged.len(), "merged startup arguments");
        extra.extend(merged);
    }

    kept.extend(extra);
    Ok(kept)
}

/// Pick the data directory: an explicit flag in the original invocation wins,
/// then a flag in the merged list, then `PGDATA`.
pub fn resolve_data_dir(
    original: &[String],
    merged: &[String],
    pgdata_env: Option<OsString>,
) -> Option<PathBuf> {
    find_data_dir_flag(original)
        .or_else(|| find_data_dir_flag(merged))
        .or_else(|| {
            pgdata_env
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        })
}

/// First `-D <dir>`, `-D<dir>`, `--pgdata <dir>` or `--pgdata=<dir>` in `args`.
pub fn find_data_dir_flag(args: &[String]) -> Option<PathBuf> {
    let mut iter = args.iter().map(|a| a.trim());
    while let Some(arg) = iter.next() {
        if arg == "-D" || arg == "--pgdata" {
            match iter.next() {
                Some(value) if !value.is_empty() => return Some(PathBuf::from(value)),
                _ => continue,
            }
        }
        if let Some(value) = arg.strip_prefix("--pgdata=") {
            if !value.is_empty() {
                return Some(PathBuf::from(value));
            }
            continue;
        }
        if !arg.starts_with("--") {
            if let Some(value) = arg.strip_prefix("-D") {
                if !value.is_empty() {
                    return Some(PathBuf::from(value));
                }
            }
        }
    }
    None
}
