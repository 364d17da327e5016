//! Implementation of `pgwrap archive` and `pgwrap prune-archive`.

use std::path::PathBuf;

use clap::Args;

use crate::{archive, Result};

#[derive(Debug, Clone, Args)]
pub struct ArchiveSegmentArgs {
    /// Segment to archive (`%p`)
    pub from: PathBuf,
    /// Destination in the archive directory (`../backup/%f`)
    pub to: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct PruneArchiveArgs {
    /// Archive directory to clean
    pub dir: PathBuf,
}

pub fn execute_archive(args: ArchiveSegmentArgs) -> Result<()> {
    archive::archive_segment(&args.from, &args.to)?;
    Ok(())
}

pub fn execute_prune(args: PruneArchiveArgs) -> Result<()> {
    for path in archive::prune(&args.dir)? {
        println!("removed {}", path.display());
    }
    Ok(())
}
