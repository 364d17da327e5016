//! Implementation of `pgwrap archive-logging`.

use std::path::PathBuf;

use clap::{Args, ValueEnum};

use crate::{conf::wal, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ArchiveAction {
    Enable,
    Disable,
    Status,
}

#[derive(Debug, Clone, Args)]
pub struct ArchiveArgs {
    #[arg(value_enum)]
    pub action: ArchiveAction,

    /// Database data directory holding postgresql.conf and pg_hba.conf
    #[arg(short = 'D', long = "pgdata")]
    pub data_dir: Option<PathBuf>,

    /// archive_command written when enabling
    #[arg(long = "archive-command", default_value = wal::DEFAULT_ARCHIVE_COMMAND)]
    pub archive_command: String,
}

pub fn execute(args: ArchiveArgs) -> Result<()> {
    let data_dir = args
        .data_dir
        .ok_or_else(|| Error::Cli("data directory is required".into()))?;

    match args.action {
        ArchiveAction::Enable => wal::set_archiving(&data_dir, true, &args.archive_command),
        ArchiveAction::Disable => wal::set_archiving(&data_dir, false, &args.archive_command),
        ArchiveAction::Status => {
            let enabled = wal::archiving_status(&data_dir)?;
            println!("{}", if enabled { "enabled" } else { "disabled" });
            Ok(())
        }
    }
}
