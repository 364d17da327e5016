//! Implementation of `pgwrap install-config`.

use std::path::PathBuf;

use clap::Args;

use crate::{conf, Result};

#[derive(Debug, Clone, Args)]
pub struct InstallArgs {
    /// File to install
    pub source: PathBuf,

    /// Destination path
    pub dest: PathBuf,

    /// Replace an existing destination
    #[arg(long = "force")]
    pub force: bool,

    /// Octal permission bits for the installed file
    #[arg(long = "mode", default_value = "0644")]
    pub mode: String,
}

pub fn execute(args: InstallArgs) -> Result<()> {
    let mode = conf::parse_mode(&args.mode)?;
    conf::install_file(&args.source, &args.dest, args.force, mode)
}
