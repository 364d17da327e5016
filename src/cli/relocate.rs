//! Implementation of `pgwrap relocate`.

use std::path::PathBuf;

use clap::Args;

use crate::{cluster, Result};

#[derive(Debug, Clone, Args)]
pub struct RelocateArgs {
    /// Service owning the cluster: calendar, wiki or devicemgr
    pub service: String,

    /// New location of the cluster directory; must not exist yet
    pub destination: PathBuf,

    /// Cluster directory to move (defaults to the service's standard location)
    #[arg(long = "source")]
    pub source: Option<PathBuf>,

    /// Validate and print the plan as JSON without moving anything
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

pub fn execute(args: RelocateArgs) -> Result<()> {
    let plan = cluster::plan(&args.service, args.source.as_deref(), &args.destination)?;
    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }
    cluster::execute(&plan)?;
    println!(
        "{} cluster moved to {}",
        plan.service,
        plan.destination.display()
    );
    Ok(())
}
