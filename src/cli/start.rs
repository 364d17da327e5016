//! Implementation of `pgwrap start`.

use std::{ffi::OsString, path::PathBuf};

use clap::Args;
use tracing::{info, instrument, warn};

use crate::{
    args::{self, PlistBuddyReader, PlistReader},
    cli::Settings,
    launch::{self, MountWaiter, Wait4Path},
    lockfile::{self, ProcessProbe, RepairOutcome, SignalProbe},
    Result,
};

#[derive(Debug, Clone, Args, Default)]
pub struct StartArgs {
    /// Arguments for the database server. `-a/--apple-configuration <plist>`
    /// merges the plist's ProgramArguments into this list.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
    pub server_args: Vec<String>,
}

/// Everything `start` works out before handing over to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartPlan {
    pub server_args: Vec<String>,
    pub data_dir: Option<PathBuf>,
    pub repair: Option<RepairOutcome>,
    pub mount_wait_code: Option<i32>,
}

pub fn execute(args: StartArgs, settings: &Settings) -> Result<()> {
    let reader = PlistBuddyReader::new(&settings.plistbuddy);
    let waiter = Wait4Path::new(&settings.wait4path);
    let plan = prepare(
        args.server_args,
        std::env::var_os("PGDATA"),
        &reader,
        &SignalProbe,
        &waiter,
    )?;

    Err(launch::exec_server(&settings.postgres, &plan.server_args).into())
}

/// Run every step of `start` except the final exec.
#[instrument(skip_all, fields(argc = original.len()))]
pub fn prepare(
    original: Vec<String>,
    pgdata_env: Option<OsString>,
    reader: &dyn PlistReader,
    probe: &dyn ProcessProbe,
    waiter: &dyn MountWaiter,
) -> Result<StartPlan> {
    let server_args = args::assemble(original.clone(), reader)?;
    let data_dir = args::resolve_data_dir(&original, &server_args, pgdata_env);

    let Some(dir) = data_dir.as_deref() else {
        info!("no data directory given; skipping lock file repair and mount wait");
        return Ok(StartPlan {
            server_args,
            data_dir: None,
            repair: None,
            mount_wait_code: None,
        });
    };

    let repair = match lockfile::repair(dir, probe) {
        Ok(outcome) => Some(outcome),
        Err(err) => {
            warn!(data_directory = %dir.display(), error = %err, "lock file repair failed; continuing");
            None
        }
    };

    let status = waiter.wait_for(dir)?;
    if status.success() {
        info!(data_directory = %dir.display(), "data directory available");
    } else {
        warn!(data_directory = %dir.display(), %status, "mount wait helper failed; starting anyway");
    }

    Ok(StartPlan {
        server_args,
        data_dir,
        repair,
        mount_wait_code: status.code(),
    })
}
