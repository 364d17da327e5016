use std::sync::LazyLock;

use parking_lot::ReentrantMutex;
use thiserror::Error;

pub mod archive;
pub mod args;
pub mod cli;
pub mod cluster;
pub mod conf;
pub mod fs;
pub mod launch;
pub mod lockfile;
pub mod logging;

pub type Result<T> = anyhow::Result<T>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("usage: {0}")]
    Usage(String),
    #[error("failed to read property list {path}: {reason}")]
    PlistRead { path: String, reason: String },
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to exec {program}: {source}")]
    Exec {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown service: {0} (expected one of: calendar, wiki, devicemgr)")]
    UnknownService(String),
    #[error("source does not exist: {0}")]
    MissingSource(String),
    #[error("destination parent directory does not exist: {0}")]
    MissingDestinationParent(String),
    #[error("destination already exists: {0}")]
    DestinationExists(String),
    #[error("move failed: {0}")]
    MoveFailed(String),
    #[error("invalid lock file {path}: {reason}")]
    InvalidLockFile { path: String, reason: String },
    #[error("serialization error")]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("cli error: {0}")]
    Cli(String),
}

/// Entry point for the library, called by the CLI thin wrapper.
pub fn run<I, S>(args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let cli_args = cli::parse_args(args.into_iter().map(Into::into))?;
    logging::init_logging(cli_args.settings.logging())?;
    cli::dispatch(cli_args)
}

/// Process-wide lock for code (mostly tests) that mutates environment variables.
pub fn env_lock() -> &'static ReentrantMutex<()> {
    static LOCK: LazyLock<ReentrantMutex<()>> = LazyLock::new(|| ReentrantMutex::new(()));
    &LOCK
}
