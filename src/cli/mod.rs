//! Command-line surface: global settings plus one module per subcommand.

use std::path::PathBuf;

use clap::{error::ErrorKind, Args, CommandFactory, Parser, Subcommand};

use crate::{
    logging::{LogFormat, LoggingConfig},
    Error, Result,
};

pub mod archive;
pub mod install;
pub mod relocate;
pub mod segment;
pub mod start;
pub mod status;

pub const DEFAULT_POSTGRES: &str = "/Applications/Server.app/Contents/ServerRoot/usr/bin/postgres_real";
pub const DEFAULT_WAIT4PATH: &str = "/bin/wait4path";
pub const DEFAULT_PLISTBUDDY: &str = "/usr/libexec/PlistBuddy";

/// Paths of external collaborators and logging options, shared by all subcommands.
///
/// Accepted before the subcommand only; everything after `start` belongs to the server.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Real database server binary that `start` execs
    #[arg(long = "postgres", env = "PGWRAP_POSTGRES", default_value = DEFAULT_POSTGRES)]
    pub postgres: PathBuf,

    /// Helper that blocks until a path is mounted
    #[arg(long = "wait4path", env = "PGWRAP_WAIT4PATH", default_value = DEFAULT_WAIT4PATH)]
    pub wait4path: PathBuf,

    /// Property-list query tool used to read `--apple-configuration` files
    #[arg(long = "plistbuddy", env = "PGWRAP_PLISTBUDDY", default_value = DEFAULT_PLISTBUDDY)]
    pub plistbuddy: PathBuf,

    /// Log output format
    #[arg(long = "log-format", env = "PGWRAP_LOG_FORMAT", value_enum, default_value = "human")]
    pub log_format: LogFormat,

    /// Raise the default log level to debug
    #[arg(long = "debug", env = "PGWRAP_DEBUG")]
    pub debug: bool,
}

impl Settings {
    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            format: self.log_format,
            debug: self.debug,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            postgres: DEFAULT_POSTGRES.into(),
            wait4path: DEFAULT_WAIT4PATH.into(),
            plistbuddy: DEFAULT_PLISTBUDDY.into(),
            log_format: LogFormat::Human,
            debug: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    Start(start::StartArgs),
    InstallConfig(install::InstallArgs),
    Relocate(relocate::RelocateArgs),
    Status(status::StatusArgs),
    ArchiveLogging(archive::ArchiveArgs),
    Archive(segment::ArchiveSegmentArgs),
    PruneArchive(segment::PruneArchiveArgs),
    None,
}

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub settings: Settings,
    pub command: Command,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            command: Command::None,
        }
    }
}

pub fn dispatch(args: CliArgs) -> Result<()> {
    let settings = args.settings;
    match args.command {
        Command::Start(s) => start::execute(s, &settings),
        Command::InstallConfig(i) => install::execute(i),
        Command::Relocate(r) => relocate::execute(r),
        Command::Status(s) => status::execute(s),
        Command::ArchiveLogging(a) => archive::execute(a),
        Command::Archive(a) => segment::execute_archive(a),
        Command::PruneArchive(p) => segment::execute_prune(p),
        Command::None => Ok(()),
    }
}

#[derive(Parser, Debug)]
#[command(name = "pgwrap", version, about = "PostgreSQL startup wrapper and cluster maintenance helper")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Option<Subcommands>,
}

#[derive(Subcommand, Debug)]
enum Subcommands {
    /// Merge extra arguments, repair a stale lock file, wait for the data
    /// volume and exec the real database server.
    #[command(disable_help_flag = true)]
    Start(start::StartArgs),
    /// Install a configuration file atomically.
    InstallConfig(install::InstallArgs),
    /// Move a service's database cluster to a new location.
    Relocate(relocate::RelocateArgs),
    /// Show the contents of postmaster.pid and whether its process is alive.
    Status(status::StatusArgs),
    /// Enable, disable or query WAL archiving in the data directory.
    ArchiveLogging(archive::ArchiveArgs),
    /// Copy a WAL segment into the archive (used as archive_command).
    Archive(segment::ArchiveSegmentArgs),
    /// Remove superseded partial segments and interrupted copies.
    PruneArchive(segment::PruneArchiveArgs),
}

/// Parse CLI arguments into internal representation.
///
/// Help and version requests print and exit; every other parse failure is
/// returned as `Error::Usage`.
pub fn parse_args<I, S>(args: I) -> Result<CliArgs>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let argv: Vec<String> = args.into_iter().map(Into::into).collect();
    let cli = match Cli::try_parse_from(argv) {
        Ok(cli) => cli,
        Err(err)
            if matches!(
                err.kind(),
                ErrorKind::DisplayHelp
                    | ErrorKind::DisplayVersion
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ) =>
        {
            err.exit()
        }
        Err(err) => return Err(Error::Usage(err.to_string().trim().to_string()).into()),
    };

    let command = match cli.command {
        Some(Subcommands::Start(args)) => Command::Start(args),
        Some(Subcommands::InstallConfig(args)) => Command::InstallConfig(args),
        Some(Subcommands::Relocate(args)) => Command::Relocate(args),
        Some(Subcommands::Status(args)) => Command::Status(args),
        Some(Subcommands::ArchiveLogging(args)) => Command::ArchiveLogging(args),
        Some(Subcommands::Archive(args)) => Command::Archive(args),
        Some(Subcommands::PruneArchive(args)) => Command::PruneArchive(args),
        None => Command::None,
    };

    Ok(CliArgs {
        settings: cli.settings,
        command,
    })
}

/// Build the underlying clap `Command` (useful for help/usage contract tests).
pub fn clap_command() -> clap::Command {
    Cli::command()
}
