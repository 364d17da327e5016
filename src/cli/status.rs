//! Implementation of `pgwrap status`.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use serde::Serialize;

use crate::{
    lockfile::{self, LockFileInfo, ProcessProbe, ProcessState, SignalProbe},
    Error, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum StatusFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Args, Default)]
pub struct StatusArgs {
    /// Database data directory containing postmaster.pid
    #[arg(short = 'D', long = "pgdata")]
    pub data_dir: Option<PathBuf>,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: StatusFormat,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    pub process: ProcessState,
    pub lock_file: LockFileInfo,
}

pub fn execute(args: StatusArgs) -> Result<()> {
    let data_dir = args
        .data_dir
        .ok_or_else(|| Error::Cli("data directory is required".into()))?;
    let report = report(&data_dir, &SignalProbe)?;

    match args.format {
        StatusFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        StatusFormat::Text => print!("{}", format_text(&serde_json::to_value(&report)?)),
    }
    Ok(())
}

pub fn report(data_dir: &std::path::Path, probe: &dyn ProcessProbe) -> Result<StatusReport> {
    let path = lockfile::lock_file_path(data_dir);
    if !path.exists() {
        return Err(Error::Cli(format!("no postmaster.pid in {}", data_dir.display())).into());
    }
    let lock_file = LockFileInfo::read(&path)?;
    Ok(StatusReport {
        process: probe.state(lock_file.pid),
        lock_file,
    })
}

/// Flatten nested objects into sorted `a.b=value` lines.
fn format_text(value: &serde_json::Value) -> String {
    fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<String>) {
        match value {
            serde_json::Value::Object(map) => {
                for (k, v) in map {
                    let key = if prefix.is_empty() {
                        k.clone()
                    } else {
                        format!("{prefix}.{k}")
                    };
                    walk(&key, v, out);
                }
            }
            serde_json::Value::Null => out.push(format!("{prefix}=")),
            serde_json::Value::String(s) => out.push(format!("{prefix}={s}")),
            other => out.push(format!("{prefix}={other}")),
        }
    }

    let mut lines = Vec::new();
    walk("", value, &mut lines);
    lines.sort();
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
