//! WAL archive settings in `postgresql.conf` and the matching replication
//! entry in `pg_hba.conf`.

use std::{borrow::Cow, fs, path::Path, sync::LazyLock};

use anyhow::Context;
use regex::Regex;
use tracing::info;

use super::{HBA_CONF, POSTGRES_CONF};
use crate::Result;

pub const MAX_WAL_SENDERS: &str = "2";
/// Seconds; zero disables forced segment switches.
pub const ARCHIVE_TIMEOUT: &str = "0";
pub const WAL_LEVEL: &str = "hot_standby";
/// Runs from the data directory; `%p` and `%f` are expanded by the server.
pub const DEFAULT_ARCHIVE_COMMAND: &str = "pgwrap archive %p ../backup/%f";

const HBA_REPLICATION_LINE: &str =
    "local   replication     all                                      trust";

struct Setting {
    key: &'static str,
    value: &'static str,
    default: &'static str,
}

const SETTINGS: [Setting; 5] = [
    Setting {
        key: "archive_mode",
        value: r"\S*",
        default: "off",
    },
    Setting {
        key: "archive_timeout",
        value: r"\d+",
        default: "0",
    },
    Setting {
        key: "max_wal_senders",
        value: r"\d+",
        default: "0",
    },
    Setting {
        key: "wal_level",
        value: r"\S*",
        default: "minimal",
    },
    Setting {
        key: "archive_command",
        value: r#"['"].*['"]"#,
        default: "''",
    },
];

struct Patterns {
    key: &'static str,
    default: &'static str,
    commented: Regex,
    active: Regex,
}

static PATTERNS: LazyLock<Vec<Patterns>> = LazyLock::new(|| {
    SETTINGS
        .iter()
        .map(|s| {
            // archive_command is replaced whether or not it is commented out.
            let hashes = if s.key == "archive_command" { "#*" } else { "#" };
            Patterns {
                key: s.key,
                default: s.default,
                commented: Regex::new(&format!(
                    r"^\s*{hashes}{}\s*=\s*{}(.*)$",
                    s.key, s.value
                ))
                .expect("static regex"),
                active: Regex::new(&format!(r"^\s*{}\s*=\s*{}(.*)$", s.key, s.value))
                    .expect("static regex"),
            }
        })
        .collect()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnabledConfig {
    pub postgres_conf: String,
    pub hba_conf: String,
}

fn enabled_value(key: &str, archive_command: &str) -> String {
    match key {
        "archive_mode" => "on".to_string(),
        "archive_timeout" => ARCHIVE_TIMEOUT.to_string(),
        "max_wal_senders" => MAX_WAL_SENDERS.to_string(),
        "wal_level" => WAL_LEVEL.to_string(),
        _ => format!("'{}'", archive_command.replace('\'', "''")),
    }
}

fn join_lines<'a>(lines: impl Iterator<Item = Cow<'a, str>>) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Uncomment and set the archive settings, and allow local replication
/// connections in `pg_hba.conf`.
pub fn enable_archiving(postgres_conf: &str, hba_conf: &str, archive_command: &str) -> EnabledConfig {
    let postgres_conf = join_lines(postgres_conf.lines().map(|line| {
        for p in PATTERNS.iter() {
            if let Some(caps) = p.commented.captures(line) {
                let value = enabled_value(p.key, archive_command);
                return Cow::Owned(format!("{} = {value}{}", p.key, &caps[1]));
            }
        }
        Cow::Borrowed(line)
    }));

    let mut hba_conf = join_lines(hba_conf.lines().map(Cow::Borrowed));
    if !hba_conf.lines().any(is_local_replication_trust) {
        hba_conf.push_str(HBA_REPLICATION_LINE);
        hba_conf.push('\n');
    }

    EnabledConfig {
        postgres_conf,
        hba_conf,
    }
}

/// Comment the archive settings out again, restoring their defaults.
pub fn disable_archiving(postgres_conf: &str) -> String {
    join_lines(postgres_conf.lines().map(|line| {
        for p in PATTERNS.iter() {
            if let Some(caps) = p.active.captures(line) {
                return Cow::Owned(format!("#{} = {}{}", p.key, p.default, &caps[1]));
            }
        }
        Cow::Borrowed(line)
    }))
}

/// Archiving counts as enabled only if none of the settings is commented out.
pub fn archiving_enabled(postgres_conf: &str) -> bool {
    !postgres_conf.lines().any(|line| {
        PATTERNS
            .iter()
            .any(|p| line.trim_start().starts_with('#') && p.commented.is_match(line))
    })
}

fn is_local_replication_trust(line: &str) -> bool {
    let fields: Vec<&str> = line.split_whitespace().collect();
    fields == ["local", "replication", "all", "trust"]
}

fn read_conf(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Rewrite the configuration files in `data_dir` with archiving switched on or off.
///
/// Both files are read before either is written. `postgresql.conf` is written
/// first, so a failed `pg_hba.conf` write leaves archiving configured without
/// the replication entry; the error says so.
pub fn set_archiving(data_dir: &Path, enable: bool, archive_command: &str) -> Result<()> {
    let postgres_path = data_dir.join(POSTGRES_CONF);
    let postgres_conf = read_conf(&postgres_path)?;

    if enable {
        let hba_path = data_dir.join(HBA_CONF);
        let hba_conf = read_conf(&hba_path)?;
        let updated = enable_archiving(&postgres_conf, &hba_conf, archive_command);
        crate::fs::rewrite_in_place(&postgres_path, updated.postgres_conf.as_bytes())
            .with_context(|| format!("failed to write {}", postgres_path.display()))?;
        crate::fs::rewrite_in_place(&hba_path, updated.hba_conf.as_bytes()).with_context(|| {
            format!(
                "failed to write {} ({} was already updated)",
                hba_path.display(),
                postgres_path.display()
            )
        })?;
    } else {
        let updated = disable_archiving(&postgres_conf);
        crate::fs::rewrite_in_place(&postgres_path, updated.as_bytes())
            .with_context(|| format!("failed to write {}", postgres_path.display()))?;
    }

    info!(data_directory = %data_dir.display(), enable, "archive logging updated");
    Ok(())
}

/// Read `postgresql.conf` in `data_dir` and report whether archiving is on.
pub fn archiving_status(data_dir: &Path) -> Result<bool> {
    let contents = read_conf(&data_dir.join(POSTGRES_CONF))?;
    Ok(archiving_enabled(&contents))
}
