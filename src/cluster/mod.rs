//! One-time relocation of a service's database cluster.
//!
//! Every precondition is checked before anything is moved. There is no
//! rollback: a failure after validation leaves the filesystem as the failing
//! step left it and the operator re-runs once the reported problem is fixed.

use std::{
    fmt,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::Serialize;
use tracing::info;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Calendar,
    Wiki,
    DeviceMgr,
}

impl Service {
    pub const ALL: [Service; 3] = [Service::Calendar, Service::Wiki, Service::DeviceMgr];

    pub fn name(self) -> &'static str {
        match self {
            Service::Calendar => "calendar",
            Service::Wiki => "wiki",
            Service::DeviceMgr => "devicemgr",
        }
    }

    /// Where the service keeps its cluster when nothing has been moved yet.
    pub fn default_cluster_dir(self) -> PathBuf {
        PathBuf::from(match self {
            Service::Calendar => "/Library/Server/Calendar and Contacts/Data/Database.xpg",
            Service::Wiki => "/Library/Server/Wiki/Database.xpg",
            Service::DeviceMgr => "/Library/Server/ProfileManager/Config/ServiceData/Database.xpg",
        })
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Service {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Service::ALL
            .into_iter()
            .find(|svc| svc.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownService(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RelocationPlan {
    pub service: Service,
    /// Directory that is actually moved (the link target when `source_link` is set).
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Symbolic link that pointed at `source` and is removed after the move.
    pub source_link: Option<PathBuf>,
}

/// Validate a relocation without touching the filesystem.
pub fn plan(service: &str, source: Option<&Path>, destination: &Path) -> Result<RelocationPlan> {
    let service: Service = service.parse()?;

    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        return Err(Error::MissingDestinationParent(parent.display().to_string()).into());
    }
    if fs::symlink_metadata(destination).is_ok() {
        return Err(Error::DestinationExists(destination.display().to_string()).into());
    }

    let given = source
        .map(Path::to_path_buf)
        .unwrap_or_else(|| service.default_cluster_dir());
    let meta = fs::symlink_metadata(&given)
        .map_err(|_| Error::MissingSource(given.display().to_string()))?;

    let (resolved, source_link) = if meta.file_type().is_symlink() {
        let target = fs::canonicalize(&given)
            .map_err(|_| Error::MissingSource(format!("{} (dangling link)", given.display())))?;
        (target, Some(given))
    } else {
        (given, None)
    };
    if !resolved.is_dir() {
        return Err(Error::MissingSource(format!("{} is not a directory", resolved.display())).into());
    }

    let dest_abs = fs::canonicalize(parent)?.join(destination.file_name().unwrap_or_default());
    if dest_abs.starts_with(fs::canonicalize(&resolved)?) {
        return Err(Error::MoveFailed(format!(
            "destination {} is inside source {}",
            destination.display(),
            resolved.display()
        ))
        .into());
    }

    Ok(RelocationPlan {
        service,
        source: resolved,
        destination: destination.to_path_buf(),
        source_link,
    })
}

/// Carry out a validated plan: move the cluster, then drop the stale link.
pub fn execute(plan: &RelocationPlan) -> Result<()> {
    crate::fs::move_dir(&plan.source, &plan.destination)?;
    info!(
        service = %plan.service,
        from = %plan.source.display(),
        to = %plan.destination.display(),
        "cluster moved"
    );

    if let Some(link) = &plan.source_link {
        fs::remove_file(link)?;
        info!(link = %link.display(), "removed stale symbolic link");
    }
    Ok(())
}

pub fn relocate(service: &str, source: Option<&Path>, destination: &Path) -> Result<RelocationPlan> {
    let plan = plan(service, source, destination)?;
    execute(&plan)?;
    Ok(plan)
}
