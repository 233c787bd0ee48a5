//! Turns resolved paths into a frozen list of copy actions.

use crate::backup::backup_config::{BackupConfig, DestinationLayout};
use crate::backup::resolve::ResolvedPath;
use crate::backup::skip::{serialize_lossy_path, SkipReason, SkipRecord};

use serde::Serialize;

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf, Prefix};

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct CopyAction {
    pub source: ResolvedPath,
    #[serde(serialize_with = "serialize_lossy_path")]
    pub destination: PathBuf,
}

/// Everything a run will do, computed before the first byte is written.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct Plan {
    pub actions: Vec<CopyAction>,
    pub skips: Vec<SkipRecord>,
}

pub struct CopyPlanner<'a> {
    config: &'a BackupConfig,
}

impl<'a> CopyPlanner<'a> {
    pub fn new(config: &'a BackupConfig) -> Self {
        Self { config }
    }

    /// First come, first served: when two sources map to one destination the
    /// later one is skipped as a conflict, never copied over the earlier one.
    /// A file can not be placed where an earlier destination needs a
    /// directory, nor below an earlier file.
    pub fn plan<I: IntoIterator<Item = ResolvedPath>>(&self, resolved: I) -> Plan {
        let mut plan = Plan::default();
        let mut claimed = Claims::default();

        for source in resolved {
            let destination = self.destination_for(&source);
            match claimed.conflict(self.config.target_directory(), &destination, &source) {
                Some(first) => {
                    tracing::debug!(
                        "Skipping {:?}: {:?} collides with the destination of {:?}",
                        source.absolute_path,
                        destination,
                        first
                    );
                    let detail = format!("{:?} collides with {:?}", destination, first);
                    plan.skips.push(
                        SkipRecord::new(&source.absolute_path, SkipReason::DestinationConflict)
                            .with_detail(detail),
                    );
                }
                None => {
                    claimed.claim(self.config.target_directory(), &destination, &source);
                    tracing::trace!("Planned {:?} -> {:?}", source.absolute_path, destination);
                    plan.actions.push(CopyAction {
                        source,
                        destination,
                    });
                }
            }
        }

        tracing::info!(
            "Planned {} copies, {} conflicts",
            plan.actions.len(),
            plan.skips.len()
        );
        plan
    }

    pub fn destination_for(&self, source: &ResolvedPath) -> PathBuf {
        let target = self.config.target_directory();
        match self.config.layout() {
            DestinationLayout::Entry => target.join(&source.relative_path),
            DestinationLayout::FullPath => target.join(mirrored(&source.absolute_path)),
        }
    }
}

/// The absolute path re-rooted as a relative one. Drive letters and UNC
/// hosts become ordinary leading components so sources on different volumes
/// stay apart.
fn mirrored(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => match prefix.kind() {
                Prefix::Disk(d) | Prefix::VerbatimDisk(d) => out.push((d as char).to_string()),
                Prefix::UNC(server, share) | Prefix::VerbatimUNC(server, share) => {
                    out.push(server);
                    out.push(share);
                }
                Prefix::Verbatim(p) | Prefix::DeviceNS(p) => out.push(p),
            },
            Component::Normal(c) => out.push(c),
            Component::RootDir | Component::CurDir | Component::ParentDir => {}
        }
    }
    out
}

/// Destinations already handed out, keyed by [`conflict_key`].
#[derive(Default)]
struct Claims {
    /// Planned destinations and the source each one came from.
    destinations: HashMap<PathBuf, (PathBuf, bool)>,
    /// Directories implied by planned destinations below the target.
    directories: HashMap<PathBuf, PathBuf>,
}

impl Claims {
    /// The earlier source that `destination` would collide with, if any.
    fn conflict(&self, target: &Path, destination: &Path, source: &ResolvedPath) -> Option<&Path> {
        let key = conflict_key(destination);
        if let Some((first, _)) = self.destinations.get(&key) {
            return Some(first.as_path());
        }
        if !source.is_directory {
            if let Some(first) = self.directories.get(&key) {
                return Some(first.as_path());
            }
        }
        parents_below(target, destination).find_map(|parent| {
            match self.destinations.get(&conflict_key(parent)) {
                Some((first, false)) => Some(first.as_path()),
                _ => None,
            }
        })
    }

    fn claim(&mut self, target: &Path, destination: &Path, source: &ResolvedPath) {
        for parent in parents_below(target, destination) {
            self.directories
                .entry(conflict_key(parent))
                .or_insert_with(|| source.absolute_path.clone());
        }
        self.destinations.insert(
            conflict_key(destination),
            (source.absolute_path.clone(), source.is_directory),
        );
    }
}

/// Ancestors of `destination` strictly between it and `target`.
fn parents_below<'p>(target: &'p Path, destination: &'p Path) -> impl Iterator<Item = &'p Path> {
    destination
        .ancestors()
        .skip(1)
        .take_while(move |parent| *parent != target && parent.starts_with(target))
}

/// Windows file systems are case-insensitive, so two destinations differing
/// only in case are the same file there.
fn conflict_key(destination: &Path) -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(destination.to_string_lossy().to_lowercase())
    } else {
        destination.to_path_buf()
    }
}
