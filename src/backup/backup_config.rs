use crate::backup::execute::Executor;
use crate::backup::function_path;
use crate::backup::glob::CustomDeserializedGlob;
use crate::backup::plan::{CopyPlanner, Plan};
use crate::backup::report::RunReport;
use crate::backup::resolve::{PathResolver, Resolution};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};
use crate::backup::validate::validate_non_empty_path;

use bon::Builder;
use derive_more::{Display, From, Into};
use function_name::named;
use getset::Getters;
use serde::{Deserialize, Serialize};
use validator::Validate;

use std::path::{Component, Path, PathBuf};

/// How destination paths are derived from source paths.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DestinationLayout {
    /// Directory entries land directly under the target, file entries by
    /// file name.
    #[default]
    Entry,
    /// The whole absolute path of every source is mirrored under the target.
    FullPath,
}

/// One configured source file or directory.
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, PartialEq, Eq, Getters)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[getset(get = "pub")]
pub struct SourceEntry {
    #[validate(custom(function = validate_non_empty_path))]
    #[builder(into)]
    path: PathBuf,
    #[serde(default)]
    #[builder(default, into)]
    exclude_patterns: Vec<CustomDeserializedGlob>,
}

/// Non-owning reference from a resolved path back to its entry.
#[derive(Clone, Copy, Debug, Display, From, Into, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct EntryIndex(usize);

/// The whole run configuration. Immutable once loaded.
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, PartialEq, Eq, Getters)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[getset(get = "pub")]
pub struct BackupConfig {
    #[validate(custom(function = validate_non_empty_path))]
    #[builder(into)]
    target_directory: PathBuf,
    #[validate(nested)]
    #[builder(into)]
    entries: Vec<SourceEntry>,
    #[serde(default)]
    #[builder(default)]
    #[getset(skip)]
    layout: DestinationLayout,
    #[serde(default)]
    #[builder(default)]
    #[getset(skip)]
    keep_empty_directories: bool,
}

impl BackupConfig {
    /// Parses and structurally validates a config. Relative paths are
    /// anchored at `anchor_dir`, normally the directory holding the config.
    ///
    /// No filesystem access happens here; missing sources are reported later
    /// by the resolver.
    pub fn parse<P: AsRef<Path>>(raw: &[u8], anchor_dir: P) -> Result<BackupConfig> {
        let mut config: BackupConfig = serde_json::from_slice(raw)?;
        config.validate()?;

        let anchor_dir = anchor_dir.as_ref();
        config.target_directory = anchor_path(anchor_dir, &config.target_directory);
        for entry in config.entries.iter_mut() {
            entry.path = anchor_path(anchor_dir, &entry.path);
        }

        tracing::debug!(
            "Parsed config: target {:?}, {} entries, layout {:?}",
            config.target_directory,
            config.entries.len(),
            config.layout
        );
        Ok(config)
    }

    /// Reads and parses the config file at `path`.
    #[named]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<BackupConfig> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::ConfigNotFound(path.to_path_buf()),
            _ => Error::from(e).with_msg(format!("Reading config file {:?} failed", path)),
        })?;

        let anchor_dir = match path.parent() {
            Some(parent) if parent.is_absolute() => parent.to_path_buf(),
            Some(parent) => std::env::current_dir()?.join(parent),
            None => std::env::current_dir()?,
        };

        Self::parse(&raw, anchor_dir)
            .with_debug_object_and_fn_name(path.to_path_buf(), function_path!())
    }

    /// Resolves every entry and freezes the resulting plan. Nothing is
    /// written.
    pub fn plan(&self) -> Result<Plan> {
        let Resolution { resolved, mut skips } = PathResolver::new(self).resolve()?;
        let mut plan = CopyPlanner::new(self).plan(resolved);
        skips.append(&mut plan.skips);
        plan.skips = skips;
        Ok(plan)
    }

    /// Prepares the target, plans, then copies. Only problems that stop the
    /// whole run are returned as errors; everything else is in the report.
    pub fn run(&self) -> Result<RunReport> {
        let executor = Executor::new(self);
        executor.prepare()?;
        let plan = self.plan()?;
        let outcomes = executor.execute(plan.actions);
        Ok(RunReport {
            skips: plan.skips,
            outcomes,
        })
    }

    pub fn layout(&self) -> DestinationLayout {
        self.layout
    }

    pub fn keep_empty_directories(&self) -> bool {
        self.keep_empty_directories
    }

    pub fn entry(&self, index: EntryIndex) -> Option<&SourceEntry> {
        self.entries.get(usize::from(index))
    }

    pub fn indexed_entries(&self) -> impl Iterator<Item = (EntryIndex, &SourceEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (EntryIndex::from(i), e))
    }
}

/// Makes `path` absolute against `anchor_dir` and removes `.`/`..`
/// components lexically. A leading `~` expands to the home directory.
pub fn anchor_path<P1: AsRef<Path>, P2: AsRef<Path>>(anchor_dir: P1, path: P2) -> PathBuf {
    let path = path.as_ref();
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().map(|home| home.join(rest)),
        Err(_) => None,
    };
    let path = expanded.as_deref().unwrap_or(path);

    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        anchor_dir.as_ref().join(path)
    };
    normalize_lexically(&joined)
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last = out.components().next_back();
                if !matches!(
                    last,
                    None | Some(Component::RootDir | Component::Prefix(_))
                ) {
                    out.pop();
                }
            }
            c => out.push(c.as_os_str()),
        }
    }
    out
}
