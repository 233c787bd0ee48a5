use crate::backup::backup_config::{BackupConfig, DestinationLayout, EntryIndex, SourceEntry};
use crate::backup::glob::ExcludeMatcher;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithDebugObjectAndFnName;
use crate::backup::skip::{serialize_lossy_path, SkipReason, SkipRecord};

use serde::Serialize;
use walkdir::WalkDir;

use std::fs::File;
use std::path::{Path, PathBuf};

const NOT_REGULAR: &str = "not a regular file";
const INSIDE_TARGET: &str = "inside target directory";

/// An existing source path that survived expansion and filtering.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Canonical location on disk.
    #[serde(serialize_with = "serialize_lossy_path")]
    pub absolute_path: PathBuf,
    /// Location relative to the entry's source root: the entry itself for a
    /// directory entry, its parent for a file entry.
    #[serde(serialize_with = "serialize_lossy_path")]
    pub relative_path: PathBuf,
    pub origin: EntryIndex,
    pub is_directory: bool,
}

#[derive(Debug, Default)]
pub struct Resolution {
    pub resolved: Vec<ResolvedPath>,
    pub skips: Vec<SkipRecord>,
}

impl Resolution {
    fn skip(&mut self, record: SkipRecord) {
        match record.reason {
            SkipReason::Excluded => tracing::debug!("Excluding {:?}", record.path),
            reason => tracing::debug!("Skipping {:?}: {}", record.path, reason),
        }
        self.skips.push(record);
    }
}

/// Expands configured entries into concrete files.
///
/// Output order is entry order, then lexicographic traversal order, so two
/// runs over the same tree resolve identically.
pub struct PathResolver<'a> {
    config: &'a BackupConfig,
    target: PathBuf,
}

impl<'a> PathResolver<'a> {
    pub fn new(config: &'a BackupConfig) -> Self {
        let target = std::fs::canonicalize(config.target_directory())
            .unwrap_or_else(|_| config.target_directory().clone());
        Self { config, target }
    }

    pub fn resolve(&self) -> Result<Resolution> {
        let mut resolution = Resolution::default();
        for (index, entry) in self.config.indexed_entries() {
            self.resolve_entry(index, entry, &mut resolution)
                .with_debug_object_and_fn_name(entry.clone(), "resolve_entry")?;
        }
        tracing::info!(
            "Resolved {} paths, {} skipped",
            resolution.resolved.len(),
            resolution.skips.len()
        );
        Ok(resolution)
    }

    fn resolve_entry(
        &self,
        index: EntryIndex,
        entry: &SourceEntry,
        out: &mut Resolution,
    ) -> Result<()> {
        let root = match std::fs::canonicalize(entry.path()) {
            Ok(root) => root,
            Err(e) => {
                out.skip(SkipRecord::from_io_error(entry.path(), &e));
                return Ok(());
            }
        };
        let metadata = match std::fs::metadata(&root) {
            Ok(md) => md,
            Err(e) => {
                out.skip(SkipRecord::from_io_error(entry.path(), &e));
                return Ok(());
            }
        };
        let excludes = ExcludeMatcher::new(entry.exclude_patterns())?;

        if metadata.is_dir() {
            tracing::debug!("Scanning directory {:?} with {:?}", root, excludes);
            self.walk_dir(index, &root, &excludes, out);
        } else if !metadata.is_file() {
            // Opening a named pipe blocks until a writer shows up.
            out.skip(SkipRecord::new(&root, SkipReason::Excluded).with_detail(NOT_REGULAR));
        } else {
            let Some(name) = root.file_name() else {
                let record = SkipRecord::new(&root, SkipReason::NotFound);
                out.skip(record.with_detail("path has no file name"));
                return Ok(());
            };
            self.add_file(index, &root, PathBuf::from(name), &excludes, out);
        }
        Ok(())
    }

    fn walk_dir(
        &self,
        index: EntryIndex,
        root: &Path,
        excludes: &ExcludeMatcher,
        out: &mut Resolution,
    ) {
        let keep_root = self.config.layout() == DestinationLayout::FullPath;
        let mut it = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();

        while let Some(res) = it.next() {
            let de = match res {
                Ok(de) => de,
                Err(e) => {
                    let path = e.path().unwrap_or(root).to_path_buf();
                    let record = if e.loop_ancestor().is_some() {
                        SkipRecord::new(path, SkipReason::NotFound).with_detail("symlink loop")
                    } else {
                        let reason = e
                            .io_error()
                            .map(|io| SkipReason::from_io_kind(io.kind()))
                            .unwrap_or(SkipReason::NotFound);
                        SkipRecord::new(path, reason).with_detail(e.to_string())
                    };
                    out.skip(record);
                    continue;
                }
            };

            let path = de.path();
            if path.starts_with(&self.target) {
                out.skip(SkipRecord::new(path, SkipReason::Excluded).with_detail(INSIDE_TARGET));
                if de.file_type().is_dir() {
                    it.skip_current_dir();
                }
                continue;
            }

            let relative = match path.strip_prefix(root) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => {
                    tracing::trace!("Skipping {:?} outside of {:?}", path, root);
                    continue;
                }
            };

            if de.file_type().is_dir() {
                if de.depth() == 0 && !keep_root {
                    continue;
                }
                if self.config.keep_empty_directories() && is_empty_dir(path) {
                    if excludes.is_excluded(&relative) {
                        out.skip(SkipRecord::new(path, SkipReason::Excluded));
                    } else {
                        tracing::trace!("Including empty directory: {:?}", path);
                        out.resolved.push(ResolvedPath {
                            absolute_path: path.to_path_buf(),
                            relative_path: relative,
                            origin: index,
                            is_directory: true,
                        });
                    }
                }
            } else if de.file_type().is_file() {
                self.add_file(index, path, relative, excludes, out);
            } else {
                out.skip(SkipRecord::new(path, SkipReason::Excluded).with_detail(NOT_REGULAR));
            }
        }
    }

    fn add_file(
        &self,
        index: EntryIndex,
        path: &Path,
        relative: PathBuf,
        excludes: &ExcludeMatcher,
        out: &mut Resolution,
    ) {
        if excludes.is_excluded(&relative) {
            out.skip(SkipRecord::new(path, SkipReason::Excluded));
            return;
        }
        if path.starts_with(&self.target) {
            out.skip(SkipRecord::new(path, SkipReason::Excluded).with_detail(INSIDE_TARGET));
            return;
        }
        if let Err(e) = File::open(path) {
            out.skip(SkipRecord::from_io_error(path, &e));
            return;
        }

        tracing::trace!("Including file: {:?}", path);
        out.resolved.push(ResolvedPath {
            absolute_path: path.to_path_buf(),
            relative_path: relative,
            origin: index,
            is_directory: false,
        });
    }
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut rd| rd.next().is_none())
        .unwrap_or(false)
}
