use crate::backup::backup_config::BackupConfig;
use crate::backup::plan::CopyAction;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::validate::validate_writable_dir;

use tempfile::NamedTempFile;

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Seek, Write};
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopyFailure {
    pub kind: io::ErrorKind,
    pub message: String,
}

impl From<Error> for CopyFailure {
    fn from(error: Error) -> Self {
        let kind = match error.root() {
            Error::Io(e) => e.kind(),
            _ => io::ErrorKind::Other,
        };
        Self {
            kind,
            message: error.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CopyStatus {
    Copied,
    Failed(CopyFailure),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopyOutcome {
    pub action: CopyAction,
    pub status: CopyStatus,
}

impl CopyOutcome {
    pub fn is_copied(&self) -> bool {
        self.status == CopyStatus::Copied
    }
}

/// Carries out a plan, one action at a time. A failing action is recorded
/// and the next one is attempted.
pub struct Executor<'a> {
    target: &'a Path,
}

impl<'a> Executor<'a> {
    pub fn new(config: &'a BackupConfig) -> Self {
        Self {
            target: config.target_directory(),
        }
    }

    /// Creates the target directory if needed and makes sure it accepts
    /// writes.
    pub fn prepare(&self) -> Result<()> {
        validate_writable_dir(self.target).map_err(|e| Error::TargetUnavailable {
            path: self.target.to_path_buf(),
            reason: e.to_string(),
        })?;
        tracing::info!("The backup directory is: {:?}", self.target);
        Ok(())
    }

    pub fn execute<I: IntoIterator<Item = CopyAction>>(&self, actions: I) -> Vec<CopyOutcome> {
        let outcomes: Vec<_> = actions
            .into_iter()
            .map(|action| {
                let status = match apply(&action) {
                    Ok(()) => {
                        tracing::debug!(
                            "Copied {:?} -> {:?}",
                            action.source.absolute_path,
                            action.destination
                        );
                        CopyStatus::Copied
                    }
                    Err(e) => {
                        tracing::error!("{e}");
                        CopyStatus::Failed(e.into())
                    }
                };
                CopyOutcome { action, status }
            })
            .collect();

        tracing::info!(
            "Copied {} of {} planned paths",
            outcomes.iter().filter(|o| o.is_copied()).count(),
            outcomes.len()
        );
        outcomes
    }
}

fn apply(action: &CopyAction) -> Result<()> {
    let res = if action.source.is_directory {
        std::fs::create_dir_all(&action.destination).map_err(Error::from)
    } else {
        copy_file(&action.source.absolute_path, &action.destination)
    };
    res.with_msg(format!(
        "The following file can not be copied: {:?} -> {:?}",
        action.source.absolute_path, action.destination
    ))
}

/// Streams `src` into a temporary file next to `dst`, then renames it into
/// place. Every handle is closed and the temporary file removed on any
/// early return.
fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    let parent = dst
        .parent()
        .ok_or_else(|| io::Error::other("destination has no parent directory"))?;
    std::fs::create_dir_all(parent)?;

    let mut reader = File::open(src)?;
    let metadata = reader.metadata()?;

    if dst.is_file() {
        match same_content(&mut reader, metadata.len(), dst) {
            Ok(true) => {
                tracing::debug!("Unchanged, leaving {:?} as is", dst);
                return Ok(());
            }
            Ok(false) => tracing::warn!("Overwriting {:?} with newer content from {:?}", dst, src),
            Err(e) => tracing::debug!("Cannot compare with existing {:?}: {}", dst, e),
        }
        reader.rewind()?;
    }

    let mut tmp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        io::copy(&mut reader, &mut writer)?;
        writer.flush()?;
    }
    tmp.as_file().set_permissions(metadata.permissions())?;
    if let Ok(modified) = metadata.modified() {
        tmp.as_file().set_modified(modified)?;
    }
    tmp.persist(dst).map_err(|e| Error::from(e.error))?;
    Ok(())
}

fn same_content(reader: &mut File, len: u64, dst: &Path) -> io::Result<bool> {
    let existing = File::open(dst)?;
    if existing.metadata()?.len() != len {
        return Ok(false);
    }

    let mut a = BufReader::new(reader);
    let mut b = BufReader::new(existing);
    loop {
        let (n, equal) = {
            let x = a.fill_buf()?;
            let y = b.fill_buf()?;
            if x.is_empty() || y.is_empty() {
                return Ok(x.is_empty() && y.is_empty());
            }
            let n = x.len().min(y.len());
            (n, x[..n] == y[..n])
        };
        if !equal {
            return Ok(false);
        }
        a.consume(n);
        b.consume(n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::backup_config::{EntryIndex, SourceEntry};
    use crate::backup::resolve::ResolvedPath;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn action(src: &Path, dst: &Path) -> CopyAction {
        CopyAction {
            source: ResolvedPath {
                absolute_path: src.to_path_buf(),
                relative_path: PathBuf::from(src.file_name().unwrap()),
                origin: EntryIndex::from(0),
                is_directory: false,
            },
            destination: dst.to_path_buf(),
        }
    }

    fn config(target: &Path) -> BackupConfig {
        BackupConfig::builder()
            .target_directory(target)
            .entries(vec![SourceEntry::builder().path("/unused").build()])
            .build()
    }

    #[test]
    fn test_copy_creates_parents_and_content() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("a.txt");
        std::fs::write(&src, "hello").unwrap();
        let target = temp_dir.path().join("backup");
        let dst = target.join("deep/er/a.txt");

        let config = config(&target);
        let executor = Executor::new(&config);
        executor.prepare().unwrap();
        let outcomes = executor.execute(vec![action(&src, &dst)]);

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_copied());
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "hello");
    }

    #[test]
    fn test_failure_does_not_abort_run() {
        let temp_dir = TempDir::new().unwrap();
        let good = temp_dir.path().join("good.txt");
        std::fs::write(&good, "good").unwrap();
        let vanished = temp_dir.path().join("vanished.txt");
        let target = temp_dir.path().join("backup");

        let config = config(&target);
        let outcomes = Executor::new(&config).execute(vec![
            action(&vanished, &target.join("vanished.txt")),
            action(&good, &target.join("good.txt")),
        ]);

        match &outcomes[0].status {
            CopyStatus::Failed(failure) => {
                assert_eq!(failure.kind, io::ErrorKind::NotFound);
                assert!(failure.message.contains("vanished.txt"));
            }
            CopyStatus::Copied => panic!("Expected failure"),
        }
        assert!(outcomes[1].is_copied());
        assert_eq!(std::fs::read_to_string(target.join("good.txt")).unwrap(), "good");
    }

    #[test]
    fn test_existing_destination_is_overwritten_when_different() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("a.txt");
        let dst = temp_dir.path().join("backup/a.txt");
        std::fs::create_dir_all(dst.parent().unwrap()).unwrap();
        std::fs::write(&src, "new content").unwrap();
        std::fs::write(&dst, "old").unwrap();

        let config = config(&temp_dir.path().join("backup"));
        let outcomes = Executor::new(&config).execute(vec![action(&src, &dst)]);

        assert!(outcomes[0].is_copied());
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "new content");
    }

    #[test]
    fn test_same_content_detection() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a");
        let b = temp_dir.path().join("b");
        let c = temp_dir.path().join("c");
        let data = vec![7u8; 20_000];
        std::fs::write(&a, &data).unwrap();
        std::fs::write(&b, &data).unwrap();
        let mut other = data.clone();
        other[19_999] = 8;
        std::fs::write(&c, &other).unwrap();

        let mut reader = File::open(&a).unwrap();
        assert!(same_content(&mut reader, 20_000, &b).unwrap());
        let mut reader = File::open(&a).unwrap();
        assert!(!same_content(&mut reader, 20_000, &c).unwrap());
        let mut reader = File::open(&a).unwrap();
        assert!(!same_content(&mut reader, 19_000, &b).unwrap());
    }

    #[test]
    fn test_directory_action_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("empty");
        std::fs::create_dir(&src).unwrap();
        let dst = temp_dir.path().join("backup/empty");

        let mut action = action(&src, &dst);
        action.source.is_directory = true;
        let config = config(&temp_dir.path().join("backup"));
        let outcomes = Executor::new(&config).execute(vec![action.clone(), action]);

        assert!(outcomes.iter().all(CopyOutcome::is_copied));
        assert!(dst.is_dir());
    }

    #[test]
    fn test_prepare_rejects_file_target() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("not_a_dir");
        std::fs::write(&target, "x").unwrap();

        let config = config(&target);
        let err = Executor::new(&config).prepare().unwrap_err();
        assert!(matches!(err, Error::TargetUnavailable { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn test_permissions_are_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("run.sh");
        std::fs::write(&src, "#!/bin/sh").unwrap();
        std::fs::set_permissions(&src, std::fs::Permissions::from_mode(0o750)).unwrap();
        let dst = temp_dir.path().join("backup/run.sh");

        let config = config(&temp_dir.path().join("backup"));
        Executor::new(&config).execute(vec![action(&src, &dst)]);

        let mode = std::fs::metadata(&dst).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
    }
}
