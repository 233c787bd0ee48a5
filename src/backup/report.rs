//! End-of-run accounting and the exit status derived from it.

use crate::backup::execute::CopyOutcome;
use crate::backup::skip::{SkipReason, SkipRecord};

use itertools::Itertools;

pub const EXIT_OK: u8 = 0;
pub const EXIT_PARTIAL: u8 = 1;
pub const EXIT_FATAL: u8 = 2;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    pub skips: Vec<SkipRecord>,
    pub outcomes: Vec<CopyOutcome>,
}

impl RunReport {
    pub fn copied(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_copied()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CopyOutcome> {
        self.outcomes.iter().filter(|o| !o.is_copied())
    }

    /// Skips that point at a problem, as opposed to requested exclusions.
    pub fn error_skips(&self) -> impl Iterator<Item = &SkipRecord> {
        self.skips.iter().filter(|s| s.reason.is_error())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none() && self.error_skips().next().is_none()
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            EXIT_OK
        } else {
            EXIT_PARTIAL
        }
    }

    /// Reports every error skip, then a one-line summary. Failed copies were
    /// already logged by the executor as they happened.
    pub fn log_summary(&self) {
        for skip in self.error_skips() {
            match &skip.detail {
                Some(detail) => {
                    tracing::warn!("Not backed up ({}): {:?}: {}", skip.reason, skip.path, detail)
                }
                None => tracing::warn!("Not backed up ({}): {:?}", skip.reason, skip.path),
            }
        }

        let by_reason = self
            .skips
            .iter()
            .counts_by(|s| s.reason)
            .into_iter()
            .sorted()
            .map(|(reason, count)| format!("{count} {reason}"))
            .join(", ");
        let failed = self.failures().count();
        if self.is_success() {
            tracing::info!(
                "Backup finished: {} copied, {} skipped [{}]",
                self.copied(),
                self.skips.len(),
                by_reason
            );
        } else {
            tracing::warn!(
                "Backup finished with errors: {} copied, {} failed, {} skipped [{}]",
                self.copied(),
                failed,
                self.skips.len(),
                by_reason
            );
        }
    }

    pub fn count(&self, reason: SkipReason) -> usize {
        self.skips.iter().filter(|s| s.reason == reason).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::backup_config::EntryIndex;
    use crate::backup::execute::{CopyFailure, CopyStatus};
    use crate::backup::plan::CopyAction;
    use crate::backup::resolve::ResolvedPath;
    use std::path::PathBuf;

    fn outcome(status: CopyStatus) -> CopyOutcome {
        CopyOutcome {
            action: CopyAction {
                source: ResolvedPath {
                    absolute_path: PathBuf::from("/src/a"),
                    relative_path: PathBuf::from("a"),
                    origin: EntryIndex::from(0),
                    is_directory: false,
                },
                destination: PathBuf::from("/dst/a"),
            },
            status,
        }
    }

    #[test]
    fn test_empty_report_is_success() {
        let report = RunReport::default();
        assert!(report.is_success());
        assert_eq!(report.exit_code(), EXIT_OK);
    }

    #[test]
    fn test_exclusions_do_not_fail_the_run() {
        let report = RunReport {
            skips: vec![SkipRecord::new("/src/a.log", SkipReason::Excluded)],
            outcomes: vec![outcome(CopyStatus::Copied)],
        };
        assert!(report.is_success());
        assert_eq!(report.copied(), 1);
        assert_eq!(report.count(SkipReason::Excluded), 1);
    }

    #[test]
    fn test_not_found_fails_the_run() {
        let report = RunReport {
            skips: vec![SkipRecord::new("/home/u/missing", SkipReason::NotFound)],
            outcomes: vec![],
        };
        assert!(!report.is_success());
        assert_eq!(report.exit_code(), EXIT_PARTIAL);
    }

    #[test]
    fn test_failed_copy_fails_the_run() {
        let report = RunReport {
            skips: vec![],
            outcomes: vec![
                outcome(CopyStatus::Copied),
                outcome(CopyStatus::Failed(CopyFailure {
                    kind: std::io::ErrorKind::Other,
                    message: "disk full".into(),
                })),
            ],
        };
        assert_eq!(report.copied(), 1);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.exit_code(), EXIT_PARTIAL);
        report.log_summary();
    }
}
