//! Structured explanations for paths that were not copied.

use derive_more::Display;
use serde::{Serialize, Serializer};
use serde_with::skip_serializing_none;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, Display, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    #[display("not found")]
    NotFound,
    #[display("permission denied")]
    PermissionDenied,
    #[display("excluded")]
    Excluded,
    #[display("destination conflict")]
    DestinationConflict,
}

impl SkipReason {
    /// Exclusions are requested by the user and do not make a run fail.
    pub fn is_error(&self) -> bool {
        !matches!(self, SkipReason::Excluded)
    }

    /// Maps an I/O failure met while inspecting a source path.
    pub fn from_io_kind(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::PermissionDenied => SkipReason::PermissionDenied,
            _ => SkipReason::NotFound,
        }
    }
}

/// Writes a path as a string, replacing bytes that are not valid UTF-8.
pub fn serialize_lossy_path<P: AsRef<Path>, S: Serializer>(
    path: &P,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&path.as_ref().display())
}

#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct SkipRecord {
    #[serde(serialize_with = "serialize_lossy_path")]
    pub path: PathBuf,
    pub reason: SkipReason,
    pub detail: Option<String>,
}

impl SkipRecord {
    pub fn new<P: Into<PathBuf>>(path: P, reason: SkipReason) -> Self {
        Self {
            path: path.into(),
            reason,
            detail: None,
        }
    }

    pub fn with_detail<S: Into<String>>(mut self, detail: S) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn from_io_error<P: AsRef<Path>>(path: P, error: &io::Error) -> Self {
        Self::new(path.as_ref(), SkipReason::from_io_kind(error.kind()))
            .with_detail(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_excluded_is_not_an_error() {
        assert!(!SkipReason::Excluded.is_error());
        assert!(SkipReason::NotFound.is_error());
        assert!(SkipReason::PermissionDenied.is_error());
        assert!(SkipReason::DestinationConflict.is_error());
    }

    #[test]
    fn test_from_io_error() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        let record = SkipRecord::from_io_error("/etc/shadow", &err);
        assert_eq!(record.reason, SkipReason::PermissionDenied);
        assert_eq!(record.detail.as_deref(), Some("nope"));

        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(
            SkipRecord::from_io_error("/x", &err).reason,
            SkipReason::NotFound
        );
    }

    #[test]
    fn test_serialize_omits_missing_detail() {
        let json = serde_json::to_string(&SkipRecord::new("/a", SkipReason::Excluded)).unwrap();
        assert_eq!(json, r#"{"path":"/a","reason":"excluded"}"#);
    }

    #[test]
    #[cfg(unix)]
    fn test_serialize_non_utf8_path() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new("/data").join(OsStr::from_bytes(b"bad\xffname"));
        let json = serde_json::to_string(&SkipRecord::new(path, SkipReason::NotFound)).unwrap();
        assert_eq!(json, "{\"path\":\"/data/bad\u{FFFD}name\",\"reason\":\"not_found\"}");
    }
}
