//! Validation functions for configuration values.
//!
//! Structural checks run at parse time and never touch the filesystem. The
//! directory checks are used when the target directory is prepared, right
//! before the first copy.

use validator::ValidationError;

use std::path::Path;

pub fn validate_non_empty_path<P: AsRef<Path>>(path: P) -> Result<(), ValidationError> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(ValidationError::new("EmptyPath").with_message("path must not be empty".into()));
    }

    if path.to_string_lossy().contains('\0') {
        return Err(ValidationError::new("InvalidPath")
            .with_message(format!("{:?} contains a null byte", path).into()));
    }

    Ok(())
}

pub fn validate_dir_exist_or_created<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    if dir.exists() {
        if !dir.is_dir() {
            return Err(ValidationError::new("InvalidDirectory")
                .with_message(format!("{:?} is not a directory", dir).into()));
        }
    } else {
        return std::fs::create_dir_all(dir).map_err(|e| {
            ValidationError::new("InvalidDirectory").with_message(
                format!("cannot create or access directory {:?}: {}", dir, e).into(),
            )
        });
    }

    Ok(())
}

pub fn validate_writable_dir<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    validate_dir_exist_or_created(dir)?;
    let md = std::fs::metadata(dir).map_err(|e| {
        ValidationError::new("InvalidDirectory")
            .with_message(format!("cannot access metadata for {:?}: {}", dir, e).into())
    })?;
    if md.permissions().readonly() {
        return Err(ValidationError::new("InvalidDirectory")
            .with_message(format!("cannot write to dir {:?}", dir).into()));
    }

    // Read-only bits do not tell the whole story on unix, so probe it.
    tempfile::Builder::new()
        .prefix(".tribud-probe")
        .tempfile_in(dir)
        .map(|_| ())
        .map_err(|e| {
            ValidationError::new("InvalidDirectory")
                .with_message(format!("cannot write to dir {:?}: {}", dir, e).into())
        })
}
