use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};
use std::fmt::Debug;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors. Anything returned as an `Error` aborts the run; per-path
/// problems are reported as skip records or failed outcomes instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Glob(#[from] globset::Error),
    #[error("Config file not found: {0:?}")]
    ConfigNotFound(PathBuf),
    #[error("Config file is not valid JSON: {0}")]
    MalformedConfig(serde_json::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Cannot determine default config location: {0}")]
    NoDefaultLocation(String),
    #[error("Target directory {path:?} is unavailable: {reason}")]
    TargetUnavailable { path: PathBuf, reason: String },
    #[error("{}:\n{}", msg, indent::indent_all_with("  ", error.to_string()))]
    WithMsg { msg: String, error: Box<Error> },
    #[error(
        "{:?} {} failed:\n{}",
        obj_debug,
        fn_name,
        indent::indent_all_with("  ", error.to_string())
    )]
    WithDebugObjAndFnName {
        error: Box<Error>,
        obj_debug: Box<dyn Debug + Send>,
        fn_name: String,
    },
}

impl<S: Into<String>, O: Debug + Send + 'static> WithDebugObjectAndFnName<S, O> for Error {
    fn with_debug_object_and_fn_name(self, obj: O, fn_name: S) -> Self {
        Error::WithDebugObjAndFnName {
            error: Box::new(self),
            obj_debug: Box::new(obj),
            fn_name: fn_name.into(),
        }
    }
}

impl<S: Into<String>> WithMsg<S> for Error {
    fn with_msg(self, msg: S) -> Self {
        Self::WithMsg {
            msg: msg.into(),
            error: Box::new(self),
        }
    }
}

impl From<serde_json::Error> for Error {
    /// Syntax and truncation problems mean the file is not JSON at all; data
    /// errors mean it is JSON with the wrong shape.
    fn from(value: serde_json::Error) -> Self {
        use serde_json::error::Category;
        match value.classify() {
            Category::Syntax | Category::Eof => Self::MalformedConfig(value),
            Category::Data | Category::Io => Self::InvalidConfig(value.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(value: validator::ValidationErrors) -> Self {
        Self::InvalidConfig(value.to_string())
    }
}

impl Error {
    /// Unwraps context layers down to the error that actually happened.
    pub fn root(&self) -> &Error {
        match self {
            Error::WithMsg { error, .. } | Error::WithDebugObjAndFnName { error, .. } => {
                error.root()
            }
            e => e,
        }
    }
}
