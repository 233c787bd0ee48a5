//! Config file location.
//!
//! ## Resolution order
//!
//! 1. An explicit path given on the command line (must exist)
//! 2. Unix-like: `$XDG_CONFIG_HOME/tribud/config.json`, or
//!    `~/.config/tribud/config.json` when the variable is unset or empty
//! 3. Windows: `%LOCALAPPDATA%\tribud\tribud\config.json`

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;

use bon::Builder;

use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "tribud";
pub const CONFIG_FILE: &str = "config.json";

/// Knows where the platform expects the config file to live.
pub trait DefaultConfigLocation {
    fn default_config_path(&self) -> Result<PathBuf>;
}

/// XDG base directory convention used on Linux, the BSDs and macOS.
#[derive(Clone, Debug, Default, Builder)]
pub struct XdgConfigLocation {
    #[builder(into)]
    xdg_config_home: Option<PathBuf>,
    #[builder(into)]
    home: Option<PathBuf>,
}

impl XdgConfigLocation {
    pub fn from_env() -> Self {
        Self {
            xdg_config_home: std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
            home: dirs::home_dir(),
        }
    }
}

impl DefaultConfigLocation for XdgConfigLocation {
    fn default_config_path(&self) -> Result<PathBuf> {
        // XDG ignores an empty or relative XDG_CONFIG_HOME.
        let config_home = match &self.xdg_config_home {
            Some(dir) if dir.is_absolute() => dir.clone(),
            _ => self
                .home
                .as_ref()
                .map(|home| home.join(".config"))
                .ok_or_else(|| Error::NoDefaultLocation("home directory is unknown".into()))?,
        };
        Ok(config_home.join(APP_NAME).join(CONFIG_FILE))
    }
}

/// Fixed location under the local application data directory.
#[derive(Clone, Debug, Default, Builder)]
pub struct WindowsConfigLocation {
    #[builder(into)]
    local_app_data: Option<PathBuf>,
}

impl WindowsConfigLocation {
    pub fn from_env() -> Self {
        Self {
            local_app_data: dirs::data_local_dir(),
        }
    }
}

impl DefaultConfigLocation for WindowsConfigLocation {
    fn default_config_path(&self) -> Result<PathBuf> {
        self.local_app_data
            .as_ref()
            .map(|dir| dir.join(APP_NAME).join(APP_NAME).join(CONFIG_FILE))
            .ok_or_else(|| {
                Error::NoDefaultLocation("local application data directory is unknown".into())
            })
    }
}

/// Picks the location strategy for the platform this binary runs on.
pub fn platform_location() -> Box<dyn DefaultConfigLocation> {
    if cfg!(windows) {
        Box::new(WindowsConfigLocation::from_env())
    } else {
        Box::new(XdgConfigLocation::from_env())
    }
}

/// Returns the config file to load, failing with [`Error::ConfigNotFound`]
/// when nothing exists at the chosen location.
///
/// An explicit path that does not exist is an error rather than a reason to
/// fall back to the default location.
pub fn locate<L: DefaultConfigLocation + ?Sized>(
    explicit: Option<&Path>,
    location: &L,
) -> Result<PathBuf> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => location.default_config_path()?,
    };

    if path.is_file() {
        tracing::info!("Path to config: {:?}", path);
        Ok(path)
    } else {
        tracing::error!("Config file doesn't exist: {:?}", path);
        Err(Error::ConfigNotFound(path))
    }
}
