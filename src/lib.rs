//! # tribud
//!
//! A trivial backup tool: copies configured files and directories into a
//! backup directory and reports what it could not copy.
//!
//! ## Features
//!
//! - **JSON configuration** found in the platform config directory or given explicitly
//! - **Exclude patterns**: per-entry globs filter files out of a directory entry
//! - **Safe planning**: every copy is planned before any is made, and two sources
//!   competing for one destination are reported instead of overwriting each other
//! - **Best effort**: one failed copy never stops the rest of the run
//!
//! ## Quick Start
//!
//! ```no_run
//! use tribud::backup::backup_config::BackupConfig;
//! use tribud::backup::locate::{locate, platform_location};
//!
//! let path = locate(None, platform_location().as_ref())?;
//! let config = BackupConfig::load(path)?;
//! let report = config.run()?;
//! report.log_summary();
//! std::process::exit(report.exit_code().into());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
