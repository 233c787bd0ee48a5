use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;
use tribud::backup::backup_config::BackupConfig;
use tribud::backup::locate::{locate, platform_location};
use tribud::backup::report::{RunReport, EXIT_FATAL};
use tribud::backup::result_error::error::Error;
use tribud::backup::result_error::result::Result;

/// Trivial backup: copy configured files and directories into a backup directory
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Location of config file, defaults to the platform config directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the planned copies as JSON and exit without copying
    #[arg(long)]
    dry_run: bool,

    /// Log more, repeat for even more
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{e}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn run(args: &Args) -> Result<u8> {
    let location = platform_location();
    let config_path = locate(args.config.as_deref(), location.as_ref())?;
    let config = BackupConfig::load(&config_path)?;

    if args.dry_run {
        let plan = config.plan()?;
        let json = serde_json::to_string_pretty(&plan)
            .map_err(|e| Error::from(std::io::Error::other(e)))?;
        println!("{json}");
        let report = RunReport {
            skips: plan.skips,
            outcomes: vec![],
        };
        return Ok(report.exit_code());
    }

    let report = config.run()?;
    report.log_summary();
    Ok(report.exit_code())
}
