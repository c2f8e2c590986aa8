//! Binary entry point for strata.
//!
//! This binary provides the CLI for the strata backup retention manager:
//! one command that runs a single upload-and-prune cycle, or repeats it on
//! a poll interval with `--loop`.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use strata::config::{ConfigFile, Overrides, StrataConfig};
use strata::observability::init_logging;
use strata::{Error, Orchestrator, storage};

/// Exit code for unrecoverable backend errors.
const EXIT_BACKEND: u8 = 1;
/// Exit code for configuration errors.
const EXIT_CONFIG: u8 = 2;

/// Strata - upload the latest backup archive and prune older ones.
#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file containing backup parameters.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory where the backup producer writes archives.
    #[arg(long)]
    backup_dir: Option<PathBuf>,

    /// Storage target URI (e.g. s3://bucket/prefix or /path/to/storage).
    #[arg(long = "storage", value_name = "URI")]
    storage_uri: Option<String>,

    /// Named AWS shared-credentials profile to use for uploads.
    #[arg(long, env = "AWS_PROFILE")]
    aws_profile: Option<String>,

    /// AWS region when creating the S3 client.
    #[arg(long, env = "AWS_REGION")]
    aws_region: Option<String>,

    /// Run continuously, checking for new backups at a set interval.
    #[arg(long = "loop", overrides_with = "no_loop")]
    loop_mode: bool,

    /// Force single-run mode even when the config file enables looping.
    #[arg(long, hide = true)]
    no_loop: bool,

    /// Seconds between checks when running in loop mode (default: 60).
    #[arg(long, value_name = "SECONDS")]
    poll_interval: Option<u64>,

    /// Comma-separated duration checkpoints like 3h,24h,7d,30d to retain
    /// representative archives for older periods.
    #[arg(long, value_name = "LIST")]
    retention_checkpoints: Option<String>,

    /// Show planned actions without uploading or deleting anything.
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Tri-state loop resolution: flags win, `None` defers to the file.
    const fn loop_override(&self) -> Option<bool> {
        if self.loop_mode {
            Some(true)
        } else if self.no_loop {
            Some(false)
        } else {
            None
        }
    }

    fn into_overrides(self) -> Overrides {
        let loop_mode = self.loop_override();
        Overrides {
            backup_dir: self.backup_dir,
            storage_uri: self.storage_uri,
            aws_profile: self.aws_profile,
            aws_region: self.aws_region,
            loop_mode,
            poll_interval: self.poll_interval,
            retention_checkpoints: self.retention_checkpoints,
            dry_run: self.dry_run,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let file = match &cli.config {
        Some(path) => match ConfigFile::load(path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::from(EXIT_CONFIG);
            }
        },
        None => match ConfigFile::load_default() {
            Ok(file) => file,
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::from(EXIT_CONFIG);
            }
        },
    };

    let config = match StrataConfig::resolve(cli.into_overrides(), file) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    if !config.backup_dir.exists() {
        eprintln!(
            "backup directory {} does not exist",
            config.backup_dir.display()
        );
        return ExitCode::from(EXIT_CONFIG);
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            match e {
                Error::InvalidConfig(_)
                | Error::InvalidDuration { .. }
                | Error::InvalidCheckpointList(_) => ExitCode::from(EXIT_CONFIG),
                _ => ExitCode::from(EXIT_BACKEND),
            }
        }
    }
}

/// Builds the backend and drives one cycle or the polling loop.
fn run(config: &StrataConfig) -> strata::Result<()> {
    let backend = storage::backend_for_target(config)?;
    let mut orchestrator = Orchestrator::new(backend, config)?;

    if config.loop_mode {
        let cancel = Arc::new(AtomicBool::new(false));
        let handler_flag = Arc::clone(&cancel);
        if let Err(e) = ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst)) {
            return Err(Error::InvalidConfig(format!(
                "cannot install shutdown handler: {e}"
            )));
        }
        orchestrator.run_loop(&cancel)
    } else {
        orchestrator.run_once().map(|_| ())
    }
}
