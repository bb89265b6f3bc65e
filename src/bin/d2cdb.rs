//! # d2cdb - directory to cdb
//!
//! Builds a constant database from the regular files under one or more
//! directories. Each file becomes one record keyed by its path relative to
//! the directory it was found in.
//!
//! ## Usage
//! ```bash
//! # Build data.cdb from two trees, the first taking precedence
//! d2cdb data.cdb data.cdb.tmp ./base ./overrides
//!
//! # Let the last directory win on colliding keys
//! d2cdb -r data.cdb data.cdb.tmp ./base ./overrides
//! ```
//!
//! Exit status is 0 on success or after printing usage, 100 on any fatal
//! error. Set `RUST_LOG=debug` to see pruned and skipped entries.

use colored::*;
use d2cdb::cli::{self, Invocation};
use d2cdb::{DatabaseBuilder, Result, EXIT_SUCCESS};
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::Path;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() {
    // Logs go to stderr; stdout carries only usage text
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    if std::env::var_os("NO_COLOR").is_some() || !io::stderr().is_terminal() {
        colored::control::set_override(false);
    }

    let args: Vec<OsString> = std::env::args_os().collect();
    let program = program_name(&args);

    let code = match run(args, &program) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            if e.is_post_seal() {
                warn!("database was built but could not be published");
            }
            eprintln!("{}: {}", "fatal".red().bold(), e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

/// Parse the command line and carry out the invocation
fn run(args: Vec<OsString>, program: &str) -> Result<()> {
    match cli::parse_args(args)? {
        Invocation::ShortUsage => println!("{}", cli::short_usage(program)),
        Invocation::LongUsage => println!("{}", cli::long_usage(program)),
        Invocation::Run(job) => {
            DatabaseBuilder::new(job.config).build(&job.request)?;
        }
    }
    Ok(())
}

fn program_name(args: &[OsString]) -> String {
    args.first()
        .and_then(|arg| Path::new(arg).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "d2cdb".to_string())
}
