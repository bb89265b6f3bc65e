//! Command-line argument handling
//!
//! ```text
//! d2cdb [-amorth] cdb_file tmp_file directory [directory ...]
//! ```
//!
//! Parsing produces an [`Invocation`]. Malformed command lines are not errors:
//! they print the short usage and exit successfully, matching the historical
//! shell tool. Only a directory argument that cannot be stat'ed is fatal.

use crate::error::{D2cdbError, Result};
use crate::types::{BuildRequest, Config, ConfigBuilder};
use clap::Parser;
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

/// Raw command-line flags and operands
#[derive(Parser, Debug)]
#[command(name = "d2cdb")]
#[command(about = "Build a cdb from the files in one or more directories")]
#[command(disable_help_flag = true, disable_version_flag = true)]
#[command(args_override_self = true)]
struct Args {
    /// Include directory entries whose names begin with a dot
    #[arg(short = 'a')]
    include_dot_files: bool,

    /// Remove the file name from the cdb key
    #[arg(short = 'm')]
    multi_key: bool,

    /// Replace earlier cdb entries if the keys are identical
    #[arg(short = 'o')]
    override_duplicates: bool,

    /// Reverse the directory traversal order (implies -o)
    #[arg(short = 'r')]
    reverse: bool,

    /// Unused option for compatibility
    #[arg(short = 't')]
    #[allow(dead_code)]
    compat: bool,

    /// Show this help
    #[arg(short = 'h')]
    help: bool,

    /// cdb_file tmp_file directory [directory ...]
    #[arg(value_name = "PATH")]
    operands: Vec<PathBuf>,
}

/// A validated build job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Build settings
    pub config: Config,
    /// Paths to operate on
    pub request: BuildRequest,
}

/// What the command line asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Build a database
    Run(Job),
    /// Print the one-line usage and exit successfully
    ShortUsage,
    /// Print the full option list and exit successfully
    LongUsage,
}

/// Parse a full argument vector, program name first
///
/// # Errors
///
/// - [`D2cdbError::Stat`] if a directory operand cannot be stat'ed
pub fn parse_args<I, T>(args: I) -> Result<Invocation>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = match Args::try_parse_from(args) {
        Ok(args) => args,
        Err(_) => return Ok(Invocation::ShortUsage),
    };
    if args.help {
        return Ok(Invocation::LongUsage);
    }

    let mut operands = args.operands.into_iter();
    let (cdb_path, tmp_path) = match (operands.next(), operands.next()) {
        (Some(cdb), Some(tmp)) => (cdb, tmp),
        _ => return Ok(Invocation::ShortUsage),
    };
    let roots: Vec<PathBuf> = operands.collect();
    if roots.is_empty() {
        return Ok(Invocation::ShortUsage);
    }

    for root in &roots {
        let metadata = fs::metadata(root).map_err(|source| D2cdbError::Stat {
            path: root.clone(),
            source,
        })?;
        if !metadata.is_dir() {
            return Ok(Invocation::ShortUsage);
        }
    }

    let config = ConfigBuilder::new()
        .include_dot_files(args.include_dot_files)
        .multi_key(args.multi_key)
        .override_duplicates(args.override_duplicates)
        .reverse_roots(args.reverse)
        .build();

    Ok(Invocation::Run(Job {
        config,
        request: BuildRequest::new(cdb_path, tmp_path, roots),
    }))
}

/// One-line usage text
pub fn short_usage(program: &str) -> String {
    format!("usage: {} [-amorth] cdb_file tmp_file directory [directory ...]", program)
}

/// Usage text with the option list
pub fn long_usage(program: &str) -> String {
    format!(
        "{}\n\
         \x20 a : include directory entries whose names begin with a dot (`.')\n\
         \x20 m : remove the file name from the cdb key\n\
         \x20 o : replace earlier cdb entries if the keys are identical\n\
         \x20 r : reverse the directory traversal order (implies `-o')\n\
         \x20 t : unused option for compatibility\n\
         \x20 h : show this help",
        short_usage(program)
    )
}
