//! # d2cdb - Directory trees to constant databases
//!
//! Converts one or more directory trees into a single immutable cdb file.
//! Every regular file becomes one record: its content is the value and its
//! path relative to the directory it was found under is the key.
//!
//! ## Overview
//!
//! A build is a single-threaded pipeline:
//!
//! - **Traversal**: each root is walked depth-first, children ordered by name,
//!   symbolic links followed with loop detection
//! - **Key derivation**: the root prefix is stripped from each path; in
//!   multi-key mode the file name is stripped too
//! - **Record loading**: file content is read verbatim
//! - **Duplicate policy**: colliding keys are dropped (first wins) or replace
//!   earlier records (last wins)
//! - **Self-exclusion**: the build's own temp file is never ingested
//! - **Publishing**: the sealed temp file is atomically renamed over the target
//!
//! A failed build never touches the target path and removes its temp file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use d2cdb::{BuildRequest, ConfigBuilder, DatabaseBuilder};
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigBuilder::new()
//!     .include_dot_files(false)
//!     .override_duplicates(true)
//!     .build();
//!
//! let request = BuildRequest::new(
//!     "data.cdb",
//!     "data.cdb.tmp",
//!     vec![PathBuf::from("./base"), PathBuf::from("./site")],
//! );
//!
//! let report = DatabaseBuilder::new(config).build(&request)?;
//! println!("{} records", report.record_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Reading a Database
//!
//! ```rust,no_run
//! use d2cdb::Cdb;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cdb = Cdb::open(Path::new("data.cdb"))?;
//! if let Some(value) = cdb.get(b"index.html")? {
//!     println!("{} bytes", value.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`builder`]: build and publish protocol
//! - [`traversal`]: directory walking and self-exclusion
//! - [`key`]: key derivation
//! - [`record`]: record loading
//! - [`policy`]: duplicate key handling
//! - [`cdb`]: cdb file construction and lookup
//! - [`cli`]: command-line parsing
//! - [`types`]: configuration and reports
//! - [`error`]: error types and exit codes

pub mod builder;
pub mod cdb;
pub mod cli;
pub mod error;
pub mod key;
pub mod policy;
pub mod record;
pub mod traversal;
pub mod types;

mod utils;

pub use builder::{build_database, DatabaseBuilder};
pub use cdb::{Cdb, CdbError, CdbMake};
pub use error::{D2cdbError, Result, EXIT_FAILURE, EXIT_SUCCESS};
pub use policy::DuplicatePolicy;
pub use types::{BuildReport, BuildRequest, Config, ConfigBuilder};
