//! Core data types used throughout d2cdb
//!
//! - **Configuration**: [`Config`] and its [`ConfigBuilder`]
//! - **Input**: [`BuildRequest`], the paths a build operates on
//! - **Output**: [`BuildReport`], counters collected while building
//!
//! ```rust
//! use d2cdb::types::ConfigBuilder;
//! use d2cdb::DuplicatePolicy;
//!
//! // Reverse mode always replaces on duplicate keys
//! let config = ConfigBuilder::new().reverse_roots(true).build();
//! assert_eq!(config.duplicate_policy(), DuplicatePolicy::Replace);
//! ```

use crate::policy::DuplicatePolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Immutable settings for one build run
///
/// Created through [`ConfigBuilder`], which applies the rule that reversing
/// the root order forces [`DuplicatePolicy::Replace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    include_dot_files: bool,
    multi_key: bool,
    duplicate_policy: DuplicatePolicy,
    reverse_roots: bool,
}

impl Config {
    /// Whether entries whose names start with `.` are walked
    pub fn include_dot_files(&self) -> bool {
        self.include_dot_files
    }

    /// Whether file names are stripped from keys below the first level
    pub fn multi_key(&self) -> bool {
        self.multi_key
    }

    /// How repeated keys are handled
    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.duplicate_policy
    }

    /// Whether roots are processed last-to-first
    pub fn reverse_roots(&self) -> bool {
        self.reverse_roots
    }

    /// Roots in the order they will be walked
    pub fn ordered_roots(&self, roots: &[PathBuf]) -> Vec<PathBuf> {
        let mut ordered = roots.to_vec();
        if self.reverse_roots {
            ordered.reverse();
        }
        ordered
    }
}

impl Default for Config {
    fn default() -> Self {
        ConfigBuilder::new().build()
    }
}

/// Builder for [`Config`]
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    include_dot_files: bool,
    multi_key: bool,
    override_duplicates: bool,
    reverse_roots: bool,
}

impl ConfigBuilder {
    /// Create a builder with every option disabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk entries whose names begin with a dot
    pub fn include_dot_files(mut self, include: bool) -> Self {
        self.include_dot_files = include;
        self
    }

    /// Remove the file name from keys of files below the first level
    pub fn multi_key(mut self, enabled: bool) -> Self {
        self.multi_key = enabled;
        self
    }

    /// Replace earlier records when keys collide
    pub fn override_duplicates(mut self, enabled: bool) -> Self {
        self.override_duplicates = enabled;
        self
    }

    /// Process roots in reverse order
    ///
    /// Implies [`override_duplicates`](Self::override_duplicates), so the
    /// first root given on the command line wins on collisions.
    pub fn reverse_roots(mut self, enabled: bool) -> Self {
        self.reverse_roots = enabled;
        self
    }

    /// Build the immutable configuration
    pub fn build(self) -> Config {
        let duplicate_policy = if self.override_duplicates || self.reverse_roots {
            DuplicatePolicy::Replace
        } else {
            DuplicatePolicy::Reject
        };
        Config {
            include_dot_files: self.include_dot_files,
            multi_key: self.multi_key,
            duplicate_policy,
            reverse_roots: self.reverse_roots,
        }
    }
}

/// Paths a build run operates on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Final database path, only ever written by rename
    pub cdb_path: PathBuf,
    /// Temp file the database is built in
    pub tmp_path: PathBuf,
    /// Root directories in caller order
    pub roots: Vec<PathBuf>,
}

impl BuildRequest {
    /// Create a request
    pub fn new(cdb_path: impl Into<PathBuf>, tmp_path: impl Into<PathBuf>, roots: Vec<PathBuf>) -> Self {
        Self {
            cdb_path: cdb_path.into(),
            tmp_path: tmp_path.into(),
            roots,
        }
    }
}

/// Counters collected during a build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Root directories walked
    pub roots_walked: usize,
    /// Records stored under a new key
    pub records_added: usize,
    /// Records that replaced an earlier record with the same key
    pub records_replaced: usize,
    /// Records dropped because their key already existed
    pub duplicates_rejected: usize,
    /// Dot-prefixed entries pruned from the walk
    pub entries_pruned: usize,
    /// Walked files identified as the build's own temp file
    pub files_excluded: usize,
    /// Total value bytes submitted
    pub bytes_read: u64,
    /// Wall-clock time of the build
    pub elapsed: Duration,
}

impl BuildReport {
    /// Records present in the finished database
    pub fn record_count(&self) -> usize {
        self.records_added
    }
}
