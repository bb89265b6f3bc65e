//! Error types for d2cdb
//!
//! Every error in this module is fatal to a build run: the build is aborted,
//! the temporary database file is removed (best-effort) and the process exits
//! with [`EXIT_FAILURE`]. Non-fatal conditions (malformed invocations, rejected
//! duplicate keys) are not errors and never surface here.

use crate::cdb::CdbError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for a successful run, including usage output
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for any fatal error
pub const EXIT_FAILURE: i32 = 100;

/// Type alias for Results in the d2cdb library
pub type Result<T> = std::result::Result<T, D2cdbError>;

/// Main error type for all d2cdb operations
#[derive(Debug, Error)]
pub enum D2cdbError {
    /// A command-line path could not be stat'ed
    #[error("{path:?} stat error: {source}")]
    Stat {
        /// Path that was examined
        path: PathBuf,
        /// Underlying system error
        source: io::Error,
    },

    /// A root directory could not be resolved to a canonical path
    #[error("{path:?} realpath error: {source}")]
    Realpath {
        /// Root as given by the caller
        path: PathBuf,
        /// Underlying system error
        source: io::Error,
    },

    /// The temporary database file could not be created
    #[error("{path:?} open error: {source}")]
    FileCreate {
        /// Temp file path
        path: PathBuf,
        /// Underlying system error
        source: io::Error,
    },

    /// The database build could not be started on the temp file
    #[error("database build start error: {0}")]
    BuildInit(#[source] CdbError),

    /// The database build could not be sealed
    #[error("database build finish error: {0}")]
    BuildFinish(#[source] CdbError),

    /// A regular file could not be opened or read
    #[error("{path:?} read error: {source}")]
    Read {
        /// File being read
        path: PathBuf,
        /// Underlying system error
        source: io::Error,
    },

    /// A file yielded fewer bytes than its reported size
    #[error("{path:?} read error: expected {expected} bytes, got {actual}")]
    ReadSizeMismatch {
        /// File being read
        path: PathBuf,
        /// Size reported at classification time
        expected: u64,
        /// Bytes actually read
        actual: u64,
    },

    /// A key could not be derived from a traversal path
    #[error("{path:?} invalid key path under root {root:?}")]
    InvalidPath {
        /// Path of the traversal node
        path: PathBuf,
        /// Root the node was found under
        root: PathBuf,
    },

    /// The directory walk reported an access or read error
    #[error("traversal error: {source}")]
    Traversal {
        /// Path of the failing entry, when known
        path: Option<PathBuf>,
        /// Error reported by the walker
        source: walkdir::Error,
    },

    /// A symbolic link loop was detected while walking
    #[error("{path:?} symbolic link loop back to {ancestor:?}")]
    SymlinkLoop {
        /// Path that closes the loop
        path: PathBuf,
        /// Ancestor directory the link points back to
        ancestor: PathBuf,
    },

    /// The database rejected a record for a reason other than a duplicate key
    #[error("{path:?} record add error: {source}")]
    Record {
        /// File the record was read from
        path: PathBuf,
        /// Error from the database build
        source: CdbError,
    },

    /// The temp file could not be flushed and closed
    #[error("{path:?} close error: {source}")]
    Close {
        /// Temp file path
        path: PathBuf,
        /// Underlying system error
        source: io::Error,
    },

    /// The sealed temp file could not be renamed into place
    #[error("{from:?} rename error: {source}")]
    Rename {
        /// Temp file path
        from: PathBuf,
        /// Final database path
        to: PathBuf,
        /// Underlying system error
        source: io::Error,
    },

    /// Permissions of the published database could not be set
    #[error("{path:?} chmod error: {source}")]
    Permissions {
        /// Final database path
        path: PathBuf,
        /// Underlying system error
        source: io::Error,
    },
}

impl D2cdbError {
    /// Process exit code for this error
    ///
    /// There is no distinct temporary-failure code; every fatal condition
    /// maps to [`EXIT_FAILURE`].
    pub fn exit_code(&self) -> i32 {
        EXIT_FAILURE
    }

    /// Check if this error happened after the database was sealed
    ///
    /// Such errors occur once the temp file holds a complete, readable database.
    pub fn is_post_seal(&self) -> bool {
        matches!(
            self,
            D2cdbError::Close { .. } | D2cdbError::Rename { .. } | D2cdbError::Permissions { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = D2cdbError::ReadSizeMismatch {
            path: PathBuf::from("/data/a.txt"),
            expected: 10,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "\"/data/a.txt\" read error: expected 10 bytes, got 4"
        );
    }

    #[test]
    fn test_exit_code() {
        let err = D2cdbError::Read {
            path: PathBuf::from("/data/a.txt"),
            source: io::Error::new(io::ErrorKind::Other, "test"),
        };
        assert_eq!(err.exit_code(), EXIT_FAILURE);
        assert_eq!(EXIT_FAILURE, 100);
    }

    #[test]
    fn test_post_seal() {
        assert!(D2cdbError::Rename {
            from: PathBuf::from("db.tmp"),
            to: PathBuf::from("db"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "test"),
        }
        .is_post_seal());
        assert!(!D2cdbError::BuildInit(CdbError::Overflow).is_post_seal());
    }
}
