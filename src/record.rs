//! Record loading
//!
//! A record's value is the verbatim content of one regular file. The file is
//! read in a single pass into a buffer sized from the length reported when the
//! traversal classified it; a short read is fatal and never retried.

use crate::error::{D2cdbError, Result};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// One key/value pair bound for the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Key derived from the file's path
    pub key: Vec<u8>,
    /// Exact file content
    pub value: Vec<u8>,
}

/// Read the content of a regular file
///
/// Reads exactly `size` bytes. Content appended after classification is
/// ignored; a file that shrank fails with [`D2cdbError::ReadSizeMismatch`].
///
/// # Errors
///
/// - [`D2cdbError::Read`] if the file cannot be opened or read
/// - [`D2cdbError::ReadSizeMismatch`] if fewer than `size` bytes are available
pub fn read_value(path: &Path, size: u64) -> Result<Vec<u8>> {
    let read_error = |source: io::Error| D2cdbError::Read {
        path: path.to_path_buf(),
        source,
    };

    let capacity = usize::try_from(size).map_err(|_| {
        read_error(io::Error::new(
            io::ErrorKind::OutOfMemory,
            "file does not fit in memory",
        ))
    })?;

    let file = File::open(path).map_err(read_error)?;
    let mut value = Vec::with_capacity(capacity);
    file.take(size).read_to_end(&mut value).map_err(read_error)?;

    if value.len() != capacity {
        return Err(D2cdbError::ReadSizeMismatch {
            path: path.to_path_buf(),
            expected: size,
            actual: value.len() as u64,
        });
    }
    Ok(value)
}
