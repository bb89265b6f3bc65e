//! Key derivation
//!
//! A record's key is the path of its file relative to the root it was found
//! under, as raw bytes. In multi-key mode every file below the first level
//! maps to the key of its parent directory instead, so all files in one
//! directory collapse onto a single key.
//!
//! ```text
//! root:  /srv/data
//! path:  /srv/data/a/b/c.txt
//!
//! default    -> "a/b/c.txt"
//! multi-key  -> "a/b"
//! ```
//!
//! Direct children of the root (depth 1) keep their file name in either mode.

use crate::error::{D2cdbError, Result};
use crate::utils::path_bytes;
use std::path::{self, Path};

fn is_separator(byte: u8) -> bool {
    byte.is_ascii() && path::is_separator(byte as char)
}

/// Derive the database key for a traversal node
///
/// `root` must be the resolved root path the node was found under and
/// `depth` the node's nesting depth below it (root = 0).
///
/// # Errors
///
/// - [`D2cdbError::InvalidPath`] if `path` does not lie under `root` or the
///   resulting key would be empty
pub fn derive_key(path: &Path, root: &Path, depth: usize, multi_key: bool) -> Result<Vec<u8>> {
    let invalid = || D2cdbError::InvalidPath {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    };

    let full = path_bytes(path);
    let root_bytes = path_bytes(root);
    let rest = full.strip_prefix(&*root_bytes).ok_or_else(invalid)?;

    // A root such as "/" already ends with the separator
    let root_has_separator = root_bytes.last().copied().is_some_and(is_separator);
    let mut key = match rest.split_first() {
        Some((&first, tail)) if is_separator(first) && !root_has_separator => tail,
        Some(_) if root_has_separator => rest,
        _ => return Err(invalid()),
    };

    if multi_key && depth > 1 {
        let name = path.file_name().ok_or_else(invalid)?;
        let name_len = path_bytes(Path::new(name)).len();
        let parent_len = key
            .len()
            .checked_sub(name_len + 1)
            .ok_or_else(invalid)?;
        if !is_separator(key[parent_len]) {
            return Err(invalid());
        }
        key = &key[..parent_len];
    }

    if key.is_empty() {
        return Err(invalid());
    }
    Ok(key.to_vec())
}
