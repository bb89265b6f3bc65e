//! Utility functions for d2cdb
//!
//! Small cross-platform helpers shared by the pipeline:
//!
//! - Raw byte views of paths, used for key derivation
//! - File identity, used to recognise the temp file during traversal
//! - Permission setting for the published database
//! - Human-readable byte formatting for log output

use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::Path;

/// Raw bytes of a path
///
/// On Unix this is the exact byte sequence of the path. Elsewhere the path is
/// converted lossily to UTF-8.
#[cfg(unix)]
pub fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(path.as_os_str().as_bytes())
}

/// Raw bytes of a path (non-Unix implementation)
#[cfg(not(unix))]
pub fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
    match path.to_string_lossy() {
        Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
        Cow::Owned(s) => Cow::Owned(s.into_bytes()),
    }
}

/// Unique filesystem identity of a file
///
/// Two paths with the same identity name the same underlying file, whether
/// through hard links, symbolic links or different spellings of the path.
#[cfg(unix)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    dev: u64,
    ino: u64,
}

#[cfg(unix)]
impl FileIdentity {
    /// Identity of the file described by `metadata`
    pub fn of(_path: &Path, metadata: &fs::Metadata) -> io::Result<Self> {
        use std::os::unix::fs::MetadataExt;
        Ok(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }
}

/// Unique filesystem identity of a file (non-Unix implementation)
///
/// Falls back to the canonical path, which does not see through hard links.
#[cfg(not(unix))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    path: std::path::PathBuf,
}

#[cfg(not(unix))]
impl FileIdentity {
    /// Identity of the file at `path`
    pub fn of(path: &Path, _metadata: &fs::Metadata) -> io::Result<Self> {
        Ok(Self {
            path: fs::canonicalize(path)?,
        })
    }
}

/// Set Unix permissions
#[cfg(unix)]
pub fn set_permissions(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

/// Set permissions (non-Unix implementation)
///
/// Only the read-only attribute can be expressed; it is set when the owner
/// write bit is clear.
#[cfg(not(unix))]
pub fn set_permissions(path: &Path, mode: u32) -> io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(mode & 0o200 == 0);
    fs::set_permissions(path, perms)
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
