//! Directory traversal
//!
//! Walks one resolved root depth-first in a deterministic order and yields
//! classified [`Node`]s. The walk:
//!
//! - follows symbolic links, reporting link loops as errors
//! - orders the children of every directory by byte-wise comparison of their
//!   base names, independent of the filesystem's native order and of locale
//! - prunes every entry below the root whose name begins with `.` (whole
//!   subtrees for directories) unless dot files are included
//! - silently skips dangling symbolic links
//!
//! Any other error reported by the walk itself is fatal.
//!
//! The [`SelfExclusionGuard`] recognises the build's own temp file wherever it
//! appears under a root so that it is never ingested as a record.

use crate::error::{D2cdbError, Result};
pub use crate::utils::FileIdentity;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Classification of a walked entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A directory, including the root itself
    Directory,
    /// A regular file and the size observed when it was classified
    File {
        /// File length in bytes
        size: u64,
        /// Filesystem identity of the file
        identity: FileIdentity,
    },
    /// FIFOs, sockets, devices and anything else
    Other,
}

/// One entry visited by a [`Traversal`]
#[derive(Debug, Clone)]
pub struct Node {
    /// Full path, beginning with the root path
    pub path: PathBuf,
    /// Nesting depth below the root (root = 0)
    pub depth: usize,
    /// What kind of entry this is
    pub kind: NodeKind,
}

impl Node {
    /// Check if this node is a regular file
    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }
}

/// Depth-first walk over a single root directory
///
/// Nodes are produced lazily; the walk holds at most one open directory
/// handle per level.
#[derive(Debug)]
pub struct Traversal {
    iter: walkdir::IntoIter,
    include_dot_files: bool,
    pruned: usize,
}

impl Traversal {
    /// Start walking `root`
    pub fn new(root: &Path, include_dot_files: bool) -> Self {
        let iter = WalkDir::new(root)
            .follow_links(true)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter();
        Self {
            iter,
            include_dot_files,
            pruned: 0,
        }
    }

    /// Number of dot-prefixed entries pruned so far
    pub fn pruned(&self) -> usize {
        self.pruned
    }

    fn is_hidden(&self, entry: &DirEntry) -> bool {
        !self.include_dot_files
            && entry.depth() > 0
            && entry.file_name().to_string_lossy().starts_with('.')
    }

    fn classify(entry: DirEntry) -> Result<Node> {
        let depth = entry.depth();
        let file_type = entry.file_type();
        let kind = if file_type.is_dir() {
            NodeKind::Directory
        } else if file_type.is_file() {
            let metadata = entry.metadata().map_err(|source| D2cdbError::Traversal {
                path: Some(entry.path().to_path_buf()),
                source,
            })?;
            let identity = FileIdentity::of(entry.path(), &metadata).map_err(|source| D2cdbError::Stat {
                path: entry.path().to_path_buf(),
                source,
            })?;
            NodeKind::File {
                size: metadata.len(),
                identity,
            }
        } else {
            NodeKind::Other
        };
        Ok(Node {
            path: entry.into_path(),
            depth,
            kind,
        })
    }
}

/// Outcome of inspecting a walk error
enum WalkFailure {
    /// A symbolic link whose target does not exist
    Dangling(PathBuf),
    Fatal(D2cdbError),
}

fn inspect_walk_error(err: walkdir::Error) -> WalkFailure {
    if let (Some(ancestor), Some(path)) = (err.loop_ancestor(), err.path()) {
        return WalkFailure::Fatal(D2cdbError::SymlinkLoop {
            path: path.to_path_buf(),
            ancestor: ancestor.to_path_buf(),
        });
    }

    let missing = err
        .io_error()
        .is_some_and(|e| e.kind() == io::ErrorKind::NotFound);
    if let Some(path) = err.path() {
        let is_link = fs::symlink_metadata(path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        if missing && is_link {
            return WalkFailure::Dangling(path.to_path_buf());
        }
    }

    WalkFailure::Fatal(D2cdbError::Traversal {
        path: err.path().map(Path::to_path_buf),
        source: err,
    })
}

impl Iterator for Traversal {
    type Item = Result<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.iter.next()? {
                Ok(entry) => entry,
                Err(err) => match inspect_walk_error(err) {
                    WalkFailure::Dangling(path) => {
                        debug!("skipping dangling symlink {:?}", path);
                        continue;
                    }
                    WalkFailure::Fatal(e) => return Some(Err(e)),
                },
            };

            if self.is_hidden(&entry) {
                debug!("skipping {:?} at level {}", entry.file_name(), entry.depth());
                if entry.file_type().is_dir() {
                    self.iter.skip_current_dir();
                }
                self.pruned += 1;
                continue;
            }

            return Some(Self::classify(entry));
        }
    }
}

/// Recognises the build's own temp file among walked files
#[derive(Debug, Clone)]
pub struct SelfExclusionGuard {
    identity: FileIdentity,
}

impl SelfExclusionGuard {
    /// Guard against the open temp file at `path`
    pub fn for_file(path: &Path, file: &File) -> io::Result<Self> {
        let metadata = file.metadata()?;
        Ok(Self {
            identity: FileIdentity::of(path, &metadata)?,
        })
    }

    /// Check if `node` is the guarded file
    pub fn excludes(&self, node: &Node) -> bool {
        match &node.kind {
            NodeKind::File { identity, .. } => *identity == self.identity,
            _ => false,
        }
    }
}
