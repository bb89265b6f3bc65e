//! Build and publish protocol
//!
//! A build moves through four states, strictly in order:
//!
//! ```text
//! Opened ──> Building ──> Finished ──> Published
//! ```
//!
//! 1. **Opened**: the temp file is created (or truncated)
//! 2. **Building**: a cdb build is started on it and every root is walked in
//!    configured order, each surviving file submitted under the duplicate policy
//! 3. **Finished**: the build is sealed and the file synced and closed
//! 4. **Published**: the temp file is renamed over the final path and its
//!    permissions set to `rw-r--r--`
//!
//! The final path only ever changes through the rename, which happens after
//! the database is sealed. Until the rename succeeds the temp file is owned by
//! a [`TempFileGuard`] that removes it when a build is abandoned on any error.

use crate::cdb::CdbMake;
use crate::error::{D2cdbError, Result};
use crate::key::derive_key;
use crate::policy::Submission;
use crate::record::{read_value, Record};
use crate::traversal::{NodeKind, SelfExclusionGuard, Traversal};
use crate::types::{BuildReport, BuildRequest, Config};
use crate::utils::{self, format_bytes};
use humantime::format_duration;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Permissions of a published database
pub const DATABASE_MODE: u32 = 0o644;

/// Removes the temp file on drop unless it has been published
#[derive(Debug)]
pub struct TempFileGuard {
    path: Option<PathBuf>,
}

impl TempFileGuard {
    /// Track `path` for removal
    pub fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// Stop tracking the file once it no longer exists under its temp name
    pub fn release(&mut self) {
        self.path = None;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            match fs::remove_file(&path) {
                Ok(()) => debug!("removed temp file {:?}", path),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("{:?} unlink error: {}", path, e),
            }
        }
    }
}

/// Builds one database from a set of root directories
#[derive(Debug)]
pub struct DatabaseBuilder {
    config: Config,
}

impl DatabaseBuilder {
    /// Create a builder for `config`
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the full build and publish sequence
    ///
    /// On success the database is at `request.cdb_path` and the temp file no
    /// longer exists. On failure before the rename the temp file is removed
    /// and the final path is untouched.
    ///
    /// # Errors
    ///
    /// Every error is fatal; see [`D2cdbError`] for the kinds.
    pub fn build(&self, request: &BuildRequest) -> Result<BuildReport> {
        let started = Instant::now();
        let tmp_path = &request.tmp_path;

        // Opened
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(tmp_path)
            .map_err(|source| D2cdbError::FileCreate {
                path: tmp_path.clone(),
                source,
            })?;
        let mut temp = TempFileGuard::new(tmp_path.clone());
        let guard = SelfExclusionGuard::for_file(tmp_path, &file).map_err(|source| D2cdbError::Stat {
            path: tmp_path.clone(),
            source,
        })?;

        // Building
        let mut cdb = CdbMake::start(file).map_err(D2cdbError::BuildInit)?;
        let mut report = BuildReport::default();
        for root in self.config.ordered_roots(&request.roots) {
            self.ingest_root(&mut cdb, &guard, &root, &mut report)?;
        }

        // Finished
        let file = cdb.finish().map_err(D2cdbError::BuildFinish)?;
        file.sync_all().map_err(|source| D2cdbError::Close {
            path: tmp_path.clone(),
            source,
        })?;
        drop(file);

        // Published
        fs::rename(tmp_path, &request.cdb_path).map_err(|source| D2cdbError::Rename {
            from: tmp_path.clone(),
            to: request.cdb_path.clone(),
            source,
        })?;
        temp.release();
        utils::set_permissions(&request.cdb_path, DATABASE_MODE).map_err(|source| {
            D2cdbError::Permissions {
                path: request.cdb_path.clone(),
                source,
            }
        })?;

        report.elapsed = started.elapsed();
        info!(
            "built {:?}: {} records ({}) from {} roots in {}",
            request.cdb_path,
            report.record_count(),
            format_bytes(report.bytes_read),
            report.roots_walked,
            format_duration(report.elapsed)
        );
        if report.duplicates_rejected > 0 {
            info!("dropped {} duplicate keys", report.duplicates_rejected);
        }
        Ok(report)
    }

    /// Walk one root and submit every qualifying file
    fn ingest_root(
        &self,
        cdb: &mut CdbMake,
        guard: &SelfExclusionGuard,
        root: &Path,
        report: &mut BuildReport,
    ) -> Result<()> {
        let resolved = fs::canonicalize(root).map_err(|source| D2cdbError::Realpath {
            path: root.to_path_buf(),
            source,
        })?;
        debug!("walking {:?}", resolved);

        let mut traversal = Traversal::new(&resolved, self.config.include_dot_files());
        for node in traversal.by_ref() {
            let node = node?;
            let size = match node.kind {
                NodeKind::File { size, .. } => size,
                _ => continue,
            };
            if guard.excludes(&node) {
                debug!("skipping temp file {:?}", node.path);
                report.files_excluded += 1;
                continue;
            }

            let key = derive_key(&node.path, &resolved, node.depth, self.config.multi_key())?;
            let value = read_value(&node.path, size)?;
            let record = Record { key, value };
            self.submit(cdb, &node.path, &record, report)?;
        }

        report.entries_pruned += traversal.pruned();
        report.roots_walked += 1;
        Ok(())
    }

    fn submit(
        &self,
        cdb: &mut CdbMake,
        path: &Path,
        record: &Record,
        report: &mut BuildReport,
    ) -> Result<()> {
        let submission = self
            .config
            .duplicate_policy()
            .submit(cdb, &record.key, &record.value)
            .map_err(|source| D2cdbError::Record {
                path: path.to_path_buf(),
                source,
            })?;

        match submission {
            Submission::Added => report.records_added += 1,
            Submission::Replaced => report.records_replaced += 1,
            Submission::Rejected => {
                debug!("duplicate key {:?} from {:?} dropped", String::from_utf8_lossy(&record.key), path);
                report.duplicates_rejected += 1;
                return Ok(());
            }
        }
        report.bytes_read += record.value.len() as u64;
        trace!(
            "{:?} -> {:?} ({} bytes)",
            path,
            String::from_utf8_lossy(&record.key),
            record.value.len()
        );
        Ok(())
    }
}

/// Build a database with `config`
///
/// Shorthand for `DatabaseBuilder::new(config.clone()).build(request)`.
pub fn build_database(config: &Config, request: &BuildRequest) -> Result<BuildReport> {
    DatabaseBuilder::new(config.clone()).build(request)
}
