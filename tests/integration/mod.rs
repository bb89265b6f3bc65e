//! Integration tests for d2cdb
//!
//! Builds databases from generated trees spread over several roots and checks
//! precedence rules, determinism and the publish guarantees.

use ::d2cdb::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

/// Test harness owning a scratch directory with any number of roots
pub struct BuildHarness {
    pub work_dir: TempDir,
    pub rng: StdRng,
}

impl BuildHarness {
    pub fn new() -> Self {
        Self {
            work_dir: TempDir::new().unwrap(),
            rng: StdRng::seed_from_u64(42),
        }
    }

    /// Path of a named root, created on first use
    pub fn root(&self, name: &str) -> PathBuf {
        let path = self.work_dir.path().join(name);
        fs::create_dir_all(&path).unwrap();
        path
    }

    pub fn write(&self, root: &Path, rel: &str, content: &[u8]) -> anyhow::Result<()> {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Fill `root` with a random tree of directories and files
    pub fn generate_tree(&mut self, root: &Path, depth: usize, dirs: usize, files: usize) -> anyhow::Result<usize> {
        let mut created = 0;
        for f in 0..files {
            let size = self.rng.random_range(0..512);
            let content: Vec<u8> = (0..size).map(|_| self.rng.random()).collect();
            fs::write(root.join(format!("file_{}.bin", f)), content)?;
            created += 1;
        }
        if depth > 0 {
            for d in 0..dirs {
                let dir = root.join(format!("dir_{}", d));
                fs::create_dir_all(&dir)?;
                created += self.generate_tree(&dir, depth - 1, dirs, files)?;
            }
        }
        Ok(created)
    }

    pub fn request(&self, name: &str, roots: Vec<PathBuf>) -> BuildRequest {
        BuildRequest::new(
            self.work_dir.path().join(format!("{}.cdb", name)),
            self.work_dir.path().join(format!("{}.tmp", name)),
            roots,
        )
    }
}

fn value_of(path: &Path, key: &[u8]) -> Option<Vec<u8>> {
    Cdb::open(path).unwrap().get(key).unwrap().map(|v| v.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_generated_tree_roundtrip() {
        let mut harness = BuildHarness::new();
        let root = harness.root("tree");
        let created = harness.generate_tree(&root, 3, 3, 4).unwrap();

        let request = harness.request("tree", vec![root.clone()]);
        let report = build_database(&Config::default(), &request).unwrap();
        info!("built {} records", report.record_count());
        assert_eq!(report.record_count(), created);

        let cdb = Cdb::open(&request.cdb_path).unwrap();
        for entry in walkdir::WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let key = entry.path().strip_prefix(&root).unwrap().to_string_lossy().into_owned();
            let expected = fs::read(entry.path()).unwrap();
            assert_eq!(cdb.get(key.as_bytes()).unwrap(), Some(&expected[..]), "key {}", key);
        }
    }

    #[test]
    fn test_determinism() {
        let mut harness = BuildHarness::new();
        let root = harness.root("tree");
        harness.generate_tree(&root, 2, 4, 5).unwrap();

        let first = harness.request("first", vec![root.clone()]);
        let second = harness.request("second", vec![root.clone()]);
        let config = ConfigBuilder::new().multi_key(true).override_duplicates(true).build();
        build_database(&config, &first).unwrap();
        build_database(&config, &second).unwrap();

        assert_eq!(
            fs::read(&first.cdb_path).unwrap(),
            fs::read(&second.cdb_path).unwrap()
        );
    }

    #[test]
    fn test_duplicate_precedence_across_roots() {
        let harness = BuildHarness::new();
        let first = harness.root("first");
        let second = harness.root("second");
        harness.write(&first, "x", b"from first").unwrap();
        harness.write(&second, "x", b"from second").unwrap();
        let roots = vec![first, second];

        let request = harness.request("strict", roots.clone());
        let report = build_database(&Config::default(), &request).unwrap();
        assert_eq!(report.duplicates_rejected, 1);
        assert_eq!(value_of(&request.cdb_path, b"x").unwrap(), b"from first");

        let request = harness.request("override", roots.clone());
        let config = ConfigBuilder::new().override_duplicates(true).build();
        let report = build_database(&config, &request).unwrap();
        assert_eq!(report.records_replaced, 1);
        assert_eq!(value_of(&request.cdb_path, b"x").unwrap(), b"from second");

        let request = harness.request("reverse", roots);
        let config = ConfigBuilder::new().reverse_roots(true).build();
        build_database(&config, &request).unwrap();
        assert_eq!(value_of(&request.cdb_path, b"x").unwrap(), b"from first");
        assert_eq!(Cdb::open(&request.cdb_path).unwrap().len(), 1);
    }

    #[test]
    fn test_dot_file_inclusion() {
        let harness = BuildHarness::new();
        let root = harness.root("r");
        harness.write(&root, ".hidden/file.txt", b"h").unwrap();
        harness.write(&root, "visible/file.txt", b"v").unwrap();

        let request = harness.request("plain", vec![root.clone()]);
        let report = build_database(&Config::default(), &request).unwrap();
        assert_eq!(report.record_count(), 1);
        assert_eq!(value_of(&request.cdb_path, b"visible/file.txt").unwrap(), b"v");

        let request = harness.request("all", vec![root]);
        let config = ConfigBuilder::new().include_dot_files(true).build();
        let report = build_database(&config, &request).unwrap();
        assert_eq!(report.record_count(), 2);
        assert_eq!(value_of(&request.cdb_path, b".hidden/file.txt").unwrap(), b"h");
    }

    #[test]
    fn test_self_exclusion_with_every_flag() {
        let harness = BuildHarness::new();
        let root = harness.root("r");
        harness.write(&root, "a/b.txt", b"b").unwrap();
        harness.write(&root, "c.txt", b"c").unwrap();

        for (i, config) in [
            Config::default(),
            ConfigBuilder::new().include_dot_files(true).build(),
            ConfigBuilder::new().multi_key(true).build(),
            ConfigBuilder::new().override_duplicates(true).build(),
            ConfigBuilder::new().reverse_roots(true).include_dot_files(true).build(),
        ]
        .into_iter()
        .enumerate()
        {
            let request = BuildRequest::new(
                harness.work_dir.path().join(format!("db{}.cdb", i)),
                root.join(".db.tmp"),
                vec![root.clone()],
            );
            let report = build_database(&config, &request).unwrap();
            assert_eq!(report.record_count(), 2);
            assert!(value_of(&request.cdb_path, b".db.tmp").is_none());
            assert!(!request.tmp_path.exists());
        }
    }

    #[test]
    fn test_record_order_is_name_order() {
        let harness = BuildHarness::new();
        let root = harness.root("r");
        for name in ["b", "a/z", "a/y", "C", "a.txt"] {
            harness.write(&root, name, name.as_bytes()).unwrap();
        }

        let request = harness.request("ordered", vec![root]);
        build_database(&Config::default(), &request).unwrap();

        let cdb = Cdb::open(&request.cdb_path).unwrap();
        let keys: Vec<Vec<u8>> = cdb.iter().map(|r| r.unwrap().0.to_vec()).collect();
        assert_eq!(
            keys,
            vec![
                b"C".to_vec(),
                b"a/y".to_vec(),
                b"a/z".to_vec(),
                b"a.txt".to_vec(),
                b"b".to_vec(),
            ]
        );
    }

    #[test]
    fn test_rename_failure_leaves_target_untouched() {
        let harness = BuildHarness::new();
        let root = harness.root("r");
        harness.write(&root, "k", b"v").unwrap();

        // A rename onto an occupied directory fails after the build is sealed
        let target = harness.root("occupied");
        harness.write(&target, "keep", b"keep").unwrap();
        let request = BuildRequest::new(target.clone(), harness.work_dir.path().join("db.tmp"), vec![root]);

        let err = build_database(&Config::default(), &request).unwrap_err();
        assert!(err.is_post_seal());
        assert_eq!(err.exit_code(), EXIT_FAILURE);
        assert!(target.join("keep").exists());
    }
}
