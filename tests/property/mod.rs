//! Property-based testing for d2cdb
//!
//! Uses proptest to verify key derivation and walk order invariants across
//! randomly generated paths and trees.

use ::d2cdb::key::derive_key;
use ::d2cdb::traversal::{Node, Traversal};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Generate path segments that are valid, non-dot file names
fn segment_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,8}".prop_map(|s| s),
        "[A-Z][a-z0-9_]{0,6}".prop_map(|s| s),
        "[a-z]{1,6}\\.(txt|rs|md)".prop_map(|s| s),
    ]
}

/// Generate relative paths of one to five segments
fn relative_path_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(segment_strategy(), 1..=5)
}

proptest! {
    #[test]
    fn default_key_is_relative_path(segments in relative_path_strategy()) {
        let root = PathBuf::from("/srv/root");
        let path = segments.iter().fold(root.clone(), |p, s| p.join(s));

        let key = derive_key(&path, &root, segments.len(), false).unwrap();
        prop_assert_eq!(key, segments.join("/").into_bytes());
    }

    #[test]
    fn multi_key_drops_file_name_below_first_level(segments in relative_path_strategy()) {
        let root = PathBuf::from("/srv/root");
        let path = segments.iter().fold(root.clone(), |p, s| p.join(s));
        let depth = segments.len();

        let key = derive_key(&path, &root, depth, true).unwrap();
        let expected = if depth > 1 {
            segments[..depth - 1].join("/")
        } else {
            segments[0].clone()
        };
        prop_assert_eq!(key, expected.into_bytes());
    }

    #[test]
    fn key_never_contains_root_or_leading_separator(segments in relative_path_strategy(), multi in any::<bool>()) {
        let root = PathBuf::from("/srv/root");
        let path = segments.iter().fold(root.clone(), |p, s| p.join(s));

        let key = derive_key(&path, &root, segments.len(), multi).unwrap();
        prop_assert!(!key.is_empty());
        prop_assert!(key[0] != b'/');
        prop_assert!(!key.starts_with(b"/srv/root"));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn walk_visits_every_file_once_in_name_order(
        files in prop::collection::btree_set(relative_path_strategy(), 1..12)
    ) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("root");
        fs::create_dir(&root).unwrap();

        let mut written = BTreeSet::new();
        for segments in &files {
            let path = segments.iter().fold(root.clone(), |p, s| p.join(s));
            // Skip paths that collide with a directory or file already created
            if fs::create_dir_all(path.parent().unwrap()).is_err() || path.exists() {
                continue;
            }
            if fs::write(&path, segments.join("/")).is_ok() {
                written.insert(path);
            }
        }

        let visited: Vec<PathBuf> = Traversal::new(&root, false)
            .map(|n| n.unwrap())
            .filter(Node::is_file)
            .map(|n| n.path)
            .collect();

        let unique: BTreeSet<PathBuf> = visited.iter().cloned().collect();
        prop_assert_eq!(unique.len(), visited.len());
        prop_assert_eq!(&unique, &written);

        // Pre-order with byte-wise sibling order equals ordering by component lists
        let mut expected = visited.clone();
        expected.sort_by(|a, b| components(a, &root).cmp(&components(b, &root)));
        prop_assert_eq!(visited, expected);
    }
}

fn components(path: &Path, root: &Path) -> Vec<String> {
    path.strip_prefix(root)
        .unwrap()
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect()
}
