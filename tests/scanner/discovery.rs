//! Path discovery: extension filtering, exclusion pruning, deduplication.

use std::fs;
use tempfile::TempDir;

use phpshield::engine::discover;

fn touch(dir: &TempDir, rel: &str) {
    let path = dir.path().join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, b"<?php echo 1;").unwrap();
}

fn names(paths: &[std::path::PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_only_php_files_enqueued() {
    let dir = TempDir::new().unwrap();
    touch(&dir, "a.php");
    touch(&dir, "b.txt");
    touch(&dir, "c.PHP");
    touch(&dir, "d.phtml");

    let files = discover(&[dir.path().display().to_string()], &[]);
    let mut found = names(&files);
    found.sort();
    assert_eq!(found, vec!["a.php", "c.PHP"]);
}

#[test]
fn test_recursive_walk() {
    let dir = TempDir::new().unwrap();
    touch(&dir, "top.php");
    touch(&dir, "sub/inner.php");
    touch(&dir, "sub/deeper/leaf.php");

    let files = discover(&[dir.path().display().to_string()], &[]);
    assert_eq!(files.len(), 3);
}

#[test]
fn test_directory_exclusion_prunes_subtree() {
    let dir = TempDir::new().unwrap();
    touch(&dir, "keep.php");
    touch(&dir, "vendor/skip.php");
    touch(&dir, "vendor/deep/skip2.php");

    let exclusion = dir.path().join("vendor").display().to_string();
    let files = discover(&[dir.path().display().to_string()], &[exclusion]);
    assert_eq!(names(&files), vec!["keep.php"]);
}

#[test]
fn test_file_exclusion() {
    let dir = TempDir::new().unwrap();
    touch(&dir, "keep.php");
    touch(&dir, "drop.php");

    let exclusion = dir.path().join("drop.php").display().to_string();
    let files = discover(&[dir.path().display().to_string()], &[exclusion]);
    assert_eq!(names(&files), vec!["keep.php"]);
}

#[test]
fn test_excluded_target_skipped_entirely() {
    let dir = TempDir::new().unwrap();
    touch(&dir, "a.php");

    let target = dir.path().display().to_string();
    let files = discover(&[target.clone()], &[target]);
    assert!(files.is_empty());
}

#[test]
fn test_duplicate_targets_deduplicated() {
    let dir = TempDir::new().unwrap();
    touch(&dir, "a.php");

    let target = dir.path().display().to_string();
    let direct = dir.path().join("a.php").display().to_string();
    let files = discover(&[target, direct], &[]);
    assert_eq!(files.len(), 1);
}

#[test]
fn test_single_file_target() {
    let dir = TempDir::new().unwrap();
    touch(&dir, "one.php");

    let direct = dir.path().join("one.php").display().to_string();
    let files = discover(&[direct], &[]);
    assert_eq!(files.len(), 1);
}

#[test]
fn test_nonexistent_target_skipped() {
    let files = discover(&["/no/such/path/anywhere".to_string()], &[]);
    assert!(files.is_empty());
}

#[test]
fn test_order_is_total_and_stable() {
    let dir = TempDir::new().unwrap();
    touch(&dir, "c.php");
    touch(&dir, "a.php");
    touch(&dir, "b.php");

    let target = dir.path().display().to_string();
    let first = discover(&[target.clone()], &[]);
    let second = discover(&[target], &[]);
    assert_eq!(first, second);
    let mut sorted = first.clone();
    sorted.sort();
    assert_eq!(first, sorted);
}
