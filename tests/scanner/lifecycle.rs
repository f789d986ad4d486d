//! Per-file lifecycle and end-to-end verdicts without a parser.
//!
//! The parser command is pointed at a nonexistent binary, so the engine
//! runs with tree-dependent analyzers disabled; regex and YARA still work.

use std::fs;
use tempfile::TempDir;

use phpshield::{Config, Engine, RiskLevel, ScanResult, Task};

fn config(analyzers: &[&str]) -> Config {
    let mut config = Config::default();
    config.enabled_analyzers = analyzers.iter().map(|s| s.to_string()).collect();
    config.parser.command = "/nonexistent/php-ast-export".to_string();
    config.performance.concurrency = 2;
    config
}

async fn scan_dir(config: Config, dir: &TempDir) -> Vec<ScanResult> {
    let engine = Engine::new(config).unwrap();
    let task = Task {
        paths: vec![dir.path().display().to_string()],
        ..Default::default()
    };
    engine.scan(&task).await
}

fn result_for<'a>(results: &'a [ScanResult], name: &str) -> &'a ScanResult {
    results
        .iter()
        .find(|r| r.file.path.file_name().unwrap() == name)
        .unwrap_or_else(|| panic!("no result for {name}"))
}

#[tokio::test]
async fn test_plain_file_is_clean() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("hello.php"), br#"<?php echo "hi";"#).unwrap();

    let results = scan_dir(config(&["regex"]), &dir).await;
    let r = result_for(&results, "hello.php");
    assert_eq!(r.overall_risk, RiskLevel::None);
    assert!(r.findings.is_empty());
    assert!(r.error.is_none());
}

#[tokio::test]
async fn test_eval_post_regex_only_is_low() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("shell.php"), br#"<?php eval($_POST['x']);"#).unwrap();

    let results = scan_dir(config(&["regex"]), &dir).await;
    let r = result_for(&results, "shell.php");
    assert_eq!(r.findings.len(), 1);
    assert_eq!(r.findings[0].analyzer, "regex");
    assert_eq!(r.findings[0].risk, RiskLevel::Critical);
    // One matcher alone scores 1 -> Low.
    assert_eq!(r.overall_risk, RiskLevel::Low);
}

#[cfg(feature = "yara")]
#[tokio::test]
async fn test_eval_post_regex_and_yara_is_high() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("shell.php"), br#"<?php eval($_POST['x']);"#).unwrap();

    let results = scan_dir(config(&["regex", "yara"]), &dir).await;
    let r = result_for(&results, "shell.php");
    assert_eq!(r.findings.len(), 2);
    // Both matchers: 1 + 1 + 2 = 4 -> High.
    assert_eq!(r.overall_risk, RiskLevel::High);
}

#[tokio::test]
async fn test_empty_file_skips_analyzers() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("empty.php"), b"").unwrap();

    let results = scan_dir(config(&["regex"]), &dir).await;
    let r = result_for(&results, "empty.php");
    assert_eq!(r.overall_risk, RiskLevel::None);
    assert!(r.findings.is_empty());
    assert!(r.error.is_none());
}

#[tokio::test]
async fn test_oversize_file_errors_without_scanning() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("big.php");
    let file = fs::File::create(&path).unwrap();
    file.set_len(10 * 1024 * 1024 + 1).unwrap();

    let results = scan_dir(config(&["regex"]), &dir).await;
    let r = result_for(&results, "big.php");
    assert!(r.error.as_deref().unwrap().contains("size limit"));
    assert_eq!(r.overall_risk, RiskLevel::Unknown);
    assert!(r.findings.is_empty());
}

#[tokio::test]
async fn test_tree_dependent_analyzers_disabled_without_bridge() {
    // statistical/bayes/svm all need the tree; with the bridge down only
    // regex remains.
    let engine = Engine::new(config(&[
        "regex",
        "statistical",
        "bayes_words",
        "svm_prosses",
    ]))
    .unwrap();
    assert_eq!(engine.analyzer_names(), vec!["regex"]);
}

#[tokio::test]
async fn test_determinism_across_runs_and_concurrency() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.php"), br#"<?php echo "hi";"#).unwrap();
    fs::write(dir.path().join("b.php"), br#"<?php eval($_POST['x']);"#).unwrap();
    fs::write(dir.path().join("c.php"), br#"<?php assert($_REQUEST['q']);"#).unwrap();

    let mut serial = config(&["regex"]);
    serial.performance.concurrency = 1;
    let mut parallel = config(&["regex"]);
    parallel.performance.concurrency = 4;

    let mut first = scan_dir(serial, &dir).await;
    let mut second = scan_dir(parallel, &dir).await;
    first.sort_by(|a, b| a.file.path.cmp(&b.file.path));
    second.sort_by(|a, b| a.file.path.cmp(&b.file.path));

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.file.path, b.file.path);
        assert_eq!(a.overall_risk, b.overall_risk);
        assert_eq!(a.findings.len(), b.findings.len());
        for (fa, fb) in a.findings.iter().zip(&b.findings) {
            assert_eq!(fa.analyzer, fb.analyzer);
            assert_eq!(fa.description, fb.description);
        }
    }
}

#[tokio::test]
async fn test_duration_is_recorded() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.php"), br#"<?php echo 1;"#).unwrap();

    let results = scan_dir(config(&["regex"]), &dir).await;
    // Duration is always measured from stat time; zero only on a clock
    // with no forward progress.
    assert!(results[0].duration.as_nanos() > 0);
}
