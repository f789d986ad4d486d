//! Engine behavior with a live parser subprocess, faked in shell.
//!
//! The fake parser speaks the real framing protocol in a loop, one framed
//! request per file, so these tests cover the full bridged pipeline
//! including tree-derived features.

use std::fs;
use tempfile::TempDir;

use phpshield::{Config, Engine, RiskLevel, ScanResult, Task};

/// Replies to every request with a tree containing one call node, so
/// `callable` is true and the word bag is `["system"]`.
const LOOP_PARSER_CALLABLE: &str = r#"
while read n; do
  dd bs=1 count="$n" >/dev/null 2>&1
  msg='{"ast":{"kind":132,"flags":0,"lineno":1,"children":[{"kind":515,"flags":0,"lineno":1,"children":{"name":"system"}}]}}'
  printf '%s\n' "${#msg}"
  printf '%s' "$msg"
done
"#;

/// Rejects every file with a parse error.
const LOOP_PARSER_REJECT: &str = r#"
while read n; do
  dd bs=1 count="$n" >/dev/null 2>&1
  printf '0\n'
  printf 'syntax error, unexpected end of file\n'
done
"#;

fn config(analyzers: &[&str], script: &str) -> Config {
    let mut config = Config::default();
    config.enabled_analyzers = analyzers.iter().map(|s| s.to_string()).collect();
    config.parser.command = "sh".to_string();
    config.parser.args = vec!["-c".to_string(), script.to_string()];
    config.parser.timeout_secs = 10;
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
async fn test_statistical_fires_with_callable_tree() {
    let dir = TempDir::new().unwrap();
    // A line far over the 2048-byte bound makes the vector abnormal; the
    // fake parser supplies the callable structure.
    let mut content = b"<?php $p = \"".to_vec();
    content.extend(std::iter::repeat(b'A').take(4000));
    content.extend_from_slice(b"\"; system($p);");
    fs::write(dir.path().join("long.php"), &content).unwrap();

    let results = scan_dir(config(&["statistical"], LOOP_PARSER_CALLABLE), &dir).await;
    let r = result_for(&results, "long.php");
    assert_eq!(r.findings.len(), 1);
    assert_eq!(r.findings[0].analyzer, "statistical");
    // Statistical anomaly with callable scores 2 -> Low.
    assert_eq!(r.overall_risk, RiskLevel::Low);
}

#[tokio::test]
async fn test_bayes_runs_on_tree_words() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("call.php"), b"<?php system('id');").unwrap();

    let results = scan_dir(config(&["bayes_words"], LOOP_PARSER_CALLABLE), &dir).await;
    let r = result_for(&results, "call.php");
    assert_eq!(r.findings.len(), 1);
    let finding = &r.findings[0];
    assert_eq!(finding.analyzer, "bayes_words");
    assert!(finding.confidence >= 0.0 && finding.confidence <= 1.0);
    // Bayes findings never feed the scorer on their own.
    assert_eq!(r.overall_risk, RiskLevel::None);
}

#[tokio::test]
async fn test_parse_rejection_keeps_content_analyzers() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("broken.php"), br#"<?php eval($_POST['x']); {"#).unwrap();

    let results = scan_dir(
        config(&["regex", "bayes_words", "statistical"], LOOP_PARSER_REJECT),
        &dir,
    )
    .await;
    let r = result_for(&results, "broken.php");
    // Tree-dependent analyzers are skipped for this file, regex still runs.
    assert_eq!(r.findings.len(), 1);
    assert_eq!(r.findings[0].analyzer, "regex");
    assert_eq!(r.overall_risk, RiskLevel::Low);
    assert!(r.error.is_none());
}

#[tokio::test]
async fn test_concurrent_scans_serialize_on_bridge() {
    let dir = TempDir::new().unwrap();
    for i in 0..8 {
        fs::write(
            dir.path().join(format!("f{i}.php")),
            format!("<?php system('job {i}');").as_bytes(),
        )
        .unwrap();
    }

    let mut cfg = config(&["bayes_words"], LOOP_PARSER_CALLABLE);
    cfg.performance.concurrency = 4;
    let results = scan_dir(cfg, &dir).await;
    assert_eq!(results.len(), 8);
    // Every file got a correct individual tree: one bayes finding each,
    // all with identical confidence since the fake trees are identical.
    let confidences: Vec<String> = results
        .iter()
        .map(|r| {
            assert_eq!(r.findings.len(), 1, "{}", r.file.path.display());
            format!("{:.12}", r.findings[0].confidence)
        })
        .collect();
    assert!(confidences.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_bridge_death_degrades_remaining_files() {
    let dir = TempDir::new().unwrap();
    for name in ["a.php", "b.php", "c.php"] {
        fs::write(dir.path().join(name), br#"<?php eval($_POST['x']);"#).unwrap();
    }

    // The fake parser answers exactly one request then exits; remaining
    // files see the bridge inactive and still get regex verdicts.
    let one_shot = r#"
read n
dd bs=1 count="$n" >/dev/null 2>&1
msg='{"ast":{"kind":132,"flags":0,"lineno":1,"children":null}}'
printf '%s\n' "${#msg}"
printf '%s' "$msg"
"#;
    let mut cfg = config(&["regex", "bayes_words"], one_shot);
    cfg.performance.concurrency = 1;
    let results = scan_dir(cfg, &dir).await;
    assert_eq!(results.len(), 3);
    for r in &results {
        assert!(r.error.is_none());
        assert!(r.findings.iter().any(|f| f.analyzer == "regex"));
        assert_eq!(r.overall_risk, RiskLevel::Low);
    }
}
