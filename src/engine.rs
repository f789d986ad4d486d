//! Scan orchestration: path discovery, bridge gating, worker pool, and the
//! per-file lifecycle.

use std::collections::{HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::analyzers::{self, Analyzer};
use crate::bridge::ParserBridge;
use crate::config::Config;
use crate::features;
use crate::scoring;
use crate::tree::TreeValue;
use crate::types::{FileInfo, RiskLevel, ScanResult};

const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
const FALLBACK_CONCURRENCY: usize = 4;

/// One scan request: targets, exclusions, and reporting preferences.
#[derive(Debug, Clone, Default)]
pub struct Task {
    pub paths: Vec<String>,
    pub exclusions: Vec<String>,
    pub report_path: Option<PathBuf>,
    pub format: String,
}

pub struct Engine {
    config: Config,
    analyzers: Vec<Arc<dyn Analyzer>>,
    bridge: Option<Arc<ParserBridge>>,
}

impl Engine {
    /// Build analyzers from the configuration and start the parser bridge
    /// when any of them needs tree-derived features. A bridge that fails to
    /// start disables tree-dependent analyzers but never the scan.
    pub fn new(config: Config) -> Result<Self> {
        let mut analyzers = analyzers::build(&config);

        let needs_tree = analyzers
            .iter()
            .flat_map(|a| a.required_features())
            .any(|key| key.needs_tree());

        let bridge = if needs_tree {
            let timeout = Duration::from_secs(config.parser.timeout_secs.max(1));
            match ParserBridge::spawn(&config.parser.command, &config.parser.args, timeout) {
                Ok(bridge) => Some(Arc::new(bridge)),
                Err(e) => {
                    warn!(
                        "parser bridge failed to start ({e}); disabling tree-dependent analyzers"
                    );
                    None
                }
            }
        } else {
            debug!("no tree-dependent analyzers enabled, skipping parser bridge");
            None
        };

        if bridge.is_none() {
            analyzers.retain(|a| {
                let tree_dependent = a.required_features().iter().any(|k| k.needs_tree());
                if tree_dependent {
                    warn!("analyzer '{}' disabled: parser bridge unavailable", a.name());
                }
                !tree_dependent
            });
        }

        Ok(Self {
            config,
            analyzers,
            bridge,
        })
    }

    pub fn analyzer_names(&self) -> Vec<&'static str> {
        self.analyzers.iter().map(|a| a.name()).collect()
    }

    /// Scan every file the task selects and return all results. The parser
    /// bridge shuts down before returning.
    pub async fn scan(&self, task: &Task) -> Vec<ScanResult> {
        let files = discover(&task.paths, &task.exclusions);
        info!("found {} unique PHP files to scan", files.len());

        let results = if files.is_empty() {
            Vec::new()
        } else {
            self.scan_files(files).await
        };

        if let Some(bridge) = &self.bridge {
            bridge.shutdown().await;
        }
        results
    }

    async fn scan_files(&self, files: Vec<PathBuf>) -> Vec<ScanResult> {
        let mut concurrency = self.config.performance.concurrency;
        if concurrency == 0 {
            concurrency = FALLBACK_CONCURRENCY;
        }
        let concurrency = concurrency.min(files.len()).max(1);

        let total = files.len();
        let queue = Arc::new(Mutex::new(files.into_iter().collect::<VecDeque<_>>()));
        let (tx, mut rx) = mpsc::channel::<ScanResult>(concurrency * 2);

        let started = Instant::now();
        let mut workers = Vec::with_capacity(concurrency);
        for _ in 0..concurrency {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            let analyzers = self.analyzers.clone();
            let bridge = self.bridge.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let path = match queue.lock().await.pop_front() {
                        Some(path) => path,
                        None => break,
                    };
                    let result = scan_file(&path, &analyzers, bridge.as_deref()).await;
                    if tx.send(result).await.is_err() {
                        break;
                    }
                }
            }));
        }
        drop(tx);

        let mut results = Vec::with_capacity(total);
        while let Some(result) = rx.recv().await {
            results.push(result);
        }
        for worker in workers {
            let _ = worker.await;
        }

        info!("scanning finished in {:?}", started.elapsed());
        results
    }
}

/// Run one file through the full lifecycle: stat, size caps, read, tree,
/// features, gated analyzers, score.
async fn scan_file(
    path: &Path,
    analyzers: &[Arc<dyn Analyzer>],
    bridge: Option<&ParserBridge>,
) -> ScanResult {
    let start = Instant::now();
    let mut result = ScanResult::new(FileInfo::new(path.to_path_buf()));

    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) => {
            result.error = Some(format!("stat error: {e}"));
            result.duration = start.elapsed();
            return result;
        }
    };
    result.file.size = meta.len();
    result.file.modified = meta.modified().ok().map(chrono::DateTime::from);

    if meta.len() > MAX_FILE_SIZE {
        result.error = Some(format!(
            "file exceeds size limit ({} > {} bytes)",
            meta.len(),
            MAX_FILE_SIZE
        ));
        result.duration = start.elapsed();
        return result;
    }
    if meta.len() == 0 {
        result.overall_risk = RiskLevel::None;
        result.duration = start.elapsed();
        return result;
    }

    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) => {
            result.error = Some(format!("read error: {e}"));
            result.duration = start.elapsed();
            return result;
        }
    };

    let tree: Option<Arc<TreeValue>> = match bridge {
        Some(bridge) if bridge.is_active().await => match bridge.parse(&content).await {
            Ok(tree) => Some(Arc::new(tree)),
            Err(e) => {
                warn!("tree acquisition failed for {}: {e}", path.display());
                None
            }
        },
        _ => None,
    };

    let (feature_set, feature_err) = features::extract_all(&content, tree);
    if let Some(e) = feature_err {
        warn!("feature extraction for {}: {e}", path.display());
    }

    let mut findings = Vec::new();
    for analyzer in analyzers {
        let satisfied = analyzer
            .required_features()
            .iter()
            .all(|&key| feature_set.has(key));
        if !satisfied {
            debug!(
                "skipping analyzer '{}' for {}: missing required features",
                analyzer.name(),
                path.display()
            );
            continue;
        }
        match analyzer.analyze(&result.file, &content, &feature_set) {
            Ok(Some(finding)) => findings.push(finding),
            Ok(None) => {}
            Err(e) => warn!("analyzer '{}' failed on {}: {e}", analyzer.name(), path.display()),
        }
    }

    result.overall_risk = scoring::calculate(&findings, feature_set.callable);
    result.findings = findings;
    result.duration = start.elapsed();
    result
}

/// Resolve targets to the set of `.php` files to scan: absolute, exclusion
/// pruned, deduplicated, and sorted so each run sees a total order.
pub fn discover(paths: &[String], exclusions: &[String]) -> Vec<PathBuf> {
    let excluded: HashSet<PathBuf> = exclusions.iter().map(|p| absolutize(Path::new(p))).collect();

    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for target in paths {
        let target = absolutize(Path::new(target));
        if excluded.contains(&target) {
            info!("excluding target path {}", target.display());
            continue;
        }

        let meta = match std::fs::metadata(&target) {
            Ok(meta) => meta,
            Err(e) => {
                warn!("skipping path {}: {e}", target.display());
                continue;
            }
        };

        if meta.is_dir() {
            let walker = WalkDir::new(&target)
                .into_iter()
                .filter_entry(|entry| !excluded.contains(entry.path()));
            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("error during directory walk: {e}");
                        continue;
                    }
                };
                if entry.file_type().is_file() && is_php(entry.path()) {
                    let path = entry.path().to_path_buf();
                    if seen.insert(path.clone()) {
                        files.push(path);
                    }
                }
            }
        } else if is_php(&target) {
            if seen.insert(target.clone()) {
                files.push(target);
            }
        } else {
            debug!("skipping non-PHP file {}", target.display());
        }
    }

    files.sort();
    files
}

fn is_php(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("php"))
        .unwrap_or(false)
}

/// Lexically absolutize: join onto the working directory and resolve `.`
/// and `..` components without touching symlinks.
fn absolutize(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_php_case_insensitive() {
        assert!(is_php(Path::new("/a/b.php")));
        assert!(is_php(Path::new("/a/b.PHP")));
        assert!(is_php(Path::new("/a/b.PhP")));
        assert!(!is_php(Path::new("/a/b.phtml")));
        assert!(!is_php(Path::new("/a/b.txt")));
        assert!(!is_php(Path::new("/a/php")));
    }

    #[test]
    fn test_absolutize_resolves_dots() {
        let p = absolutize(Path::new("/var/www/./html/../site"));
        assert_eq!(p, PathBuf::from("/var/www/site"));
    }

    #[test]
    fn test_absolutize_relative_joins_cwd() {
        let p = absolutize(Path::new("some/file.php"));
        assert!(p.is_absolute());
        assert!(p.ends_with("some/file.php"));
    }
}
