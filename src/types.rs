//! Common types shared across the scan pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Risk verdict for a file, ordered from unknown to confirmed malicious.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Unknown,
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Integer code used in reports (0..5).
    pub fn code(&self) -> u8 {
        match self {
            RiskLevel::Unknown => 0,
            RiskLevel::None => 1,
            RiskLevel::Low => 2,
            RiskLevel::Medium => 3,
            RiskLevel::High => 4,
            RiskLevel::Critical => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Unknown => "Unknown",
            RiskLevel::None => "Safe",
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Basic information about a scanned file, captured once at stat time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl FileInfo {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            size: 0,
            modified: None,
        }
    }
}

/// A single analyzer's verdict for a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Name of the analyzer that produced this finding.
    pub analyzer: String,
    pub description: String,
    pub risk: RiskLevel,
    /// Confidence in [0, 1].
    pub confidence: f64,
}

/// Overall result for a single scanned file.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub file: FileInfo,
    pub overall_risk: RiskLevel,
    pub findings: Vec<Finding>,
    pub error: Option<String>,
    pub duration: Duration,
    /// Reserved: set when tree acquisition was skipped deliberately.
    pub tree_skipped: bool,
}

impl ScanResult {
    pub fn new(file: FileInfo) -> Self {
        Self {
            file,
            overall_risk: RiskLevel::Unknown,
            findings: Vec::new(),
            error: None,
            duration: Duration::ZERO,
            tree_skipped: false,
        }
    }
}
