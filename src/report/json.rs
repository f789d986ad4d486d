//! JSON report with the fixed schema consumed by the upload front-end.
//!
//! Files that errored are omitted. Risk codes and text labels are part of
//! the wire contract and must not drift.

use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use super::Reporter;
use crate::types::{RiskLevel, ScanResult};

const DEFAULT_OUTPUT: &str = "data/webshellJson.json";

#[derive(Debug, Serialize)]
struct SimpleResult {
    filename: String,
    #[serde(rename = "type")]
    file_type: String,
    risk: u8,
    risk_text: String,
    description: String,
}

#[derive(Debug, Serialize)]
struct Report {
    results: Vec<SimpleResult>,
}

fn classify(risk: RiskLevel) -> (u8, &'static str, &'static str) {
    match risk {
        RiskLevel::None => (0, "正常", "未发现问题"),
        RiskLevel::Low => (1, "疑似木马", "检测到可疑特征"),
        RiskLevel::Medium => (3, "疑似木马", "检测到可疑特征"),
        RiskLevel::High => (4, "疑似木马", "检测到可疑特征"),
        RiskLevel::Critical => (5, "木马文件", "检测为高危木马"),
        RiskLevel::Unknown => (0, "未知", "检测过程异常"),
    }
}

pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn generate(&self, results: &[ScanResult], output: Option<&Path>) -> anyhow::Result<()> {
        let report = build_report(results);

        let path = output
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| DEFAULT_OUTPUT.into());
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating report directory {}", parent.display()))?;
            }
        }

        let body = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, body)
            .with_context(|| format!("writing JSON report to {}", path.display()))?;
        Ok(())
    }
}

fn build_report(results: &[ScanResult]) -> Report {
    let mut simplified = Vec::with_capacity(results.len());
    for result in results {
        if result.error.is_some() {
            continue;
        }

        let filename = result
            .file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_type = result
            .file
            .path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let (risk, risk_text, description) = classify(result.overall_risk);
        simplified.push(SimpleResult {
            filename,
            file_type,
            risk,
            risk_text: risk_text.to_string(),
            description: description.to_string(),
        });
    }
    Report { results: simplified }
}
