//! Terminal report: per-file lines plus a summary block.

use std::collections::HashMap;
use std::path::Path;

use super::Reporter;
use crate::types::{RiskLevel, ScanResult};

pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn generate(&self, results: &[ScanResult], output: Option<&Path>) -> anyhow::Result<()> {
        if let Some(path) = output {
            eprintln!(
                "warning: console reporter ignores output path '{}', printing to stdout",
                path.display()
            );
        }

        let mut sorted: Vec<&ScanResult> = results.iter().collect();
        sorted.sort_by(|a, b| a.file.path.cmp(&b.file.path));

        println!("\n--- Scan Report ---");
        let mut risk_counts: HashMap<RiskLevel, usize> = HashMap::new();
        let mut error_files = 0usize;

        for result in &sorted {
            if let Some(error) = &result.error {
                println!("[ERROR] {} : {}", result.file.path.display(), error);
                *risk_counts.entry(RiskLevel::Unknown).or_default() += 1;
                error_files += 1;
                continue;
            }

            *risk_counts.entry(result.overall_risk).or_default() += 1;

            if result.overall_risk > RiskLevel::None || !result.findings.is_empty() {
                println!(
                    "[{}] {} (Time: {:?})",
                    result.overall_risk,
                    result.file.path.display(),
                    result.duration
                );
                let mut findings: Vec<_> = result.findings.iter().collect();
                findings.sort_by(|a, b| b.risk.cmp(&a.risk));
                for finding in findings {
                    println!(
                        "  -> [{}] {}: {}",
                        finding.risk, finding.analyzer, finding.description
                    );
                }
            }
        }

        println!("\n--- Summary ---");
        println!("Total Files Scanned: {}", sorted.len());
        println!("Files with Errors:   {}", error_files);
        println!("Risk Levels Found:");
        let levels = [
            RiskLevel::Critical,
            RiskLevel::High,
            RiskLevel::Medium,
            RiskLevel::Low,
            RiskLevel::None,
            RiskLevel::Unknown,
        ];
        for level in levels {
            if let Some(count) = risk_counts.get(&level) {
                if *count > 0 {
                    println!("  - {:<8} : {}", level.as_str(), count);
                }
            }
        }
        println!("--- End Report ---");

        Ok(())
    }
}
