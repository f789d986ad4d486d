//! Deterministic fusion of findings into an overall risk level.
//!
//! The weights here are policy, not tunables; the truth-table tests cover
//! every combination and must change together with this module.

use crate::types::{Finding, RiskLevel};

/// SVM findings only count when their confidence clears this bar.
const SVM_CONFIDENCE_BAR: f64 = 0.91;

const MAX_SCORE: u32 = 5;

/// Combine findings and the callable flag into a risk verdict.
pub fn calculate(findings: &[Finding], callable: bool) -> RiskLevel {
    let mut has_regex = false;
    let mut has_yara = false;
    let mut has_statistical = false;
    let mut high_confidence_svm = false;

    for finding in findings {
        match finding.analyzer.as_str() {
            "regex" => has_regex = true,
            "yara" => has_yara = true,
            "statistical" => has_statistical = true,
            "svm_prosses" => {
                if finding.confidence > SVM_CONFIDENCE_BAR {
                    high_confidence_svm = true;
                }
            }
            _ => {}
        }
    }

    let mut score: u32 = 0;
    if has_regex {
        score += 1;
    }
    if has_yara {
        score += 1;
    }
    if has_regex && has_yara {
        score += 2;
    }
    if callable && high_confidence_svm {
        score += 2;
    }
    if callable && has_statistical {
        score += 2;
    }
    score = score.min(MAX_SCORE);

    match score {
        0 => RiskLevel::None,
        1 | 2 => RiskLevel::Low,
        3 => RiskLevel::Medium,
        4 => RiskLevel::High,
        _ => RiskLevel::Critical,
    }
}
