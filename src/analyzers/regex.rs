//! High-risk pattern matching against raw file bytes.
//!
//! The list targets classic obfuscated-webshell idioms: dynamic eval over
//! request data, layered decoders, and known shell signatures. Patterns
//! compile once per process; the first match wins.

use once_cell::sync::Lazy;
use regex::bytes::RegexBuilder;
use tracing::warn;

use super::Analyzer;
use crate::features::{FeatureKey, FeatureSet};
use crate::types::{FileInfo, Finding, RiskLevel};

const PATTERNS: &[&str] = &[
    r"@\$\_=",
    r#"eval\s*\(\s*(['"])\s*\?>"#,
    r"eval\s*\(\s*gzinflate\s*\(",
    r"eval\s*\(\s*str_rot13\s*\(",
    r"base64_decode\s*\(\s*\$\_",
    r"eval\s*\(\s*gzuncompress\s*\(",
    r#"assert\s*\(\s*(['"]|\s*)\s*\$"#,
    r#"(require_once|include_once|require|include)\s*\(\s*(['"]|\s*)\s*\$_(POST|GET|REQUEST|COOKIE)"#,
    r"gzinflate\s*\(\s*base64_decode\s*\(",
    r#"echo\s*\(\s*file_get_contents\s*\(\s*(['"]|\s*)\s*\$_(POST|GET|REQUEST|COOKIE)"#,
    r"c99shell",
    r"cmd\.php",
    r#"call_user_func\s*\(\s*(['"]|\s*)\s*\$_(POST|GET|REQUEST|COOKIE)"#,
    r"str_rot13",
    r"webshell",
    r"EgY_SpIdEr",
    r"SECFORCE",
    r"eval\s*\(\s*base64_decode\s*\(",
    r"array_map\s*\(.{1,25}(eval|assert|ass(?-i:\\x65)rt).{1,25}\$_(GET|POST|REQUEST)",
    r"call_user_func\s*\(.{0,30}\$_(GET|POST|REQUEST)",
    r"gzencode",
    r#"call_user_func\s*\(\s*("|')assert("|')"#,
    r#"fputs\s*\(\s*fopen\s*\(\s*(.+)\s*,\s*(['"])w(['"])\s*\)\s*,\s*(['"]|\s*)\s*\$_(POST|GET|REQUEST|COOKIE)\s*\["#,
    r#"file_put_contents\s*\(\s*(['"]|\s*)\s*\$_(POST|GET|REQUEST|COOKIE)\s*\[[^\]]+\]\s*,\s*(['"]|\s*)\s*\$_(POST|GET|REQUEST|COOKIE)"#,
    r#"\$_(POST|GET|REQUEST|COOKIE)\s*\[[^\]]+\]\s*\(\s*(['"]|\s*)\s*\$_(POST|GET|REQUEST|COOKIE)\s*\["#,
    r#"assert\s*\(\s*(['"]|\s*)\s*\$_(POST|GET|REQUEST|COOKIE)"#,
    r#"eval\s*\(\s*(['"]|\s*)\s*\$_(POST|GET|REQUEST|COOKIE)"#,
    r"base64_decode\s*\(\s*gzuncompress\s*\(",
    r"gzuncompress\s*\(\s*base64_decode\s*\(",
    r"eval\s*\(\s*gzdecode\s*\(",
    r#"preg_replace\s*\(\s*["']/.*["']\s*,\s*["'].*["']\s*,\s*.*\s*\)\s*;/si"#,
    r"Scanners",
    r"phpspy",
    r"cha88\.cn",
    r"chr\s*\(\s*\d+\s*\)\s*\.\s*chr\s*\(\s*\d+\s*\)",
    r"\$\_\s*=\s*\$\_",
    r"\$\w+\s*\(\s*\$\{",
    r"\(array\)\s*\$_(POST|GET|REQUEST|COOKIE)",
    r#"\$\w+\s*\(\s*["']/.*["']\s*,\s*["'].*/e["']"#,
    r#"("e"|"E")\s*\.\s*("v"|"V")\s*\.\s*("a"|"A")\s*\.\s*("l"|"L")"#,
    r"('e'|'E')\s*\.\s*('v'|'V')\s*\.\s*('a'|'A')\s*\.\s*('l'|'L')",
    r#"@\s*preg_replace\s*\(\s*["']/.*["']/e\s*,\s*\$_POST\s*\["#,
    r"\$\{\s*'_'",
    r"@\s*\$\_\s*\(\s*\$\_",
];

struct CompiledRule {
    regex: regex::bytes::Regex,
    source: &'static str,
}

static RULES: Lazy<Vec<CompiledRule>> = Lazy::new(|| {
    let mut rules = Vec::with_capacity(PATTERNS.len());
    for pattern in PATTERNS {
        match RegexBuilder::new(pattern)
            .case_insensitive(true)
            .unicode(false)
            .build()
        {
            Ok(regex) => rules.push(CompiledRule {
                regex,
                source: pattern,
            }),
            Err(e) => warn!("dropping regex rule {pattern:?}: {e}"),
        }
    }
    rules
});

pub struct RegexAnalyzer;

impl RegexAnalyzer {
    pub fn new() -> anyhow::Result<Self> {
        if RULES.is_empty() {
            anyhow::bail!("no regex rules compiled");
        }
        Ok(Self)
    }
}

impl Analyzer for RegexAnalyzer {
    fn name(&self) -> &'static str {
        "regex"
    }

    fn required_features(&self) -> &'static [FeatureKey] {
        &[]
    }

    fn analyze(
        &self,
        _file: &FileInfo,
        content: &[u8],
        _features: &FeatureSet,
    ) -> anyhow::Result<Option<Finding>> {
        for rule in RULES.iter() {
            if rule.regex.is_match(content) {
                return Ok(Some(Finding {
                    analyzer: self.name().to_string(),
                    description: format!("Matched high-risk regex pattern: {}", rule.source),
                    risk: RiskLevel::Critical,
                    confidence: 0.9,
                }));
            }
        }
        Ok(None)
    }
}
