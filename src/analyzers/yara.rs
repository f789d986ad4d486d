//! YARA signature matching against file bytes.

use yara::{Compiler, Rules};

use tracing::warn;

use super::Analyzer;
use crate::assets;
use crate::features::{FeatureKey, FeatureSet};
use crate::types::{FileInfo, Finding, RiskLevel};

const RULES_ASSET: &str = "data/signatures/Webshells_rules.yar";
const RULES_FILE: &str = "Webshells_rules.yar";
const SCAN_TIMEOUT_SECS: i32 = 30;

pub struct YaraAnalyzer {
    rules: Option<Rules>,
}

impl YaraAnalyzer {
    /// Compile the embedded ruleset, falling back to
    /// `<signatures_dir>/Webshells_rules.yar`. Missing or uncompilable
    /// rules leave the analyzer inactive.
    pub fn new(signatures_dir: &str) -> Self {
        let source = match assets::load(RULES_ASSET, signatures_dir, RULES_FILE) {
            Some(bytes) => bytes,
            None => {
                warn!("YARA ruleset not found; yara analyzer will be inactive");
                return Self { rules: None };
            }
        };

        let rules = match Self::compile(&source) {
            Ok(rules) => Some(rules),
            Err(e) => {
                warn!("failed to compile YARA rules: {e}; yara analyzer will be inactive");
                None
            }
        };
        Self { rules }
    }

    fn compile(source: &[u8]) -> anyhow::Result<Rules> {
        let text = String::from_utf8_lossy(source);
        let mut compiler = Compiler::new()?;
        compiler.add_rules_str(&text)?;
        Ok(compiler.compile_rules()?)
    }
}

impl Analyzer for YaraAnalyzer {
    fn name(&self) -> &'static str {
        "yara"
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
        let rules = match &self.rules {
            Some(rules) => rules,
            None => return Ok(None),
        };

        let matches = rules.scan_mem(content, SCAN_TIMEOUT_SECS)?;
        if let Some(first) = matches.first() {
            return Ok(Some(Finding {
                analyzer: self.name().to_string(),
                description: format!("Matched YARA rule: {}", first.identifier),
                risk: RiskLevel::Critical,
                confidence: 1.0,
            }));
        }
        Ok(None)
    }
}
