//! Detection analyzers.
//!
//! Each analyzer declares the features it needs and produces at most one
//! finding per file. An analyzer that cannot load its model or rules stays
//! registered but inactive; the engine degrades instead of failing.

pub mod bayes;
pub mod regex;
pub mod statistical;
pub mod svm;
#[cfg(feature = "yara")]
pub mod yara;

use std::sync::Arc;

use tracing::warn;

use crate::config::Config;
use crate::features::{FeatureKey, FeatureSet};
use crate::types::{FileInfo, Finding};

pub trait Analyzer: Send + Sync {
    fn name(&self) -> &'static str;
    fn required_features(&self) -> &'static [FeatureKey];
    fn analyze(
        &self,
        file: &FileInfo,
        content: &[u8],
        features: &FeatureSet,
    ) -> anyhow::Result<Option<Finding>>;
}

/// Build the configured analyzers, sorted by name so iteration order is
/// deterministic. Unknown names are skipped with a warning.
pub fn build(config: &Config) -> Vec<Arc<dyn Analyzer>> {
    let mut analyzers: Vec<Arc<dyn Analyzer>> = Vec::new();

    for name in &config.enabled_analyzers {
        match name.to_lowercase().as_str() {
            "regex" => match regex::RegexAnalyzer::new() {
                Ok(a) => analyzers.push(Arc::new(a)),
                Err(e) => warn!("regex analyzer failed to initialize: {e}"),
            },
            "yara" => {
                #[cfg(feature = "yara")]
                analyzers.push(Arc::new(yara::YaraAnalyzer::new(
                    &config.data_paths.signatures,
                )));
                #[cfg(not(feature = "yara"))]
                warn!("yara analyzer requested but yara support is not compiled in");
            }
            "statistical" => analyzers.push(Arc::new(statistical::StatisticalAnalyzer::new())),
            "bayes_words" => analyzers.push(Arc::new(bayes::BayesWordsAnalyzer::new(
                &config.data_paths.models,
            ))),
            "svm_prosses" => analyzers.push(Arc::new(svm::SvmProssesAnalyzer::new(
                &config.data_paths.models,
            ))),
            other => warn!("unknown analyzer in config: {other}"),
        }
    }

    analyzers.sort_by_key(|a| a.name());
    analyzers.dedup_by_key(|a| a.name());
    analyzers
}
