//! Multinomial naive Bayes over tree-derived words.
//!
//! The model file stores raw training counts; the classifier is rebuilt
//! from them at load time. Scores are kept in log space and converted to a
//! two-class confidence with max-subtraction for numeric stability.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use tracing::warn;

use super::Analyzer;
use crate::assets;
use crate::features::{FeatureKey, FeatureSet};
use crate::types::{FileInfo, Finding, RiskLevel};

const MODEL_ASSET: &str = "data/models/Words.model";
const MODEL_FILE: &str = "Words.model";

#[derive(Debug, Deserialize)]
struct ClassData {
    #[serde(rename = "docCount")]
    doc_count: u64,
    #[serde(rename = "wordCount")]
    word_count: HashMap<String, u64>,
    #[serde(rename = "totalWordCount")]
    total_word_count: u64,
}

#[derive(Debug, Deserialize)]
struct WordsModel {
    normal: ClassData,
    webshell: ClassData,
    #[serde(rename = "totalDocumentCount")]
    total_document_count: u64,
}

struct Classifier {
    log_prior_normal: f64,
    log_prior_webshell: f64,
    normal_counts: HashMap<String, u64>,
    webshell_counts: HashMap<String, u64>,
    normal_total: u64,
    webshell_total: u64,
    /// Joint vocabulary size, used for Laplace smoothing.
    vocabulary: usize,
}

impl Classifier {
    fn from_model(model: WordsModel) -> Self {
        let (log_prior_normal, log_prior_webshell) = if model.total_document_count > 0 {
            let total = model.total_document_count as f64;
            (
                (model.normal.doc_count as f64 / total).ln(),
                (model.webshell.doc_count as f64 / total).ln(),
            )
        } else {
            (0.5f64.ln(), 0.5f64.ln())
        };

        let vocabulary: HashSet<&String> = model
            .normal
            .word_count
            .keys()
            .chain(model.webshell.word_count.keys())
            .collect();
        let vocabulary = vocabulary.len();

        Self {
            log_prior_normal,
            log_prior_webshell,
            normal_total: model.normal.total_word_count,
            webshell_total: model.webshell.total_word_count,
            normal_counts: model.normal.word_count,
            webshell_counts: model.webshell.word_count,
            vocabulary,
        }
    }

    /// Log-scores for (normal, webshell).
    fn scores(&self, words: &[String]) -> (f64, f64) {
        let mut normal = self.log_prior_normal;
        let mut webshell = self.log_prior_webshell;
        let normal_denom = (self.normal_total + self.vocabulary as u64) as f64;
        let webshell_denom = (self.webshell_total + self.vocabulary as u64) as f64;

        for word in words {
            let fn_ = self.normal_counts.get(word).copied().unwrap_or(0);
            let fw = self.webshell_counts.get(word).copied().unwrap_or(0);
            normal += ((fn_ + 1) as f64 / normal_denom).ln();
            webshell += ((fw + 1) as f64 / webshell_denom).ln();
        }
        (normal, webshell)
    }
}

pub struct BayesWordsAnalyzer {
    classifier: Option<Classifier>,
}

impl BayesWordsAnalyzer {
    /// Load the embedded model, falling back to `<models_dir>/Words.model`.
    /// A missing or unparsable model leaves the analyzer inactive.
    pub fn new(models_dir: &str) -> Self {
        let data = match assets::load(MODEL_ASSET, models_dir, MODEL_FILE) {
            Some(bytes) => bytes,
            None => {
                warn!("Bayes words model not found; bayes_words analyzer will be inactive");
                return Self { classifier: None };
            }
        };

        match serde_json::from_slice::<WordsModel>(&data) {
            Ok(model) => Self {
                classifier: Some(Classifier::from_model(model)),
            },
            Err(e) => {
                warn!("failed to parse Bayes words model: {e}; analyzer will be inactive");
                Self { classifier: None }
            }
        }
    }

    /// Probability the word bag came from the webshell class, or `None`
    /// when the model is unavailable or the words are empty. The SVM
    /// fusion analyzer consumes this directly.
    pub fn webshell_probability(&self, words: &[String]) -> Option<f64> {
        let classifier = self.classifier.as_ref()?;
        if words.is_empty() {
            return None;
        }
        let (s_normal, s_webshell) = classifier.scores(words);
        let m = s_normal.max(s_webshell);
        let p_normal = (s_normal - m).exp();
        let p_webshell = (s_webshell - m).exp();
        let total = p_normal + p_webshell;
        if total <= 1e-9 {
            return None;
        }
        Some(p_webshell / total)
    }
}

impl Analyzer for BayesWordsAnalyzer {
    fn name(&self) -> &'static str {
        "bayes_words"
    }

    fn required_features(&self) -> &'static [FeatureKey] {
        &[FeatureKey::AstWords]
    }

    fn analyze(
        &self,
        _file: &FileInfo,
        _content: &[u8],
        features: &FeatureSet,
    ) -> anyhow::Result<Option<Finding>> {
        if self.classifier.is_none() {
            return Ok(None);
        }
        let words = match &features.ast_words {
            Some(words) if !words.is_empty() => words,
            _ => return Ok(None),
        };

        let confidence = match self.webshell_probability(words) {
            Some(p) => p,
            None => return Ok(None),
        };
        let predicted = if confidence >= 0.5 { "webshell" } else { "normal" };

        Ok(Some(Finding {
            analyzer: self.name().to_string(),
            description: format!(
                "Bayes words model prediction (class: {predicted}, confidence: {confidence:.4})"
            ),
            risk: RiskLevel::Medium,
            confidence,
        }))
    }
}
