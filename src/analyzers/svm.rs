//! SVM fusion over calibrated statistical features and the Bayes score.
//!
//! Two assets drive this analyzer: a calibration descriptor (feature
//! statistics, sigmoid parameters, validation samples) and a libsvm-format
//! model. The decision function is evaluated in-crate; only the raw
//! decision value matters, so linear and kernel models both work.
//!
//! At startup every validation sample is re-predicted. When the model's
//! decision direction disagrees with the recorded expectations, future
//! decisions are negated rather than failing the analyzer.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{info, warn};

use super::bayes::BayesWordsAnalyzer;
use super::Analyzer;
use crate::assets;
use crate::features::{FeatureKey, FeatureSet};
use crate::types::{FileInfo, Finding, RiskLevel};

const INFO_ASSET: &str = "data/models/ProcessSVM.model.info";
const INFO_FILE: &str = "ProcessSVM.model.info";
const MODEL_ASSET: &str = "data/models/ProcessSVM.model.model";
const MODEL_FILE: &str = "ProcessSVM.model.model";

/// Emission threshold fixed by the scoring contract (not `t*`).
const EMIT_THRESHOLD: f64 = 0.95;

const DEFAULT_BAYES_SCORE: f64 = 0.5;

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureStats {
    #[serde(default)]
    pub mins: Vec<f64>,
    #[serde(default)]
    pub maxs: Vec<f64>,
    #[serde(default)]
    pub means: Vec<f64>,
    #[serde(default)]
    pub stds: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SigmoidParams {
    pub a: f64,
    pub b: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationSample {
    pub features: Vec<f64>,
    #[serde(default)]
    pub raw_decision: f64,
    #[serde(default)]
    pub sigmoid_score: f64,
    pub expected_class: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalibrationInfo {
    pub feature_names: Vec<String>,
    pub num_features: usize,
    pub feature_stats: FeatureStats,
    pub sigmoid_params: SigmoidParams,
    pub optimal_threshold: f64,
    #[serde(default)]
    pub class_mapping: HashMap<String, String>,
    #[serde(default)]
    pub validation_samples: HashMap<String, ValidationSample>,
}

impl CalibrationInfo {
    /// Incomplete statistics make the whole analyzer unusable.
    fn validate(&mut self) -> anyhow::Result<()> {
        if self.feature_names.is_empty() || self.num_features == 0 {
            anyhow::bail!("calibration missing feature names or count");
        }
        if self.feature_stats.means.len() < self.num_features
            || self.feature_stats.stds.len() < self.num_features
        {
            anyhow::bail!("calibration feature statistics incomplete");
        }
        if self.sigmoid_params.a == 0.0 {
            warn!("sigmoid parameter a is 0, substituting 1.0");
            self.sigmoid_params.a = 1.0;
        }
        if self.optimal_threshold <= 0.0 || self.optimal_threshold >= 1.0 {
            warn!(
                "optimal threshold {:.4} out of (0,1), substituting 0.5",
                self.optimal_threshold
            );
            self.optimal_threshold = 0.5;
        }
        Ok(())
    }

    fn sigmoid(&self, raw: f64) -> f64 {
        let SigmoidParams { a, b } = self.sigmoid_params;
        1.0 / (1.0 + (-a * (raw - b)).exp())
    }

    /// Clamp to 1.5x the training range, then standardize.
    fn normalize(&self, mut value: f64, idx: usize) -> f64 {
        let stats = &self.feature_stats;
        if stats.means.len() <= idx || stats.stds.len() <= idx {
            return value;
        }
        if stats.mins.len() > idx && stats.maxs.len() > idx {
            let (min, max) = (stats.mins[idx], stats.maxs[idx]);
            let slack = 0.5 * (max - min);
            value = value.clamp(min - slack, max + slack);
        }
        let std = stats.stds[idx];
        if std > 0.0 {
            (value - stats.means[idx]) / std
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Kernel {
    Linear,
    Polynomial { degree: f64, gamma: f64, coef0: f64 },
    Rbf { gamma: f64 },
    Sigmoid { gamma: f64, coef0: f64 },
}

/// A parsed binary-classification libsvm model.
#[derive(Debug)]
pub struct SvmModel {
    kernel: Kernel,
    rho: f64,
    coefficients: Vec<f64>,
    support_vectors: Vec<Vec<f64>>,
}

impl SvmModel {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let mut kernel_type = String::new();
        let mut gamma = 0.0;
        let mut coef0 = 0.0;
        let mut degree = 3.0;
        let mut rho = 0.0;
        let mut nr_class = 2usize;
        let mut lines = text.lines();

        for line in lines.by_ref() {
            let line = line.trim();
            if line == "SV" {
                break;
            }
            let mut parts = line.split_whitespace();
            let key = parts.next().unwrap_or("");
            match key {
                "kernel_type" => kernel_type = parts.next().unwrap_or("").to_string(),
                "gamma" => gamma = parts.next().and_then(|v| v.parse().ok()).unwrap_or(0.0),
                "coef0" => coef0 = parts.next().and_then(|v| v.parse().ok()).unwrap_or(0.0),
                "degree" => degree = parts.next().and_then(|v| v.parse().ok()).unwrap_or(3.0),
                "rho" => rho = parts.next().and_then(|v| v.parse().ok()).unwrap_or(0.0),
                "nr_class" => {
                    nr_class = parts.next().and_then(|v| v.parse().ok()).unwrap_or(2);
                }
                // svm_type, label, nr_sv, total_sv, probA/probB are not
                // needed to evaluate the binary decision function.
                _ => {}
            }
        }
        if nr_class != 2 {
            anyhow::bail!("expected a binary model, got {nr_class} classes");
        }

        let kernel = match kernel_type.as_str() {
            "linear" => Kernel::Linear,
            "polynomial" => Kernel::Polynomial { degree, gamma, coef0 },
            "rbf" => Kernel::Rbf { gamma },
            "sigmoid" => Kernel::Sigmoid { gamma, coef0 },
            other => anyhow::bail!("unsupported kernel type {other:?}"),
        };

        let mut coefficients = Vec::new();
        let mut sparse_svs: Vec<Vec<(usize, f64)>> = Vec::new();
        let mut max_index = 0usize;
        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let coef: f64 = parts
                .next()
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| anyhow::anyhow!("support vector line missing coefficient"))?;
            let mut sv = Vec::new();
            for pair in parts {
                let (idx, val) = pair
                    .split_once(':')
                    .ok_or_else(|| anyhow::anyhow!("malformed index:value pair {pair:?}"))?;
                let idx: usize = idx.parse()?;
                let val: f64 = val.parse()?;
                if idx == 0 {
                    anyhow::bail!("support vector indices are 1-based");
                }
                max_index = max_index.max(idx);
                sv.push((idx, val));
            }
            coefficients.push(coef);
            sparse_svs.push(sv);
        }
        if coefficients.is_empty() {
            anyhow::bail!("model contains no support vectors");
        }

        let support_vectors = sparse_svs
            .into_iter()
            .map(|sv| {
                let mut dense = vec![0.0; max_index];
                for (idx, val) in sv {
                    dense[idx - 1] = val;
                }
                dense
            })
            .collect();

        Ok(Self {
            kernel,
            rho,
            coefficients,
            support_vectors,
        })
    }

    /// Raw decision value for a dense feature vector (index 0 = feature 1).
    pub fn decision(&self, x: &[f64]) -> f64 {
        let mut sum = 0.0;
        for (coef, sv) in self.coefficients.iter().zip(&self.support_vectors) {
            sum += coef * self.kernel_value(sv, x);
        }
        sum - self.rho
    }

    fn kernel_value(&self, u: &[f64], v: &[f64]) -> f64 {
        match self.kernel {
            Kernel::Linear => dot(u, v),
            Kernel::Polynomial { degree, gamma, coef0 } => {
                (gamma * dot(u, v) + coef0).powf(degree)
            }
            Kernel::Rbf { gamma } => {
                let dim = u.len().max(v.len());
                let mut dist = 0.0;
                for i in 0..dim {
                    let a = u.get(i).copied().unwrap_or(0.0);
                    let b = v.get(i).copied().unwrap_or(0.0);
                    dist += (a - b) * (a - b);
                }
                (-gamma * dist).exp()
            }
            Kernel::Sigmoid { gamma, coef0 } => (gamma * dot(u, v) + coef0).tanh(),
        }
    }
}

fn dot(u: &[f64], v: &[f64]) -> f64 {
    u.iter().zip(v).map(|(a, b)| a * b).sum()
}

struct Inner {
    calibration: CalibrationInfo,
    model: SvmModel,
    bayes: BayesWordsAnalyzer,
    /// Negate raw decisions before the sigmoid.
    reversed: bool,
}

pub struct SvmProssesAnalyzer {
    inner: Option<Inner>,
}

impl SvmProssesAnalyzer {
    /// Load calibration and model, run startup validation. Any missing or
    /// inconsistent asset leaves the analyzer inactive.
    pub fn new(models_dir: &str) -> Self {
        let inner = Self::init(models_dir);
        if inner.is_none() {
            warn!("svm_prosses analyzer is inactive");
        }
        Self { inner }
    }

    fn init(models_dir: &str) -> Option<Inner> {
        let info_data = assets::load(INFO_ASSET, models_dir, INFO_FILE)?;
        let mut calibration: CalibrationInfo = match serde_json::from_slice(&info_data) {
            Ok(info) => info,
            Err(e) => {
                warn!("failed to parse SVM calibration info: {e}");
                return None;
            }
        };
        if let Err(e) = calibration.validate() {
            warn!("SVM calibration rejected: {e}");
            return None;
        }

        let model_data = assets::load(MODEL_ASSET, models_dir, MODEL_FILE)?;
        let model = match SvmModel::parse(&String::from_utf8_lossy(&model_data)) {
            Ok(model) => model,
            Err(e) => {
                warn!("failed to parse SVM model: {e}");
                return None;
            }
        };

        let bayes = BayesWordsAnalyzer::new(models_dir);
        let mut inner = Inner {
            calibration,
            model,
            bayes,
            reversed: false,
        };
        if !Self::validate_model(&mut inner) {
            return None;
        }
        Some(inner)
    }

    /// Re-predict every validation sample; on systematic disagreement flip
    /// the decision direction and check again. Returns false only when the
    /// model is wrong in both directions.
    fn validate_model(inner: &mut Inner) -> bool {
        if inner.calibration.validation_samples.is_empty() {
            warn!("no validation samples in calibration; skipping model validation");
            return true;
        }

        let (accuracy, direction_conflict) = Self::validation_accuracy(inner, false);
        if accuracy >= 0.5 && !direction_conflict {
            info!("SVM model validation passed (accuracy {:.2})", accuracy);
            return true;
        }

        warn!(
            "SVM model validation failed (accuracy {:.2}); reversing decision direction",
            accuracy
        );
        inner.reversed = true;
        let (corrected, _) = Self::validation_accuracy(inner, true);
        if corrected >= 0.5 {
            info!(
                "SVM decision direction reversed; corrected accuracy {:.2}",
                corrected
            );
            true
        } else {
            warn!(
                "SVM model inconsistent with validation samples even after reversal ({:.2})",
                corrected
            );
            false
        }
    }

    fn validation_accuracy(inner: &Inner, reversed: bool) -> (f64, bool) {
        // Sort by sample name so logs and outcomes are deterministic.
        let mut names: Vec<&String> = inner.calibration.validation_samples.keys().collect();
        names.sort();

        let mut correct = 0usize;
        let mut total = 0usize;
        let mut direction_conflict = false;
        for name in names {
            let sample = &inner.calibration.validation_samples[name];
            let mut raw = inner.model.decision(&sample.features);
            if reversed {
                raw = -raw;
            }
            let score = inner.calibration.sigmoid(raw);
            let predicted = if score >= inner.calibration.optimal_threshold {
                "webshell"
            } else {
                "normal"
            };
            total += 1;
            if predicted == sample.expected_class {
                correct += 1;
            } else {
                let expected_positive = sample.expected_class != "normal";
                if expected_positive != (raw >= 0.0) {
                    direction_conflict = true;
                }
                warn!(
                    "validation sample {name} mispredicted: expected={}, got={} (score {:.4}, raw {:.4})",
                    sample.expected_class, predicted, score, raw
                );
            }
        }

        if total == 0 {
            (1.0, false)
        } else {
            (correct as f64 / total as f64, direction_conflict)
        }
    }

    fn build_features(inner: &Inner, features: &FeatureSet) -> Option<Vec<f64>> {
        let stats = features.statistical.as_ref()?;
        let bayes_score = features
            .ast_words
            .as_deref()
            .filter(|words| !words.is_empty())
            .and_then(|words| inner.bayes.webshell_probability(words))
            .unwrap_or(DEFAULT_BAYES_SCORE);

        let raw = [
            stats.lm, stats.lvc, stats.wm, stats.wvc, stats.sr, stats.tr, stats.spl, stats.ie,
            bayes_score,
        ];
        Some(
            raw.iter()
                .enumerate()
                .map(|(i, &v)| inner.calibration.normalize(v, i))
                .collect(),
        )
    }
}

impl Analyzer for SvmProssesAnalyzer {
    fn name(&self) -> &'static str {
        "svm_prosses"
    }

    fn required_features(&self) -> &'static [FeatureKey] {
        &[FeatureKey::Statistical, FeatureKey::AstWords]
    }

    fn analyze(
        &self,
        _file: &FileInfo,
        _content: &[u8],
        features: &FeatureSet,
    ) -> anyhow::Result<Option<Finding>> {
        let inner = match &self.inner {
            Some(inner) => inner,
            None => return Ok(None),
        };
        let vector = match Self::build_features(inner, features) {
            Some(vector) => vector,
            None => return Ok(None),
        };

        let mut raw = inner.model.decision(&vector);
        if inner.reversed {
            raw = -raw;
        }
        let score = inner.calibration.sigmoid(raw);

        if score >= EMIT_THRESHOLD {
            return Ok(Some(Finding {
                analyzer: self.name().to_string(),
                description: format!(
                    "Fused statistical/Bayes features look malicious (score: {score:.4}, raw decision: {raw:.4})"
                ),
                risk: RiskLevel::High,
                confidence: score,
            }));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINEAR_MODEL: &str = "\
svm_type c_svc
kernel_type linear
nr_class 2
total_sv 2
rho 0
label 1 0
nr_sv 1 1
SV
1 1:1 2:0 3:0
-1 1:0 2:1 3:0
";

    fn calibration(samples: serde_json::Value) -> CalibrationInfo {
        let info = serde_json::json!({
            "feature_names": ["LM","LVC","WM","WVC","SR","TR","SPL","IE","BAYES"],
            "num_features": 9,
            "feature_stats": {
                "mins":  [0.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0],
                "maxs":  [10.0,10.0,10.0,10.0,10.0,10.0,10.0,10.0,1.0],
                "means": [5.0,5.0,5.0,5.0,5.0,5.0,5.0,5.0,0.5],
                "stds":  [2.0,2.0,2.0,2.0,2.0,2.0,2.0,2.0,0.25]
            },
            "sigmoid_params": {"a": 1.0, "b": 0.0},
            "optimal_threshold": 0.5,
            "class_mapping": {"0": "normal", "1": "webshell"},
            "validation_samples": samples
        });
        let mut info: CalibrationInfo = serde_json::from_value(info).unwrap();
        info.validate().unwrap();
        info
    }

    #[test]
    fn test_parse_linear_model() {
        let model = SvmModel::parse(LINEAR_MODEL).unwrap();
        // w = sv1 - sv2 = [1, -1, 0]; decision(x) = x1 - x2.
        assert!((model.decision(&[2.0, 0.5, 9.0]) - 1.5).abs() < 1e-12);
        assert!((model.decision(&[0.0, 3.0, 0.0]) + 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse_rbf_model() {
        let text = "\
svm_type c_svc
kernel_type rbf
gamma 0.5
nr_class 2
total_sv 1
rho 0.25
label 1 0
nr_sv 1 0
SV
2 1:1 2:1
";
        let model = SvmModel::parse(text).unwrap();
        // K(sv, sv) = 1, so decision at the SV itself is 2*1 - 0.25.
        assert!((model.decision(&[1.0, 1.0]) - 1.75).abs() < 1e-12);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(SvmModel::parse("not a model").is_err());
        assert!(SvmModel::parse("kernel_type warp\nSV\n1 1:0\n").is_err());
    }

    #[test]
    fn test_sigmoid_monotonic() {
        let cal = calibration(serde_json::json!({}));
        assert!(cal.sigmoid(-5.0) < cal.sigmoid(0.0));
        assert!(cal.sigmoid(0.0) < cal.sigmoid(5.0));
        assert!((cal.sigmoid(0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_clamps_and_standardizes() {
        let cal = calibration(serde_json::json!({}));
        // Mean 5, std 2: value 7 standardizes to 1.
        assert!((cal.normalize(7.0, 0) - 1.0).abs() < 1e-12);
        // Range [0,10] with 0.5 slack clamps 100 to 15 -> z = 5.
        assert!((cal.normalize(100.0, 0) - 5.0).abs() < 1e-12);
        assert!((cal.normalize(-100.0, 0) + 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_guard_substitutions() {
        let info = serde_json::json!({
            "feature_names": ["a"],
            "num_features": 1,
            "feature_stats": {"mins": [0.0], "maxs": [1.0], "means": [0.5], "stds": [0.1]},
            "sigmoid_params": {"a": 0.0, "b": 0.0},
            "optimal_threshold": 1.5,
            "class_mapping": {},
            "validation_samples": {}
        });
        let mut info: CalibrationInfo = serde_json::from_value(info).unwrap();
        info.validate().unwrap();
        assert_eq!(info.sigmoid_params.a, 1.0);
        assert_eq!(info.optimal_threshold, 0.5);
    }

    #[test]
    fn test_incomplete_stats_rejected() {
        let info = serde_json::json!({
            "feature_names": ["a", "b"],
            "num_features": 2,
            "feature_stats": {"mins": [], "maxs": [], "means": [0.5], "stds": [0.1]},
            "sigmoid_params": {"a": 1.0, "b": 0.0},
            "optimal_threshold": 0.5
        });
        let mut info: CalibrationInfo = serde_json::from_value(info).unwrap();
        assert!(info.validate().is_err());
    }

    fn inner_with(samples: serde_json::Value) -> Inner {
        Inner {
            calibration: calibration(samples),
            model: SvmModel::parse(LINEAR_MODEL).unwrap(),
            bayes: BayesWordsAnalyzer::new("data/models"),
            reversed: false,
        }
    }

    #[test]
    fn test_validation_passes_consistent_samples() {
        // decision(x) = x1 - x2; positive -> webshell under sigmoid(b=0).
        let mut inner = inner_with(serde_json::json!({
            "shell": {"features": [3.0, 0.0, 0.0], "raw_decision": 3.0,
                      "sigmoid_score": 0.95, "expected_class": "webshell"},
            "clean": {"features": [0.0, 3.0, 0.0], "raw_decision": -3.0,
                      "sigmoid_score": 0.05, "expected_class": "normal"}
        }));
        assert!(SvmProssesAnalyzer::validate_model(&mut inner));
        assert!(!inner.reversed);
    }

    #[test]
    fn test_validation_reverses_flipped_model() {
        // Expectations are inverted relative to the decision function.
        let mut inner = inner_with(serde_json::json!({
            "shell": {"features": [0.0, 3.0, 0.0], "raw_decision": 3.0,
                      "sigmoid_score": 0.95, "expected_class": "webshell"},
            "clean": {"features": [3.0, 0.0, 0.0], "raw_decision": -3.0,
                      "sigmoid_score": 0.05, "expected_class": "normal"}
        }));
        assert!(SvmProssesAnalyzer::validate_model(&mut inner));
        assert!(inner.reversed);
    }

    #[test]
    fn test_embedded_assets_initialize_active() {
        let analyzer = SvmProssesAnalyzer::new("data/models");
        let inner = analyzer.inner.as_ref().expect("embedded model should load");
        assert!(!inner.reversed, "embedded validation samples must agree");
    }

    #[test]
    fn test_default_bayes_score_when_words_missing() {
        let inner = inner_with(serde_json::json!({}));
        let fs = FeatureSet {
            statistical: Some(crate::features::StatFeatures {
                lm: 5.0, lvc: 5.0, wm: 5.0, wvc: 5.0,
                sr: 5.0, tr: 5.0, spl: 5.0, ie: 5.0,
            }),
            ast_words: Some(vec![]),
            ..Default::default()
        };
        let vector = SvmProssesAnalyzer::build_features(&inner, &fs).unwrap();
        // Bayes defaults to 0.5 -> standardized (0.5-0.5)/0.25 = 0.
        assert!((vector[8] - 0.0).abs() < 1e-12);
    }
}
