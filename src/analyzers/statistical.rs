//! Threshold checks over the statistical feature vector.
//!
//! A NaN bound means "no bound" for that side. A finding is produced only
//! when the vector is abnormal and the tree showed executable structure.

use super::Analyzer;
use crate::features::{FeatureKey, FeatureSet, StatFeatures};
use crate::types::{FileInfo, Finding, RiskLevel};

#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub min: StatFeatures,
    pub max: StatFeatures,
}

impl Default for Thresholds {
    fn default() -> Self {
        let nan = f64::NAN;
        Self {
            min: StatFeatures {
                lm: nan,
                lvc: 0.1,
                wm: nan,
                wvc: nan,
                sr: 10.0,
                tr: nan,
                spl: 0.001,
                ie: nan,
            },
            max: StatFeatures {
                lm: 2048.0,
                lvc: nan,
                wm: 1024.0,
                wvc: nan,
                sr: nan,
                tr: nan,
                spl: nan,
                ie: nan,
            },
        }
    }
}

pub struct StatisticalAnalyzer {
    thresholds: Thresholds,
}

impl StatisticalAnalyzer {
    pub fn new() -> Self {
        Self {
            thresholds: Thresholds::default(),
        }
    }
}

impl Default for StatisticalAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for StatisticalAnalyzer {
    fn name(&self) -> &'static str {
        "statistical"
    }

    fn required_features(&self) -> &'static [FeatureKey] {
        &[FeatureKey::Statistical, FeatureKey::Callable]
    }

    fn analyze(
        &self,
        _file: &FileInfo,
        _content: &[u8],
        features: &FeatureSet,
    ) -> anyhow::Result<Option<Finding>> {
        let stats = match &features.statistical {
            Some(stats) => stats,
            None => return Ok(None),
        };

        if is_abnormal(stats, &self.thresholds) && features.callable {
            let description = format!(
                "Abnormal statistical profile with executable structure (LM:{:.0}, LVC:{:.4}, WM:{:.0}, WVC:{:.2}, SR:{:.2}, IE:{:.4})",
                stats.lm, stats.lvc, stats.wm, stats.wvc, stats.sr, stats.ie
            );
            return Ok(Some(Finding {
                analyzer: self.name().to_string(),
                description,
                risk: RiskLevel::Medium,
                confidence: 0.7,
            }));
        }
        Ok(None)
    }
}

/// True when any feature lies strictly outside its `[min, max]` bounds.
pub fn is_abnormal(sf: &StatFeatures, thresholds: &Thresholds) -> bool {
    let (min, max) = (&thresholds.min, &thresholds.max);
    out_of_range(sf.lm, min.lm, max.lm)
        || out_of_range(sf.lvc, min.lvc, max.lvc)
        || out_of_range(sf.wm, min.wm, max.wm)
        || out_of_range(sf.wvc, min.wvc, max.wvc)
        || out_of_range(sf.sr, min.sr, max.sr)
        || out_of_range(sf.tr, min.tr, max.tr)
        || out_of_range(sf.spl, min.spl, max.spl)
        || out_of_range(sf.ie, min.ie, max.ie)
}

fn out_of_range(x: f64, min: f64, max: f64) -> bool {
    if !min.is_nan() && x < min {
        return true;
    }
    if !max.is_nan() && x > max {
        return true;
    }
    false
}
