//! Statistical features computed from raw file bytes.
//!
//! Eight scalars describing line shape, alphanumeric run shape, symbol
//! density, tag density, statement density, and byte entropy. All values
//! are rounded to six decimals; zero-sample and zero-mean cases yield 0 so
//! every result is finite.

use once_cell::sync::Lazy;
use regex::bytes::Regex;

/// A `<…>` span, shortest match, over arbitrary bytes.
static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s-u)<.*?>").expect("tag regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatFeatures {
    /// Maximum line length in bytes.
    pub lm: f64,
    /// Coefficient of variation of per-line lengths.
    pub lvc: f64,
    /// Maximum alphanumeric run length.
    pub wm: f64,
    /// Coefficient of variation of run lengths, times 100.
    pub wvc: f64,
    /// Percentage of non-alphanumeric bytes.
    pub sr: f64,
    /// `<…>` matches per 100 alphanumeric runs.
    pub tr: f64,
    /// Semicolons per line.
    pub spl: f64,
    /// Shannon entropy over bytes, newline excluded.
    pub ie: f64,
}

/// Compute all eight features. Callers skip empty content.
pub fn compute(content: &[u8]) -> StatFeatures {
    let line_lengths = line_lengths(content);
    let run_lengths = alnum_run_lengths(content);

    StatFeatures {
        lm: round6(max(&line_lengths)),
        lvc: round6(variation_coefficient(&line_lengths)),
        wm: round6(max(&run_lengths)),
        wvc: round6(variation_coefficient(&run_lengths) * 100.0),
        sr: round6(symbol_ratio(content)),
        tr: round6(tag_ratio(content, run_lengths.len())),
        spl: round6(statements_per_line(content, line_lengths.len())),
        ie: round6(entropy(content)),
    }
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

fn line_lengths(content: &[u8]) -> Vec<f64> {
    content.split(|&b| b == b'\n').map(|l| l.len() as f64).collect()
}

fn is_alnum(b: u8) -> bool {
    b.is_ascii_alphanumeric()
}

fn alnum_run_lengths(content: &[u8]) -> Vec<f64> {
    let mut runs = Vec::new();
    let mut len = 0usize;
    for &b in content {
        if is_alnum(b) {
            len += 1;
        } else if len != 0 {
            runs.push(len as f64);
            len = 0;
        }
    }
    if len != 0 {
        runs.push(len as f64);
    }
    runs
}

fn max(samples: &[f64]) -> f64 {
    samples.iter().copied().fold(0.0, f64::max)
}

fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Sample standard deviation over mean; 0 for degenerate inputs.
fn variation_coefficient(samples: &[f64]) -> f64 {
    if samples.len() <= 1 {
        return 0.0;
    }
    let m = mean(samples);
    if m == 0.0 {
        return 0.0;
    }
    let var = samples.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / (samples.len() - 1) as f64;
    var.sqrt() / m
}

fn symbol_ratio(content: &[u8]) -> f64 {
    if content.is_empty() {
        return 0.0;
    }
    let symbols = content.iter().filter(|&&b| !is_alnum(b)).count();
    symbols as f64 / content.len() as f64 * 100.0
}

fn tag_ratio(content: &[u8], run_count: usize) -> f64 {
    if run_count == 0 {
        return 0.0;
    }
    let tags = TAG_RE.find_iter(content).count();
    tags as f64 / run_count as f64 * 100.0
}

fn statements_per_line(content: &[u8], line_count: usize) -> f64 {
    if line_count == 0 {
        return 0.0;
    }
    let statements = content.iter().filter(|&&b| b == b';').count();
    statements as f64 / line_count as f64
}

/// Shannon entropy (base 2) over byte values, ignoring newlines.
fn entropy(content: &[u8]) -> f64 {
    let mut frequencies = [0u64; 256];
    let mut total = 0u64;
    for &b in content {
        if b != b'\n' {
            frequencies[b as usize] += 1;
            total += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }

    let mut entropy = 0.0;
    for &count in &frequencies {
        if count > 0 {
            let p = count as f64 / total as f64;
            entropy -= p * p.log2();
        }
    }
    entropy
}
