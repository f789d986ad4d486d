//! YAML-based configuration.
//!
//! Lookup order is embedded `config.yaml`, then the path given on the
//! command line, then built-in defaults. A missing or unreadable file is
//! never fatal.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::assets;

const DEFAULT_CONCURRENCY: usize = 8;
const DEFAULT_PARSER_COMMAND: &str = "php-ast-export";
const DEFAULT_PARSER_TIMEOUT_SECS: u64 = 60;

const ALL_ANALYZERS: &[&str] = &["regex", "yara", "statistical", "bayes_words", "svm_prosses"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data_paths: DataPaths,
    #[serde(default)]
    pub performance: Performance,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default = "default_analyzers")]
    pub enabled_analyzers: Vec<String>,
}

/// Filesystem fallback locations for assets that are normally embedded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    #[serde(default = "default_models_dir")]
    pub models: String,
    #[serde(default = "default_signatures_dir")]
    pub signatures: String,
    #[serde(default = "default_config_dir")]
    pub config: String,
    #[serde(default = "default_rules_dir")]
    pub rules: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Performance {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    #[serde(default = "default_format")]
    pub format: String,
}

/// External PHP parser subprocess settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    #[serde(default = "default_parser_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_parser_timeout")]
    pub timeout_secs: u64,
}

fn default_models_dir() -> String { "data/models".to_string() }
fn default_signatures_dir() -> String { "data/signatures".to_string() }
fn default_config_dir() -> String { "data/config".to_string() }
fn default_rules_dir() -> String { "data/rules".to_string() }
fn default_concurrency() -> usize { DEFAULT_CONCURRENCY }
fn default_format() -> String { "console".to_string() }
fn default_parser_command() -> String { DEFAULT_PARSER_COMMAND.to_string() }
fn default_parser_timeout() -> u64 { DEFAULT_PARSER_TIMEOUT_SECS }

fn default_analyzers() -> Vec<String> {
    ALL_ANALYZERS.iter().map(|s| s.to_string()).collect()
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            models: default_models_dir(),
            signatures: default_signatures_dir(),
            config: default_config_dir(),
            rules: default_rules_dir(),
        }
    }
}

impl Default for Performance {
    fn default() -> Self {
        Self { concurrency: DEFAULT_CONCURRENCY }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self { format: default_format() }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            command: default_parser_command(),
            args: Vec::new(),
            timeout_secs: DEFAULT_PARSER_TIMEOUT_SECS,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_paths: DataPaths::default(),
            performance: Performance::default(),
            output: Output::default(),
            parser: ParserConfig::default(),
            enabled_analyzers: default_analyzers(),
        }
    }
}

impl Config {
    /// Load configuration, preferring the embedded copy over the disk path.
    pub fn load(path: &Path) -> Self {
        let data = match assets::embedded("config.yaml") {
            Some(bytes) => bytes.to_vec(),
            None => match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("config file {} unavailable ({}), using defaults", path.display(), e);
                    return Self::default();
                }
            },
        };

        match serde_yaml::from_slice(&data) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("failed to parse config ({}), using defaults", e);
                Self::default()
            }
        }
    }
}
