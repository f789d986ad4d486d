//! phpshield - static PHP webshell scanner.
//!
//! A persistent external parser turns PHP sources into trees; statistical
//! and tree-derived features feed five analyzers (regex, YARA, statistical
//! thresholds, naive Bayes over words, SVM fusion) whose findings a fixed
//! scoring rubric fuses into a five-level risk verdict per file.
//!
//! The binary in main.rs drives this library from the command line.

pub mod analyzers;
pub mod assets;
pub mod bridge;
pub mod config;
pub mod engine;
pub mod features;
pub mod report;
pub mod scoring;
pub mod tree;
pub mod types;

pub use config::Config;
pub use engine::{Engine, Task};
pub use types::{Finding, RiskLevel, ScanResult};
