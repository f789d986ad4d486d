//! Report rendering.
//!
//! Reporters consume the full result list; ordering between files is up to
//! each reporter. The output path's extension picks the reporter, falling
//! back to the configured format.

pub mod console;
pub mod html;
pub mod json;

use std::path::Path;

use crate::types::ScanResult;

pub use console::ConsoleReporter;
pub use html::HtmlReporter;
pub use json::JsonReporter;

pub trait Reporter {
    fn generate(&self, results: &[ScanResult], output: Option<&Path>) -> anyhow::Result<()>;
}

/// Pick a reporter: `.html` and `.json` extensions win, then the format
/// string, then console.
pub fn select(format: &str, output: Option<&Path>) -> Box<dyn Reporter> {
    if let Some(path) = output {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("html") => return Box::new(HtmlReporter),
            Some("json") => return Box::new(JsonReporter),
            _ => {}
        }
    }
    match format.to_lowercase().as_str() {
        "json" => Box::new(JsonReporter),
        "html" => Box::new(HtmlReporter),
        _ => Box::new(ConsoleReporter),
    }
}
