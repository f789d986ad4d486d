//! Assets compiled into the binary, with a filesystem fallback.
//!
//! Models, signatures, and the default configuration ship inside the
//! executable so a bare binary scans out of the box. Deployments that want
//! to override an asset drop a file under the configured data directory.

use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_YAML: &[u8] = include_bytes!("../config.yaml");
const SVM_MODEL_INFO: &[u8] = include_bytes!("../data/models/ProcessSVM.model.info");
const SVM_MODEL: &[u8] = include_bytes!("../data/models/ProcessSVM.model.model");
const WORDS_MODEL: &[u8] = include_bytes!("../data/models/Words.model");
const WEBSHELL_RULES: &[u8] = include_bytes!("../data/signatures/Webshells_rules.yar");

/// Look up an embedded asset by its canonical path.
pub fn embedded(path: &str) -> Option<&'static [u8]> {
    match path {
        "config.yaml" => Some(CONFIG_YAML),
        "data/models/ProcessSVM.model.info" => Some(SVM_MODEL_INFO),
        "data/models/ProcessSVM.model.model" => Some(SVM_MODEL),
        "data/models/Words.model" => Some(WORDS_MODEL),
        "data/signatures/Webshells_rules.yar" => Some(WEBSHELL_RULES),
        _ => None,
    }
}

/// Fetch an asset: embedded copy first, then `fallback_dir/file_name`.
pub fn load(embedded_path: &str, fallback_dir: &str, file_name: &str) -> Option<Vec<u8>> {
    if let Some(bytes) = embedded(embedded_path) {
        return Some(bytes.to_vec());
    }
    let disk_path: PathBuf = Path::new(fallback_dir).join(file_name);
    match std::fs::read(&disk_path) {
        Ok(bytes) => {
            debug!("loaded asset from disk: {}", disk_path.display());
            Some(bytes)
        }
        Err(_) => None,
    }
}
