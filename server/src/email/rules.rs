use std::path::{Path, PathBuf};

use crate::prompt::extractor::ExtractorKind;

/// Optional per-extractor instruction files. A missing or empty file simply
/// means the extractor runs without user customization.
#[derive(Debug, Clone)]
pub struct ExtractionRules {
    dir: PathBuf,
}

impl ExtractionRules {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        ExtractionRules {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, kind: ExtractorKind) -> Option<String> {
        let path = self.dir.join(kind.rules_file());
        match std::fs::read_to_string(&path) {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(_) => {
                tracing::debug!("No rules file at {}", path.display());
                None
            }
        }
    }
}
