//! Source/target language pair shared by translation and the flashcard drill.

use serde::{Deserialize, Serialize};

/// Active source/target language codes (ISO 639-1).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl LanguagePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn swap(&mut self) {
        std::mem::swap(&mut self.source, &mut self.target);
    }

    pub fn swapped(&self) -> Self {
        Self::new(self.target.clone(), self.source.clone())
    }
}

impl Default for LanguagePair {
    fn default() -> Self {
        Self::new("en", "es")
    }
}

impl std::fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}
