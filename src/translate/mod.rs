//! Translation pipeline: keystrokes -> normalize -> debounce -> cache/remote -> session state.

pub mod cache;
pub mod debounce;
pub mod normalize;
pub mod session;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub use cache::RequestCache;
pub use normalize::normalize_text;
pub use session::{SessionSnapshot, TranslationSession};

/// One debounce cycle's worth of intent. `text` is already normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationRequest {
    pub text: String,
    pub source_language: Option<String>,
    pub target_language: String,
    pub save_to_history: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub translated_text: String,
    /// Source language as reported by the service, if it reported one.
    pub detected_source_language: Option<String>,
}

/// Failure shape handed to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl From<&ApiError> for TranslationError {
    fn from(err: &ApiError) -> Self {
        Self {
            message: err.to_string(),
            code: err.code(),
        }
    }
}

impl std::fmt::Display for TranslationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({code})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}
