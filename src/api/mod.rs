//! Remote service contract: translate, paginated history, history edits and the
//! flashcard deck endpoint. Transport lives in `http`; everything above this module
//! only sees `TranslationApi`.

pub mod http;
#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::flashcards::Flashcard;
use crate::history::HistoryEntry;

pub use http::{AuthSession, HttpApiClient};

/// Body of `POST /translate`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslateBody {
    pub text: String,
    pub target_language: String,
    pub save_to_db: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TranslateResponse {
    pub translated_text: String,
    /// Synonyms, when the service has more than one rendering.
    #[serde(default)]
    pub translated_texts: Option<Vec<String>>,
    #[serde(default)]
    pub source_language: Option<String>,
}

impl TranslateResponse {
    /// Synonyms joined by ", " when present and non-empty, else `translated_text`.
    pub fn display_text(&self) -> String {
        match &self.translated_texts {
            Some(texts) if !texts.is_empty() => texts.join(", "),
            _ => self.translated_text.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub items_per_page: u32,
}

/// Body of `GET /translations/history`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryPage {
    pub translations: Vec<HistoryEntry>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlashcardsRequest {
    pub source_lang: String,
    pub target_lang: String,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FlashcardsResponse {
    pub flashcards: Vec<Flashcard>,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub source_language: Option<String>,
    #[serde(default)]
    pub target_language: Option<String>,
    #[serde(default)]
    pub requested_limit: Option<u32>,
}

/// Backend adapter. Authentication and token refresh happen behind this trait;
/// callers only see success or a typed `ApiError`.
#[async_trait]
pub trait TranslationApi: Send + Sync {
    async fn translate(&self, body: &TranslateBody) -> ApiResult<TranslateResponse>;

    async fn history_page(&self, page: u32, limit: u32) -> ApiResult<HistoryPage>;

    /// Persist an edited output text. Returns the canonical stored entry.
    async fn update_translation(&self, id: i64, output_text: &str) -> ApiResult<HistoryEntry>;

    async fn delete_translation(&self, id: i64) -> ApiResult<()>;

    async fn flashcards(&self, request: &FlashcardsRequest) -> ApiResult<FlashcardsResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> TranslateResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn synonyms_are_joined() {
        let r = response(r#"{"translated_text":"hola","translated_texts":["hola","buenas"]}"#);
        assert_eq!(r.display_text(), "hola, buenas");
    }

    #[test]
    fn empty_synonym_list_falls_back() {
        let r = response(r#"{"translated_text":"hola","translated_texts":[]}"#);
        assert_eq!(r.display_text(), "hola");
        let r = response(r#"{"translated_text":"hola"}"#);
        assert_eq!(r.display_text(), "hola");
        assert_eq!(r.source_language, None);
    }

    #[test]
    fn translate_body_omits_missing_source() {
        let body = TranslateBody {
            text: "hello".into(),
            target_language: "es".into(),
            save_to_db: true,
            source_language: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"text": "hello", "target_language": "es", "save_to_db": true})
        );
    }
}
