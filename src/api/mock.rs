//! Scriptable in-process backend for unit tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

use super::{
    FlashcardsRequest, FlashcardsResponse, HistoryPage, Pagination, TranslateBody,
    TranslateResponse, TranslationApi,
};
use crate::error::{ApiError, ApiResult};
use crate::flashcards::Flashcard;
use crate::history::HistoryEntry;

#[derive(Default)]
pub(crate) struct MockApi {
    pub translate_calls: Mutex<Vec<TranslateBody>>,
    translate_delays: Mutex<HashMap<String, Duration>>,
    translate_failures: Mutex<HashMap<String, ApiError>>,
    translate_source: Mutex<Option<String>>,

    pub history_calls: Mutex<Vec<u32>>,
    history_pages: Mutex<HashMap<u32, (Duration, ApiResult<HistoryPage>)>>,

    pub update_calls: Mutex<Vec<(i64, String)>>,
    update_result: Mutex<Option<ApiResult<HistoryEntry>>>,

    pub delete_calls: Mutex<Vec<i64>>,
    delete_error: Mutex<Option<ApiError>>,

    pub flashcard_calls: Mutex<Vec<FlashcardsRequest>>,
    flashcard_result: Mutex<Option<ApiResult<Vec<Flashcard>>>>,
    flashcard_delay: Mutex<Duration>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translate_count(&self) -> usize {
        self.translate_calls.lock().len()
    }

    pub fn delay_translation(&self, text: &str, delay: Duration) {
        self.translate_delays.lock().insert(text.to_string(), delay);
    }

    pub fn fail_translation(&self, text: &str, err: ApiError) {
        self.translate_failures.lock().insert(text.to_string(), err);
    }

    pub fn report_source_language(&self, lang: &str) {
        *self.translate_source.lock() = Some(lang.to_string());
    }

    pub fn set_page(&self, page: u32, result: ApiResult<HistoryPage>) {
        self.history_pages
            .lock()
            .insert(page, (Duration::ZERO, result));
    }

    pub fn set_page_delayed(&self, page: u32, delay: Duration, result: ApiResult<HistoryPage>) {
        self.history_pages.lock().insert(page, (delay, result));
    }

    pub fn set_update_result(&self, result: ApiResult<HistoryEntry>) {
        *self.update_result.lock() = Some(result);
    }

    pub fn fail_deletes(&self, err: ApiError) {
        *self.delete_error.lock() = Some(err);
    }

    pub fn set_flashcards(&self, result: ApiResult<Vec<Flashcard>>) {
        *self.flashcard_result.lock() = Some(result);
    }

    pub fn delay_flashcards(&self, delay: Duration) {
        *self.flashcard_delay.lock() = delay;
    }
}

/// Deterministic translation used when no failure is scripted.
pub(crate) fn fake_translation(text: &str, target: &str) -> String {
    format!("{target}:{text}")
}

pub(crate) fn entry(id: i64, input: &str, output: &str) -> HistoryEntry {
    HistoryEntry {
        id,
        source_language: "en".into(),
        target_language: "es".into(),
        input_text: input.into(),
        output_text: output.into(),
        timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        was_cached: false,
        is_loading_placeholder: false,
    }
}

pub(crate) fn page(entries: Vec<HistoryEntry>, current: u32, total_pages: u32) -> HistoryPage {
    HistoryPage {
        pagination: Pagination {
            current_page: current,
            total_pages,
            total_items: (total_pages as u64) * 10,
            items_per_page: 10,
        },
        translations: entries,
    }
}

pub(crate) fn card(id: i64, source: &str, translated: &str) -> Flashcard {
    Flashcard {
        id,
        source_text: source.into(),
        translated_text: translated.into(),
        source_language: "en".into(),
        target_language: "es".into(),
    }
}

#[async_trait]
impl TranslationApi for MockApi {
    async fn translate(&self, body: &TranslateBody) -> ApiResult<TranslateResponse> {
        self.translate_calls.lock().push(body.clone());
        let delay = self.translate_delays.lock().get(&body.text).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.translate_failures.lock().get(&body.text).cloned() {
            return Err(err);
        }
        Ok(TranslateResponse {
            translated_text: fake_translation(&body.text, &body.target_language),
            translated_texts: None,
            source_language: self.translate_source.lock().clone(),
        })
    }

    async fn history_page(&self, page: u32, limit: u32) -> ApiResult<HistoryPage> {
        let _ = limit;
        self.history_calls.lock().push(page);
        let scripted = self.history_pages.lock().get(&page).cloned();
        match scripted {
            Some((delay, result)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                result
            }
            None => Ok(self::page(Vec::new(), page, page)),
        }
    }

    async fn update_translation(&self, id: i64, output_text: &str) -> ApiResult<HistoryEntry> {
        self.update_calls.lock().push((id, output_text.to_string()));
        match self.update_result.lock().clone() {
            Some(result) => result,
            None => Ok(entry(id, "", output_text)),
        }
    }

    async fn delete_translation(&self, id: i64) -> ApiResult<()> {
        self.delete_calls.lock().push(id);
        match self.delete_error.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn flashcards(&self, request: &FlashcardsRequest) -> ApiResult<FlashcardsResponse> {
        self.flashcard_calls.lock().push(request.clone());
        let delay = *self.flashcard_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let cards = self
            .flashcard_result
            .lock()
            .clone()
            .unwrap_or_else(|| Ok(Vec::new()))?;
        Ok(FlashcardsResponse {
            count: cards.len(),
            flashcards: cards,
            source_language: Some(request.source_lang.clone()),
            target_language: Some(request.target_lang.clone()),
            requested_limit: Some(request.limit),
        })
    }
}
