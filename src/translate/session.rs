//! Translation session: the state one input box shows (raw text, translated text,
//! loading, error, detected language) plus the debounced `translate` entry point.
//!
//! Every keystroke goes through `translate`. Blank input clears the output right away.
//! Anything else re-arms the debouncer; when it settles the request claims a sequence
//! number, checks the cache, calls the service on a miss and applies the result only
//! if no newer request was issued and the session is still alive.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::debounce::{Debouncer, DispatchKey, StalenessGate};
use super::{normalize_text, RequestCache, TranslationError, TranslationRequest, TranslationResult};
use crate::api::{TranslateBody, TranslationApi};
use crate::error::ApiError;
use crate::history::{HistoryEntry, HistoryLedger, LocalIdAllocator, NewTranslation};

/// Language recorded for a translation whose source was neither declared nor reported.
const UNKNOWN_SOURCE: &str = "auto";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// Raw input as last typed.
    pub text: String,
    pub translated_text: String,
    pub is_loading: bool,
    pub error: Option<TranslationError>,
    pub detected_source_language: Option<String>,
    /// Loading row for the history view while a translation is pending.
    pub pending: Option<HistoryEntry>,
}

pub struct TranslationSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    api: Arc<dyn TranslationApi>,
    cache: Arc<RequestCache>,
    ledger: Option<Arc<HistoryLedger>>,
    ids: Arc<LocalIdAllocator>,
    debouncer: Debouncer,
    gate: StalenessGate,
    state: Mutex<SessionSnapshot>,
    state_tx: watch::Sender<SessionSnapshot>,
}

impl TranslationSession {
    /// Successful translations made with `save_to_history` are appended to `ledger`
    /// when one is given.
    pub fn new(
        api: Arc<dyn TranslationApi>,
        cache: Arc<RequestCache>,
        debounce: Duration,
        ledger: Option<Arc<HistoryLedger>>,
    ) -> Self {
        let ids = ledger
            .as_ref()
            .map(|l| l.id_allocator())
            .unwrap_or_else(|| Arc::new(LocalIdAllocator::new()));
        let (state_tx, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(SessionInner {
                api,
                cache,
                ledger,
                ids,
                debouncer: Debouncer::new(debounce),
                gate: StalenessGate::new(),
                state: Mutex::new(SessionSnapshot::default()),
                state_tx,
            }),
        }
    }

    pub fn translate(
        &self,
        text: &str,
        source_language: Option<&str>,
        target_language: &str,
        save_to_history: bool,
    ) {
        let inner = &self.inner;
        if inner.debouncer.is_torn_down() {
            debug!("translate after teardown ignored");
            return;
        }

        let normalized = normalize_text(text);
        if normalized.is_empty() {
            inner.debouncer.cancel();
            inner.gate.reset();
            inner.update(|s| {
                s.text = text.to_string();
                s.translated_text.clear();
                s.detected_source_language = None;
                s.is_loading = false;
                s.error = None;
                s.pending = None;
            });
            return;
        }

        let request = TranslationRequest {
            text: normalized,
            source_language: source_language.map(str::to_string),
            target_language: target_language.to_string(),
            save_to_history,
        };

        inner.update(|s| {
            s.text = text.to_string();
            let id = match &s.pending {
                Some(p) => p.id,
                None => inner.ids.next_id(),
            };
            s.pending = Some(HistoryEntry::loading_placeholder(
                id,
                source_language.unwrap_or(UNKNOWN_SOURCE),
                target_language,
                request.text.as_str(),
            ));
        });

        let task_inner = Arc::clone(inner);
        inner
            .debouncer
            .schedule(move || task_inner.dispatch(request));
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.lock().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state_tx.subscribe()
    }

    pub fn text(&self) -> String {
        self.inner.state.lock().text.clone()
    }

    pub fn translated_text(&self) -> String {
        self.inner.state.lock().translated_text.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().is_loading
    }

    pub fn error(&self) -> Option<TranslationError> {
        self.inner.state.lock().error.clone()
    }

    pub fn detected_source_language(&self) -> Option<String> {
        self.inner.state.lock().detected_source_language.clone()
    }

    pub fn pending(&self) -> Option<HistoryEntry> {
        self.inner.state.lock().pending.clone()
    }

    pub fn cache(&self) -> &Arc<RequestCache> {
        &self.inner.cache
    }

    /// Cancel the pending debounce and freeze the visible state. Requests already in
    /// flight finish but are not applied.
    pub fn teardown(&self) {
        self.inner.debouncer.teardown();
        info!("translation session torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.debouncer.is_torn_down()
    }
}

impl Drop for TranslationSession {
    fn drop(&mut self) {
        self.inner.debouncer.teardown();
    }
}

impl SessionInner {
    async fn dispatch(self: Arc<Self>, request: TranslationRequest) {
        if self.debouncer.is_torn_down() {
            return;
        }
        let key = DispatchKey {
            text: request.text.clone(),
            target_language: request.target_language.clone(),
        };
        let Some(seq) = self.gate.begin(key) else {
            // Same request as the last dispatch: its result is already shown, or will
            // clear the placeholder itself when it lands.
            self.update(|s| {
                if !s.is_loading && placeholder_for(s, &request) {
                    s.pending = None;
                }
            });
            return;
        };

        let request_id = Uuid::new_v4();
        self.update(|s| {
            s.is_loading = true;
            s.error = None;
        });
        info!(%request_id, seq, target = %request.target_language, "translate_dispatch");

        let outcome = self.resolve(&request, request_id).await;

        let applied = {
            let mut state = self.state.lock();
            if self.debouncer.is_torn_down() {
                debug!(%request_id, seq, "session torn down, result dropped");
                return;
            }
            if !self.gate.is_current(seq) {
                debug!(%request_id, seq, latest = self.gate.current(), "dropping stale translation");
                return;
            }

            state.is_loading = false;
            if placeholder_for(&state, &request) {
                state.pending = None;
            }
            let applied = match outcome {
                Ok(result) => {
                    let detected = request
                        .source_language
                        .clone()
                        .or(result.detected_source_language);
                    state.translated_text = result.translated_text;
                    state.detected_source_language = detected.clone();
                    state.error = None;
                    Some((state.translated_text.clone(), detected))
                }
                Err(err) => {
                    warn!(%request_id, seq, error = %err, "translation failed");
                    state.translated_text.clear();
                    state.detected_source_language = None;
                    state.error = Some(TranslationError::from(&err));
                    None
                }
            };
            self.publish(&state);
            applied
        };

        if let (Some((output_text, detected)), Some(ledger)) = (applied, &self.ledger) {
            if request.save_to_history {
                ledger.add_translation(NewTranslation {
                    source_language: detected.unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
                    target_language: request.target_language,
                    input_text: request.text,
                    output_text,
                });
            }
        }
    }

    async fn resolve(
        &self,
        request: &TranslationRequest,
        request_id: Uuid,
    ) -> Result<TranslationResult, ApiError> {
        if let Some(hit) = self.cache.get(&request.text, &request.target_language) {
            debug!(%request_id, "served from cache");
            return Ok(hit);
        }

        let body = TranslateBody {
            text: request.text.clone(),
            target_language: request.target_language.clone(),
            save_to_db: request.save_to_history,
            source_language: request.source_language.clone(),
        };
        let response = self.api.translate(&body).await?;
        let result = TranslationResult {
            translated_text: response.display_text(),
            detected_source_language: response.source_language,
        };
        self.cache
            .put(&request.text, &request.target_language, result.clone());
        Ok(result)
    }

    fn update(&self, f: impl FnOnce(&mut SessionSnapshot)) {
        let mut state = self.state.lock();
        f(&mut state);
        self.publish(&state);
    }

    fn publish(&self, state: &SessionSnapshot) {
        self.state_tx.send_replace(state.clone());
    }
}

/// Whether the pending row stands for `request`. Text typed after `request` was
/// dispatched owns the row until its own result lands.
fn placeholder_for(state: &SessionSnapshot, request: &TranslationRequest) -> bool {
    state.pending.as_ref().is_some_and(|p| {
        p.input_text == request.text && p.target_language == request.target_language
    })
}
