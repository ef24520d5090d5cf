//! Translation history ledger: paginated fetch from the service plus optimistic local
//! inserts, server-confirmed edits and deletes.
//! Entries are kept newest-first. Positive ids belong to the service; negative ids are
//! local placeholders that the service has never seen.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{HistoryPage, TranslationApi};
use crate::cancellation::RequestSequence;
use crate::error::{ApiError, ApiResult};

/// A single translation history record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub source_language: String,
    pub target_language: String,
    pub input_text: String,
    pub output_text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub was_cached: bool,
    /// Stand-in row shown while a translation is in flight. Never persisted.
    #[serde(default, rename = "is_loading")]
    pub is_loading_placeholder: bool,
}

impl HistoryEntry {
    pub fn loading_placeholder(
        id: i64,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
        input_text: impl Into<String>,
    ) -> Self {
        Self {
            id,
            source_language: source_language.into(),
            target_language: target_language.into(),
            input_text: input_text.into(),
            output_text: String::new(),
            timestamp: Utc::now(),
            was_cached: false,
            is_loading_placeholder: true,
        }
    }

    /// Whether the service has stored this entry.
    pub fn is_confirmed(&self) -> bool {
        self.id > 0
    }

    fn same_phrase(&self, other: &NewTranslation) -> bool {
        self.input_text == other.input_text
            && self.source_language == other.source_language
            && self.target_language == other.target_language
    }
}

/// A finished translation to record locally.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTranslation {
    pub source_language: String,
    pub target_language: String,
    pub input_text: String,
    pub output_text: String,
}

/// Process-local source of placeholder ids: -1, -2, -3, ...
#[derive(Debug, Default)]
pub struct LocalIdAllocator {
    issued: AtomicI64,
}

impl LocalIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> i64 {
        self.issued.fetch_sub(1, Ordering::SeqCst) - 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerSnapshot {
    /// Newest first.
    pub entries: Vec<HistoryEntry>,
    /// Last page applied, 0 before the first fetch.
    pub current_page: u32,
    pub has_more: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl Default for LedgerSnapshot {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            current_page: 0,
            has_more: true,
            is_loading: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Page applied; `added` entries were new to the ledger.
    Applied { added: usize },
    /// A newer fetch was issued while this one was in flight; its page was discarded.
    Stale,
    /// `load_more` had nothing to do.
    Skipped,
}

pub struct HistoryLedger {
    api: Arc<dyn TranslationApi>,
    page_size: u32,
    ids: Arc<LocalIdAllocator>,
    fetch_seq: RequestSequence,
    state: Mutex<LedgerSnapshot>,
    state_tx: watch::Sender<LedgerSnapshot>,
}

impl HistoryLedger {
    pub fn new(api: Arc<dyn TranslationApi>, page_size: u32) -> Self {
        let (state_tx, _) = watch::channel(LedgerSnapshot::default());
        Self {
            api,
            page_size: page_size.max(1),
            ids: Arc::new(LocalIdAllocator::new()),
            fetch_seq: RequestSequence::new(),
            state: Mutex::new(LedgerSnapshot::default()),
            state_tx,
        }
    }

    pub fn id_allocator(&self) -> Arc<LocalIdAllocator> {
        Arc::clone(&self.ids)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.state.lock().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LedgerSnapshot> {
        self.state_tx.subscribe()
    }

    /// Newest first.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.state.lock().entries.clone()
    }

    /// Oldest first, for chat-style rendering.
    pub fn chronological(&self) -> Vec<HistoryEntry> {
        let mut entries = self.entries();
        entries.reverse();
        entries
    }

    pub fn get(&self, id: i64) -> Option<HistoryEntry> {
        self.state.lock().entries.iter().find(|e| e.id == id).cloned()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.state.lock().entries.iter().any(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_more(&self) -> bool {
        self.state.lock().has_more
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    /// Fetch one page. Page 1 replaces the collection; later pages append whatever
    /// ids are not already present. Only the most recently issued fetch may apply.
    pub async fn fetch_page(&self, page: u32) -> ApiResult<FetchOutcome> {
        if page == 0 {
            return Err(ApiError::Validation("pages start at 1".to_string()));
        }

        let seq = self.fetch_seq.advance();
        {
            let mut state = self.state.lock();
            state.is_loading = true;
            state.error = None;
            self.publish(&state);
        }
        info!(page, seq, limit = self.page_size, "history_fetch");

        let result = self.api.history_page(page, self.page_size).await;

        let mut state = self.state.lock();
        if !self.fetch_seq.is_current(seq) {
            match &result {
                Ok(_) => debug!(page, seq, latest = self.fetch_seq.current(), "dropping stale history page"),
                Err(e) => debug!(
                    page,
                    seq,
                    latest = self.fetch_seq.current(),
                    error = %e,
                    "stale history fetch failed, error dropped"
                ),
            }
            return Ok(FetchOutcome::Stale);
        }
        state.is_loading = false;

        match result {
            Ok(response) => {
                let added = apply_page(&mut state, page, response);
                info!(page, added, has_more = state.has_more, "history_page_applied");
                self.publish(&state);
                Ok(FetchOutcome::Applied { added })
            }
            Err(e) => {
                warn!(page, error = %e, "history fetch failed");
                if e.is_unauthorized() {
                    state.entries.clear();
                }
                state.error = Some(e.to_string());
                self.publish(&state);
                Err(e)
            }
        }
    }

    pub async fn refresh(&self) -> ApiResult<FetchOutcome> {
        self.fetch_page(1).await
    }

    /// Fetch the page after the current one, unless a fetch is running or the
    /// service reported no further pages.
    pub async fn load_more(&self) -> ApiResult<FetchOutcome> {
        let next = {
            let state = self.state.lock();
            if state.is_loading || !state.has_more {
                debug!(
                    is_loading = state.is_loading,
                    has_more = state.has_more,
                    "load_more skipped"
                );
                return Ok(FetchOutcome::Skipped);
            }
            state.current_page + 1
        };
        self.fetch_page(next).await
    }

    /// Record a finished translation locally, ahead of everything else, under a fresh
    /// placeholder id. Older entries for the same phrase and language pair are dropped.
    /// Nothing is sent to the service.
    pub fn add_translation(&self, translation: NewTranslation) -> HistoryEntry {
        let entry = HistoryEntry {
            id: self.ids.next_id(),
            source_language: translation.source_language.clone(),
            target_language: translation.target_language.clone(),
            input_text: translation.input_text.clone(),
            output_text: translation.output_text.clone(),
            timestamp: Utc::now(),
            was_cached: false,
            is_loading_placeholder: false,
        };

        let mut state = self.state.lock();
        let before = state.entries.len();
        state.entries.retain(|e| !e.same_phrase(&translation));
        let superseded = before - state.entries.len();
        state.entries.insert(0, entry.clone());
        self.publish(&state);
        debug!(id = entry.id, superseded, "history_add_local");
        entry
    }

    /// Edit an entry's output text. Confirmed entries go through the service and are
    /// replaced by the canonical entry it returns; placeholders are edited in place.
    /// On failure the ledger is left as it was.
    pub async fn update_translation(&self, id: i64, output_text: &str) -> ApiResult<HistoryEntry> {
        if output_text.trim().is_empty() {
            return Err(self.fail(ApiError::Validation(
                "translation text must not be empty".to_string(),
            )));
        }
        if !self.contains(id) {
            return Err(self.fail(unknown_entry(id)));
        }

        if id <= 0 {
            let mut state = self.state.lock();
            let entry = state
                .entries
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| unknown_entry(id))?;
            entry.output_text = output_text.to_string();
            let updated = entry.clone();
            state.error = None;
            self.publish(&state);
            debug!(id, "history_update_local");
            return Ok(updated);
        }

        let canonical = match self.api.update_translation(id, output_text).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(id, error = %e, "history update failed");
                return Err(self.fail(e));
            }
        };

        let mut state = self.state.lock();
        match state.entries.iter().position(|e| e.id == id) {
            Some(pos) => {
                state.entries[pos] = canonical.clone();
                if canonical.id != id {
                    let mut seen = false;
                    state.entries.retain(|e| {
                        if e.id != canonical.id {
                            return true;
                        }
                        let keep = !seen;
                        seen = true;
                        keep
                    });
                }
            }
            None => debug!(id, "entry removed while update was in flight"),
        }
        state.error = None;
        self.publish(&state);
        info!(id, "history_update_confirmed");
        Ok(canonical)
    }

    /// Remove an entry. Confirmed entries are deleted on the service first and only
    /// dropped locally once that succeeds; placeholders are dropped right away.
    pub async fn delete_translation(&self, id: i64) -> ApiResult<()> {
        if !self.contains(id) {
            return Err(self.fail(unknown_entry(id)));
        }

        if id > 0 {
            if let Err(e) = self.api.delete_translation(id).await {
                warn!(id, error = %e, "history delete failed");
                return Err(self.fail(e));
            }
        }

        let mut state = self.state.lock();
        state.entries.retain(|e| e.id != id);
        state.error = None;
        self.publish(&state);
        info!(id, remote = id > 0, "history_delete");
        Ok(())
    }

    fn fail(&self, err: ApiError) -> ApiError {
        let mut state = self.state.lock();
        state.error = Some(err.to_string());
        self.publish(&state);
        err
    }

    fn publish(&self, state: &LedgerSnapshot) {
        self.state_tx.send_replace(state.clone());
    }
}

fn unknown_entry(id: i64) -> ApiError {
    ApiError::Validation(format!("no history entry with id {id}"))
}

/// Merge a fetched page into `state`. Returns how many ids were new.
fn apply_page(state: &mut LedgerSnapshot, page: u32, response: HistoryPage) -> usize {
    let mut seen: HashSet<i64> = if page == 1 {
        HashSet::new()
    } else {
        state.entries.iter().map(|e| e.id).collect()
    };

    let incoming: Vec<HistoryEntry> = response
        .translations
        .into_iter()
        .filter(|e| seen.insert(e.id))
        .collect();
    let added = incoming.len();

    if page == 1 {
        state.entries = incoming;
    } else {
        state.entries.extend(incoming);
    }
    state.current_page = response.pagination.current_page;
    state.has_more = response.pagination.current_page < response.pagination.total_pages;
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{entry, page, MockApi};
    use std::time::Duration;

    fn ledger(api: &Arc<MockApi>) -> HistoryLedger {
        let api: Arc<dyn TranslationApi> = api.clone();
        HistoryLedger::new(api, 10)
    }

    fn ids(ledger: &HistoryLedger) -> Vec<i64> {
        ledger.entries().iter().map(|e| e.id).collect()
    }

    fn phrase(input: &str, output: &str) -> NewTranslation {
        NewTranslation {
            source_language: "en".into(),
            target_language: "es".into(),
            input_text: input.into(),
            output_text: output.into(),
        }
    }

    #[test]
    fn local_ids_are_negative_and_unique() {
        let ids = LocalIdAllocator::new();
        let issued: Vec<i64> = (0..1000).map(|_| ids.next_id()).collect();
        assert_eq!(issued[0], -1);
        assert!(issued.iter().all(|id| *id < 0));
        assert_eq!(issued.iter().collect::<HashSet<_>>().len(), 1000);
    }

    #[tokio::test]
    async fn first_page_replaces_later_pages_append() {
        let api = Arc::new(MockApi::new());
        api.set_page(1, Ok(page(vec![entry(5, "a", "x"), entry(4, "b", "y")], 1, 2)));
        api.set_page(2, Ok(page(vec![entry(3, "c", "z")], 2, 2)));
        let ledger = ledger(&api);
        ledger.add_translation(phrase("local", "only"));

        assert_eq!(ledger.fetch_page(1).await.unwrap(), FetchOutcome::Applied { added: 2 });
        assert_eq!(ids(&ledger), vec![5, 4]);
        assert!(ledger.has_more());

        assert_eq!(ledger.load_more().await.unwrap(), FetchOutcome::Applied { added: 1 });
        assert_eq!(ids(&ledger), vec![5, 4, 3]);
        assert!(!ledger.has_more());
        assert_eq!(ledger.snapshot().current_page, 2);

        assert_eq!(ledger.load_more().await.unwrap(), FetchOutcome::Skipped);
        assert_eq!(*api.history_calls.lock(), vec![1, 2]);
        assert_eq!(
            ledger.chronological().iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![3, 4, 5]
        );
    }

    #[tokio::test]
    async fn overlapping_page_does_not_duplicate() {
        let api = Arc::new(MockApi::new());
        api.set_page(
            1,
            Ok(page(vec![entry(10, "a", "1"), entry(9, "b", "2"), entry(8, "c", "3")], 1, 3)),
        );
        api.set_page(
            2,
            Ok(page(vec![entry(8, "c", "3"), entry(7, "d", "4"), entry(6, "e", "5")], 2, 3)),
        );
        let ledger = ledger(&api);

        ledger.fetch_page(1).await.unwrap();
        let outcome = ledger.fetch_page(2).await.unwrap();

        assert_eq!(outcome, FetchOutcome::Applied { added: 2 });
        assert_eq!(ids(&ledger), vec![10, 9, 8, 7, 6]);
    }

    #[tokio::test(start_paused = true)]
    async fn slower_older_fetch_is_discarded() {
        let api = Arc::new(MockApi::new());
        api.set_page(1, Ok(page(vec![entry(2, "new", "n")], 1, 1)));
        api.set_page_delayed(
            2,
            Duration::from_millis(500),
            Ok(page(vec![entry(1, "old", "o")], 2, 2)),
        );
        let ledger = ledger(&api);

        let (older, newer) = tokio::join!(ledger.fetch_page(2), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            ledger.fetch_page(1).await
        });

        assert_eq!(older.unwrap(), FetchOutcome::Stale);
        assert_eq!(newer.unwrap(), FetchOutcome::Applied { added: 1 });
        assert_eq!(ids(&ledger), vec![2]);
        assert_eq!(ledger.snapshot().current_page, 1);
        assert!(!ledger.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_of_superseded_fetch_is_not_recorded() {
        let api = Arc::new(MockApi::new());
        api.set_page(1, Ok(page(vec![entry(2, "new", "n")], 1, 2)));
        api.set_page_delayed(
            2,
            Duration::from_millis(500),
            Err(ApiError::Network("connection reset".into())),
        );
        let ledger = ledger(&api);

        let (older, newer) = tokio::join!(ledger.fetch_page(2), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            ledger.fetch_page(1).await
        });

        assert_eq!(older.unwrap(), FetchOutcome::Stale);
        assert_eq!(newer.unwrap(), FetchOutcome::Applied { added: 1 });
        assert_eq!(ledger.error(), None);
        assert_eq!(ids(&ledger), vec![2]);
        assert!(ledger.has_more());
    }

    #[tokio::test]
    async fn unauthorized_fetch_clears_entries() {
        let api = Arc::new(MockApi::new());
        api.set_page(1, Ok(page(vec![entry(1, "a", "b")], 1, 1)));
        let ledger = ledger(&api);
        ledger.fetch_page(1).await.unwrap();

        api.set_page(1, Err(ApiError::api("Session expired", Some(401))));
        assert!(ledger.refresh().await.is_err());
        assert!(ledger.is_empty());
        assert_eq!(ledger.error().as_deref(), Some("Session expired"));
        assert!(!ledger.is_loading());
    }

    #[test]
    fn add_puts_newest_first_and_supersedes_same_phrase() {
        let api = Arc::new(MockApi::new());
        let ledger = ledger(&api);

        let first = ledger.add_translation(phrase("cat", "gato"));
        let other = ledger.add_translation(phrase("dog", "perro"));
        let again = ledger.add_translation(phrase("cat", "gato"));

        assert!(first.id < 0 && other.id < 0 && again.id < 0);
        assert_ne!(first.id, again.id);
        assert_eq!(ids(&ledger), vec![again.id, other.id]);
        assert!(!again.was_cached);
        assert!(api.translate_calls.lock().is_empty());
    }

    #[test]
    fn same_phrase_other_target_is_kept() {
        let api = Arc::new(MockApi::new());
        let ledger = ledger(&api);
        ledger.add_translation(phrase("cat", "gato"));
        ledger.add_translation(NewTranslation {
            target_language: "fr".into(),
            ..phrase("cat", "chat")
        });
        assert_eq!(ledger.len(), 2);
    }

    #[tokio::test]
    async fn deleting_placeholder_makes_no_call() {
        let api = Arc::new(MockApi::new());
        let ledger = ledger(&api);
        let added = ledger.add_translation(phrase("cat", "gato"));

        ledger.delete_translation(added.id).await.unwrap();

        assert!(api.delete_calls.lock().is_empty());
        assert!(!ledger.contains(added.id));
    }

    #[tokio::test]
    async fn failed_remote_delete_keeps_entry() {
        let api = Arc::new(MockApi::new());
        api.set_page(1, Ok(page(vec![entry(7, "cat", "gato")], 1, 1)));
        api.fail_deletes(ApiError::Network("connection reset".into()));
        let ledger = ledger(&api);
        ledger.fetch_page(1).await.unwrap();

        let err = ledger.delete_translation(7).await.unwrap_err();

        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(*api.delete_calls.lock(), vec![7]);
        assert!(ledger.contains(7));
        assert!(ledger.error().is_some());
    }

    #[tokio::test]
    async fn confirmed_delete_calls_service_then_removes() {
        let api = Arc::new(MockApi::new());
        api.set_page(1, Ok(page(vec![entry(7, "cat", "gato"), entry(6, "dog", "perro")], 1, 1)));
        let ledger = ledger(&api);
        ledger.fetch_page(1).await.unwrap();

        ledger.delete_translation(7).await.unwrap();

        assert_eq!(*api.delete_calls.lock(), vec![7]);
        assert_eq!(ids(&ledger), vec![6]);
    }

    #[tokio::test]
    async fn delete_unknown_id_is_validation_error() {
        let api = Arc::new(MockApi::new());
        let ledger = ledger(&api);
        let err = ledger.delete_translation(99).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(api.delete_calls.lock().is_empty());
    }

    #[tokio::test]
    async fn update_replaces_with_canonical_entry() {
        let api = Arc::new(MockApi::new());
        api.set_page(1, Ok(page(vec![entry(7, "cat", "gato"), entry(6, "dog", "perro")], 1, 1)));
        let mut canonical = entry(7, "cat", "gatito");
        canonical.timestamp = Utc::now();
        api.set_update_result(Ok(canonical.clone()));
        let ledger = ledger(&api);
        ledger.fetch_page(1).await.unwrap();

        let updated = ledger.update_translation(7, "  gatito ").await.unwrap();

        assert_eq!(updated, canonical);
        assert_eq!(ledger.get(7), Some(canonical));
        assert_eq!(ids(&ledger), vec![7, 6]);
        assert_eq!(*api.update_calls.lock(), vec![(7, "  gatito ".to_string())]);
    }

    #[tokio::test]
    async fn failed_update_leaves_entry_untouched() {
        let api = Arc::new(MockApi::new());
        api.set_page(1, Ok(page(vec![entry(7, "cat", "gato")], 1, 1)));
        api.set_update_result(Err(ApiError::api("Server error", Some(500))));
        let ledger = ledger(&api);
        ledger.fetch_page(1).await.unwrap();

        let err = ledger.update_translation(7, "felino").await.unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert_eq!(ledger.get(7).unwrap().output_text, "gato");
        assert_eq!(ledger.error().as_deref(), Some("Server error"));
    }

    #[tokio::test]
    async fn placeholder_update_stays_local() {
        let api = Arc::new(MockApi::new());
        let ledger = ledger(&api);
        let added = ledger.add_translation(phrase("cat", "gato"));

        let updated = ledger.update_translation(added.id, "gatito").await.unwrap();

        assert_eq!(updated.output_text, "gatito");
        assert!(api.update_calls.lock().is_empty());
    }

    #[tokio::test]
    async fn blank_update_is_rejected() {
        let api = Arc::new(MockApi::new());
        let ledger = ledger(&api);
        let added = ledger.add_translation(phrase("cat", "gato"));

        let err = ledger.update_translation(added.id, "   ").await.unwrap_err();

        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(ledger.get(added.id).unwrap().output_text, "gato");
    }

    #[test]
    fn subscribers_see_local_mutations() {
        let api = Arc::new(MockApi::new());
        let ledger = ledger(&api);
        let rx = ledger.subscribe();
        ledger.add_translation(phrase("cat", "gato"));
        assert_eq!(rx.borrow().entries.len(), 1);
    }
}
