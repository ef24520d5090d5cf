//! Verba: translation client core.
//! Debounced translate requests with staleness control, a session-scoped request
//! cache, a paginated history ledger reconciled against the service, and a timed
//! flashcard drill.

pub mod api;
pub mod cancellation;
pub mod config;
pub mod error;
pub mod flashcards;
pub mod history;
pub mod language;
pub mod settings;
pub mod translate;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use api::{AuthSession, HttpApiClient, TranslationApi};
use config::ClientConfig;
use error::ApiResult;
use flashcards::DrillEngine;
use history::HistoryLedger;
use language::LanguagePair;
use settings::{KeyValueStore, Preferences, StoreError};
use translate::{RequestCache, TranslationSession};

const DEFAULT_LOG_FILTER: &str = "verba=debug";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Human-readable logs to stderr. `RUST_LOG` overrides the default filter. Safe to
/// call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_thread_ids(true)
        .try_init();
}

/// Same as `init_tracing`, one JSON object per event.
pub fn init_json_tracing() {
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_thread_ids(true)
        .try_init();
}

/// Everything one signed-in client window needs, wired together. The session, the
/// ledger and the drill engine share one backend; the session appends to the ledger.
pub struct AppContext {
    pub config: ClientConfig,
    pub auth: Arc<AuthSession>,
    pub api: Arc<dyn TranslationApi>,
    pub store: Arc<dyn KeyValueStore>,
    pub cache: Arc<RequestCache>,
    pub history: Arc<HistoryLedger>,
    pub session: TranslationSession,
    pub drill: DrillEngine,
}

impl AppContext {
    pub fn new(
        config: ClientConfig,
        api: Arc<dyn TranslationApi>,
        store: Arc<dyn KeyValueStore>,
        auth: Arc<AuthSession>,
    ) -> Self {
        let cache = Arc::new(RequestCache::new());
        let history = Arc::new(HistoryLedger::new(
            Arc::clone(&api),
            config.history_page_size,
        ));
        let session = TranslationSession::new(
            Arc::clone(&api),
            Arc::clone(&cache),
            config.debounce,
            Some(Arc::clone(&history)),
        );
        let drill = DrillEngine::new(
            Arc::clone(&api),
            Arc::clone(&store),
            LanguagePair::default(),
        );
        info!(api_url = %config.api_url, debounce_ms = config.debounce.as_millis() as u64, "verba context ready");

        Self {
            config,
            auth,
            api,
            store,
            cache,
            history,
            session,
            drill,
        }
    }

    /// Talk to the service at `config.api_url` over HTTP.
    pub fn connect(
        config: ClientConfig,
        store: Arc<dyn KeyValueStore>,
        auth: Arc<AuthSession>,
    ) -> ApiResult<Self> {
        let api: Arc<dyn TranslationApi> = Arc::new(HttpApiClient::new(&config, Arc::clone(&auth))?);
        Ok(Self::new(config, api, store, auth))
    }

    /// `connect` with `ClientConfig::from_env()` and a signed-out `AuthSession`.
    pub fn from_env(store: Arc<dyn KeyValueStore>) -> ApiResult<Self> {
        Self::connect(ClientConfig::from_env(), store, Arc::new(AuthSession::new()))
    }

    /// Feed a keystroke to the translation session. Whether the result is recorded in
    /// history follows the persisted `saveWords` toggle.
    pub fn translate(&self, text: &str, source_language: Option<&str>, target_language: &str) {
        let save = self.save_words();
        self.session
            .translate(text, source_language, target_language, save);
    }

    pub fn save_words(&self) -> bool {
        Preferences::new(self.store.as_ref()).save_words()
    }

    pub fn set_save_words(&self, enabled: bool) -> Result<(), StoreError> {
        Preferences::new(self.store.as_ref()).set_save_words(enabled)
    }

    /// Stop every timer the context owns.
    pub fn teardown(&self) {
        self.session.teardown();
        self.drill.teardown();
    }
}
