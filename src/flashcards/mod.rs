//! Flashcard drill engine.
//! Fetches a deck for the active language pair, then walks it card by card. Each card
//! runs the source → hidden → translated → pause cycle on a timer task while a 16 ms
//! tick publishes whole-deck progress. One card task exists at a time; pausing,
//! restarting and teardown cancel it through the shared `TimerSlot`.

pub mod state;
pub mod timers;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{FlashcardsRequest, TranslationApi};
use crate::cancellation::{RequestSequence, TimerSlot};
use crate::language::LanguagePair;
use crate::settings::{KeyValueStore, StoreError};

pub use state::{deck_progress, CardPhase, DrillSnapshot, DrillStatus};
pub use timers::TimerSettings;

/// Deck sizes offered in selection.
pub const DECK_SIZES: [u32; 4] = [5, 10, 25, 50];
/// Progress sampling period (~60 Hz).
pub const PROGRESS_TICK: Duration = Duration::from_millis(16);

const FETCH_FAILED: &str = "Failed to fetch flashcards";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: i64,
    pub source_text: String,
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
}

#[derive(Error, Debug)]
pub enum DrillError {
    #[error("cannot {action} while {from}")]
    InvalidTransition {
        from: DrillStatus,
        action: &'static str,
    },

    #[error("invalid timer setting: {0}")]
    InvalidTimer(String),

    #[error("deck size must be at least 1")]
    InvalidDeckSize,

    #[error("drill engine has been torn down")]
    TornDown,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct DrillEngine {
    inner: Arc<DrillInner>,
}

struct DrillInner {
    api: Arc<dyn TranslationApi>,
    store: Arc<dyn KeyValueStore>,
    fetch_seq: RequestSequence,
    timer: TimerSlot,
    state: Mutex<DrillSnapshot>,
    state_tx: watch::Sender<DrillSnapshot>,
}

impl DrillEngine {
    /// Timer settings are read from `store` now and written back on every change.
    pub fn new(
        api: Arc<dyn TranslationApi>,
        store: Arc<dyn KeyValueStore>,
        language_pair: LanguagePair,
    ) -> Self {
        let timers = TimerSettings::load(store.as_ref());
        let initial = DrillSnapshot::new(timers, language_pair);
        let (state_tx, _) = watch::channel(initial.clone());
        Self {
            inner: Arc::new(DrillInner {
                api,
                store,
                fetch_seq: RequestSequence::new(),
                timer: TimerSlot::new(),
                state: Mutex::new(initial),
                state_tx,
            }),
        }
    }

    pub fn snapshot(&self) -> DrillSnapshot {
        self.inner.state.lock().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DrillSnapshot> {
        self.inner.state_tx.subscribe()
    }

    pub fn status(&self) -> DrillStatus {
        self.inner.state.lock().status
    }

    pub fn phase(&self) -> CardPhase {
        self.inner.state.lock().phase
    }

    pub fn current_index(&self) -> usize {
        self.inner.state.lock().current_index
    }

    pub fn progress(&self) -> f64 {
        self.inner.state.lock().progress
    }

    pub fn current_card(&self) -> Option<Flashcard> {
        self.inner.state.lock().current_card().cloned()
    }

    pub fn timers(&self) -> TimerSettings {
        self.inner.state.lock().timers
    }

    pub fn language_pair(&self) -> LanguagePair {
        self.inner.state.lock().language_pair.clone()
    }

    /// Fetch `limit` cards for the active pair and start the first one. Ends in
    /// `running`, `empty` or `error`; a failed fetch is reported through the state,
    /// not the return value.
    pub async fn select_deck(&self, limit: u32) -> Result<DrillStatus, DrillError> {
        if limit == 0 {
            return Err(DrillError::InvalidDeckSize);
        }

        let (seq, request) = {
            let mut state = self.inner.live_state()?;
            state.transition(DrillStatus::Loading, "select deck")?;
            state.cards.clear();
            state.rewind();
            state.error = None;
            state.deck_size = Some(limit);
            self.inner.publish(&state);
            let request = FlashcardsRequest {
                source_lang: state.language_pair.source.clone(),
                target_lang: state.language_pair.target.clone(),
                limit,
            };
            (self.inner.fetch_seq.advance(), request)
        };
        info!(seq, limit, source = %request.source_lang, target = %request.target_lang, "flashcards_fetch");

        let result = self.inner.api.flashcards(&request).await;

        let mut state = self.inner.state.lock();
        if self.inner.timer.is_torn_down() || !self.inner.fetch_seq.is_current(seq) {
            debug!(seq, "flashcard deck arrived after restart or teardown, dropped");
            return Ok(state.status);
        }

        match result {
            Ok(response) if response.flashcards.is_empty() => {
                state.transition(DrillStatus::Empty, "load deck")?;
            }
            Ok(response) => {
                info!(count = response.flashcards.len(), requested = limit, "flashcards_loaded");
                state.cards = response.flashcards;
                state.transition(DrillStatus::Running, "load deck")?;
                self.inner.start_card(&mut state, 0);
            }
            Err(e) => {
                warn!(error = %e, "flashcard fetch failed");
                let message = e.to_string();
                state.error = Some(if message.is_empty() {
                    FETCH_FAILED.to_string()
                } else {
                    message
                });
                state.transition(DrillStatus::Error, "load deck")?;
            }
        }
        self.inner.publish(&state);
        Ok(state.status)
    }

    /// Stop every timer and freeze on the current card.
    pub fn pause(&self) -> Result<(), DrillError> {
        let mut state = self.inner.live_state()?;
        state.transition(DrillStatus::Paused, "pause")?;
        self.inner.timer.cancel();
        self.inner.publish(&state);
        Ok(())
    }

    /// Replay the current card from its first phase.
    pub fn resume(&self) -> Result<(), DrillError> {
        let mut state = self.inner.live_state()?;
        state.transition(DrillStatus::Running, "resume")?;
        let index = state.current_index;
        self.inner.start_card(&mut state, index);
        self.inner.publish(&state);
        Ok(())
    }

    /// Drop the deck and go back to selection. Valid from every state; a fetch still in
    /// flight will be ignored when it lands.
    pub fn restart(&self) {
        let Ok(mut state) = self.inner.live_state() else {
            debug!("restart after teardown ignored");
            return;
        };
        self.inner.fetch_seq.invalidate();
        self.inner.timer.cancel();
        if state.status != DrillStatus::Selection {
            info!(from = %state.status, to = "selection", action = "restart", "drill_transition");
            state.status = DrillStatus::Selection;
        }
        state.cards.clear();
        state.rewind();
        state.error = None;
        self.inner.publish(&state);
    }

    /// Replace all phase durations. Only while choosing a deck; applies from the next
    /// card that starts.
    pub fn set_timers(&self, timers: TimerSettings) -> Result<(), DrillError> {
        let mut state = self.inner.live_state()?;
        state.require(DrillStatus::Selection, "change timers")?;
        timers.validate()?;
        timers.save(self.inner.store.as_ref())?;
        state.timers = timers;
        self.inner.publish(&state);
        info!(?timers, "flashcard_timers_saved");
        Ok(())
    }

    pub fn set_timer(&self, phase: CardPhase, ms: u64) -> Result<(), DrillError> {
        let timers = self.timers().with(phase, ms);
        self.set_timers(timers)
    }

    pub fn set_language_pair(&self, pair: LanguagePair) -> Result<(), DrillError> {
        let mut state = self.inner.live_state()?;
        state.require(DrillStatus::Selection, "change languages")?;
        info!(pair = %pair, "flashcard_language_pair");
        state.language_pair = pair;
        self.inner.publish(&state);
        Ok(())
    }

    /// Cancel every timer for good. Nothing the engine owns mutates state afterwards.
    pub fn teardown(&self) {
        let _state = self.inner.state.lock();
        self.inner.timer.teardown();
        self.inner.fetch_seq.invalidate();
        info!("drill engine torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.timer.is_torn_down()
    }
}

impl Drop for DrillEngine {
    fn drop(&mut self) {
        self.inner.timer.teardown();
    }
}

impl DrillInner {
    /// State lock for a user action. Refused once the engine is torn down.
    fn live_state(&self) -> Result<MutexGuard<'_, DrillSnapshot>, DrillError> {
        let state = self.state.lock();
        if self.timer.is_torn_down() {
            debug!(status = %state.status, "drill action after teardown refused");
            return Err(DrillError::TornDown);
        }
        Ok(state)
    }

    /// Show card `index` at its first phase and spawn the task that drives it. Any
    /// previously running card task is cancelled. Timer settings are captured here.
    fn start_card(self: &Arc<Self>, state: &mut DrillSnapshot, index: usize) {
        state.current_index = index;
        state.phase = CardPhase::Source;
        state.progress = deck_progress(index, 0.0, state.cards.len());

        let token = self.timer.replace();
        let timers = state.timers;
        let total = state.cards.len();
        debug!(index, total, "card_start");

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.run_card(token, index, total, timers).await;
        });
    }

    async fn run_card(
        self: Arc<Self>,
        token: CancellationToken,
        index: usize,
        total: usize,
        timers: TimerSettings,
    ) {
        let started = Instant::now();
        let card_len = timers.card_duration().as_secs_f64();
        let mut phase = CardPhase::Source;
        let mut tick = tokio::time::interval(PROGRESS_TICK);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let phase_end = started + timers.phase_end(phase);
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep_until(phase_end) => {
                    match phase.next() {
                        Some(next) => {
                            phase = next;
                            self.with_live_card(&token, |state| {
                                state.phase = next;
                                debug!(index, phase = %next, "card_phase");
                            });
                        }
                        None => {
                            self.finish_card(&token, index);
                            return;
                        }
                    }
                }
                _ = tick.tick() => {
                    let fraction = if card_len > 0.0 {
                        started.elapsed().as_secs_f64() / card_len
                    } else {
                        1.0
                    };
                    let progress = deck_progress(index, fraction, total);
                    self.with_live_card(&token, |state| state.progress = progress);
                }
            }
        }
    }

    /// Advance past card `index`, or go back to selection once the deck is done.
    fn finish_card(self: &Arc<Self>, token: &CancellationToken, index: usize) {
        let mut state = self.state.lock();
        if token.is_cancelled() {
            return;
        }
        let next = index + 1;
        if next >= state.cards.len() {
            info!(cards = state.cards.len(), "deck_exhausted");
            self.timer.cancel();
            if state.transition(DrillStatus::Selection, "finish deck").is_ok() {
                state.rewind();
            }
        } else {
            self.start_card(&mut state, next);
        }
        self.publish(&state);
    }

    /// Apply `f` unless the card task owning `token` has been cancelled meanwhile.
    fn with_live_card(&self, token: &CancellationToken, f: impl FnOnce(&mut DrillSnapshot)) {
        let mut state = self.state.lock();
        if token.is_cancelled() {
            return;
        }
        f(&mut state);
        self.publish(&state);
    }

    fn publish(&self, state: &DrillSnapshot) {
        self.state_tx.send_replace(state.clone());
    }
}
