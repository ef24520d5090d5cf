//! Drill lifecycle: selection → loading → running ⇄ paused, with empty / error
//! as dead ends that only `restart` leaves. Inside a running card the phase cycles
//! source → hidden → translated → pause.

use serde::Serialize;
use tracing::{info, warn};

use super::timers::TimerSettings;
use super::{DrillError, Flashcard};
use crate::language::LanguagePair;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DrillStatus {
    Selection,
    Loading,
    Running,
    Paused,
    Error,
    Empty,
}

impl std::fmt::Display for DrillStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrillStatus::Selection => write!(f, "selection"),
            DrillStatus::Loading => write!(f, "loading"),
            DrillStatus::Running => write!(f, "running"),
            DrillStatus::Paused => write!(f, "paused"),
            DrillStatus::Error => write!(f, "error"),
            DrillStatus::Empty => write!(f, "empty"),
        }
    }
}

impl DrillStatus {
    pub fn can_transition_to(self, next: DrillStatus) -> bool {
        matches!(
            (self, next),
            (DrillStatus::Selection, DrillStatus::Loading)
                | (DrillStatus::Loading, DrillStatus::Running)
                | (DrillStatus::Loading, DrillStatus::Empty)
                | (DrillStatus::Loading, DrillStatus::Error)
                | (DrillStatus::Running, DrillStatus::Paused)
                | (DrillStatus::Paused, DrillStatus::Running)
                // deck exhausted, or restart from anywhere
                | (_, DrillStatus::Selection)
        )
    }

    /// A deck is loaded and a card is on screen.
    pub fn is_active(self) -> bool {
        matches!(self, DrillStatus::Running | DrillStatus::Paused)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CardPhase {
    Source,
    Hidden,
    Translated,
    Pause,
}

impl CardPhase {
    pub const ALL: [CardPhase; 4] = [
        CardPhase::Source,
        CardPhase::Hidden,
        CardPhase::Translated,
        CardPhase::Pause,
    ];

    pub fn next(self) -> Option<CardPhase> {
        match self {
            CardPhase::Source => Some(CardPhase::Hidden),
            CardPhase::Hidden => Some(CardPhase::Translated),
            CardPhase::Translated => Some(CardPhase::Pause),
            CardPhase::Pause => None,
        }
    }
}

impl std::fmt::Display for CardPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CardPhase::Source => write!(f, "source"),
            CardPhase::Hidden => write!(f, "hidden"),
            CardPhase::Translated => write!(f, "translated"),
            CardPhase::Pause => write!(f, "pause"),
        }
    }
}

/// Everything the drill view renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrillSnapshot {
    pub status: DrillStatus,
    pub cards: Vec<Flashcard>,
    pub current_index: usize,
    pub phase: CardPhase,
    /// Whole-deck progress, 0..=100.
    pub progress: f64,
    pub error: Option<String>,
    pub timers: TimerSettings,
    pub language_pair: LanguagePair,
    /// Last requested deck size.
    pub deck_size: Option<u32>,
}

impl DrillSnapshot {
    pub fn new(timers: TimerSettings, language_pair: LanguagePair) -> Self {
        Self {
            status: DrillStatus::Selection,
            cards: Vec::new(),
            current_index: 0,
            phase: CardPhase::Source,
            progress: 0.0,
            error: None,
            timers,
            language_pair,
            deck_size: None,
        }
    }

    pub fn current_card(&self) -> Option<&Flashcard> {
        if self.status.is_active() {
            self.cards.get(self.current_index)
        } else {
            None
        }
    }

    pub(crate) fn transition(
        &mut self,
        next: DrillStatus,
        action: &'static str,
    ) -> Result<(), DrillError> {
        let from = self.status;
        if !from.can_transition_to(next) {
            warn!(%from, to = %next, action, "invalid drill transition");
            return Err(DrillError::InvalidTransition { from, action });
        }
        self.status = next;
        info!(%from, to = %next, action, "drill_transition");
        Ok(())
    }

    /// Require `expected` without changing state.
    pub(crate) fn require(
        &self,
        expected: DrillStatus,
        action: &'static str,
    ) -> Result<(), DrillError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(DrillError::InvalidTransition {
                from: self.status,
                action,
            })
        }
    }

    /// Back to the top of the deck at the first phase.
    pub(crate) fn rewind(&mut self) {
        self.current_index = 0;
        self.phase = CardPhase::Source;
        self.progress = 0.0;
    }
}

/// `((index + fraction) / total) * 100`, capped at 100.
pub fn deck_progress(index: usize, card_fraction: f64, total: usize) -> f64 {
    let total = total.max(1) as f64;
    let fraction = card_fraction.clamp(0.0, 1.0);
    (((index as f64 + fraction) / total) * 100.0).min(100.0)
}
