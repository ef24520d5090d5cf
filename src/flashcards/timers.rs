//! Per-card phase durations, their allowed ranges and persistence.

use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::state::CardPhase;
use super::DrillError;
use crate::settings::{load_json, save_json, KeyValueStore, TIMER_SETTINGS_KEY};

const SOURCE_RANGE: RangeInclusive<u64> = 500..=5_000;
const HIDDEN_RANGE: RangeInclusive<u64> = 500..=10_000;
const TRANSLATED_RANGE: RangeInclusive<u64> = 500..=10_000;
const PAUSE_RANGE: RangeInclusive<u64> = 0..=5_000;

/// Phase durations in milliseconds. Missing fields in a stored blob fall back to the
/// default for that field only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerSettings {
    pub source: u64,
    pub hidden: u64,
    pub translated: u64,
    pub pause: u64,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            source: 1_000,
            hidden: 2_000,
            translated: 2_000,
            pause: 2_000,
        }
    }
}

impl TimerSettings {
    pub fn range(phase: CardPhase) -> RangeInclusive<u64> {
        match phase {
            CardPhase::Source => SOURCE_RANGE,
            CardPhase::Hidden => HIDDEN_RANGE,
            CardPhase::Translated => TRANSLATED_RANGE,
            CardPhase::Pause => PAUSE_RANGE,
        }
    }

    pub fn get(&self, phase: CardPhase) -> u64 {
        match phase {
            CardPhase::Source => self.source,
            CardPhase::Hidden => self.hidden,
            CardPhase::Translated => self.translated,
            CardPhase::Pause => self.pause,
        }
    }

    pub fn with(mut self, phase: CardPhase, ms: u64) -> Self {
        match phase {
            CardPhase::Source => self.source = ms,
            CardPhase::Hidden => self.hidden = ms,
            CardPhase::Translated => self.translated = ms,
            CardPhase::Pause => self.pause = ms,
        }
        self
    }

    pub fn validate(&self) -> Result<(), DrillError> {
        for phase in CardPhase::ALL {
            let ms = self.get(phase);
            let range = Self::range(phase);
            if !range.contains(&ms) {
                return Err(DrillError::InvalidTimer(format!(
                    "{phase} duration {ms}ms outside {}..={}ms",
                    range.start(),
                    range.end()
                )));
            }
        }
        Ok(())
    }

    pub fn duration(&self, phase: CardPhase) -> Duration {
        Duration::from_millis(self.get(phase))
    }

    /// Time from card start to the end of `phase`.
    pub fn phase_end(&self, phase: CardPhase) -> Duration {
        CardPhase::ALL
            .iter()
            .take_while(|p| **p != phase)
            .map(|p| self.duration(*p))
            .sum::<Duration>()
            + self.duration(phase)
    }

    /// One full source → pause cycle.
    pub fn card_duration(&self) -> Duration {
        self.phase_end(CardPhase::Pause)
    }

    /// Stored settings, or the defaults when nothing usable is stored. Out-of-range
    /// stored values are ignored as a whole.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        match load_json::<TimerSettings>(store, TIMER_SETTINGS_KEY) {
            Some(settings) if settings.validate().is_ok() => settings,
            Some(settings) => {
                info!(?settings, "stored timer settings out of range, using defaults");
                Self::default()
            }
            None => Self::default(),
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), DrillError> {
        save_json(store, TIMER_SETTINGS_KEY, self)?;
        Ok(())
    }
}
