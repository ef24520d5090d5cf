//! Debounce + staleness control for outgoing translate calls.
//! `Debouncer` is a trailing-edge timer: every `schedule` restarts the wait.
//! `StalenessGate` tags each dispatch with a sequence number, refuses to re-send the
//! last dispatched text, and tells a finished request whether it may still apply.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::cancellation::{RequestSequence, TimerSlot};

pub struct Debouncer {
    delay: Duration,
    slot: TimerSlot,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slot: TimerSlot::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm the timer, replacing any armed one. `action` runs once `delay` passes
    /// without another `schedule`, `cancel` or `teardown`.
    pub fn schedule<F, Fut>(&self, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = self.slot.replace();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            action().await;
        });
    }

    pub fn cancel(&self) {
        self.slot.cancel();
    }

    pub fn teardown(&self) {
        self.slot.teardown();
    }

    pub fn is_torn_down(&self) -> bool {
        self.slot.is_torn_down()
    }
}

/// What counts as "the same request" for redundant-dispatch suppression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchKey {
    pub text: String,
    pub target_language: String,
}

#[derive(Default)]
pub struct StalenessGate {
    sequence: RequestSequence,
    last_dispatched: Mutex<Option<DispatchKey>>,
}

impl StalenessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a sequence number for `key`. Returns `None` when `key` is what was
    /// dispatched last, in which case nothing should be sent.
    pub fn begin(&self, key: DispatchKey) -> Option<u64> {
        let mut last = self.last_dispatched.lock();
        if last.as_ref() == Some(&key) {
            debug!(text_len = key.text.len(), "skip redundant dispatch");
            return None;
        }
        *last = Some(key);
        Some(self.sequence.advance())
    }

    #[inline]
    pub fn is_current(&self, seq: u64) -> bool {
        self.sequence.is_current(seq)
    }

    pub fn current(&self) -> u64 {
        self.sequence.current()
    }

    /// Forget the last dispatched key and turn every in-flight request stale.
    pub fn reset(&self) {
        *self.last_dispatched.lock() = None;
        self.sequence.invalidate();
    }
}
