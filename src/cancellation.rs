//! Cancellation framework: sequence numbers for staleness + replaceable timer tokens.
//! A response may only touch visible state when its sequence is still the latest one,
//! and no timer may fire after its owner was torn down.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Monotonic request counter. Each dispatch takes a fresh number; only the holder
/// of the most recent number is allowed to apply its result.
#[derive(Debug, Default)]
pub struct RequestSequence {
    latest: AtomicU64,
}

impl RequestSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next sequence number. Every earlier number becomes stale.
    pub fn advance(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn is_current(&self, seq: u64) -> bool {
        self.current() == seq
    }

    /// Make every outstanding number stale without handing out a new one.
    pub fn invalidate(&self) {
        self.advance();
    }
}

/// Owns the cancellation tokens of one component. `replace` cancels the timer that
/// is currently armed and issues a fresh child token; `teardown` cancels the root so
/// nothing armed before or after can fire.
pub struct TimerSlot {
    root: CancellationToken,
    armed: Mutex<CancellationToken>,
}

impl TimerSlot {
    pub fn new() -> Self {
        let root = CancellationToken::new();
        let armed = root.child_token();
        Self {
            root,
            armed: Mutex::new(armed),
        }
    }

    /// Cancel the armed timer and return a token for its replacement.
    pub fn replace(&self) -> CancellationToken {
        let mut armed = self.armed.lock();
        armed.cancel();
        let next = self.root.child_token();
        *armed = next.clone();
        next
    }

    /// Cancel the armed timer without arming a new one.
    pub fn cancel(&self) {
        self.armed.lock().cancel();
    }

    pub fn teardown(&self) {
        self.root.cancel();
    }

    #[inline]
    pub fn is_torn_down(&self) -> bool {
        self.root.is_cancelled()
    }
}

impl Default for TimerSlot {
    fn default() -> Self {
        Self::new()
    }
}
