//! Two-tier guidance rate limiting.
//!
//! - **Cycle cooldown** gates whether an analysis cycle runs at all.
//! - **Utterance debounce** gates every call into the speech actuator,
//!   whatever its source. Rejected utterances are dropped, never queued.
//!
//! Both gates accept when `elapsed >= interval` and only record the
//! timestamp of accepted events.

use std::time::Duration;

use tokio::time::Instant;

pub const DEFAULT_CYCLE_COOLDOWN: Duration = Duration::from_secs(3);
pub const DEFAULT_UTTERANCE_DEBOUNCE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct RateLimiter {
    cycle_cooldown: Duration,
    utterance_debounce: Duration,
    last_cycle_at: Option<Instant>,
    last_utterance_at: Option<Instant>,
}

impl RateLimiter {
    pub fn new(cycle_cooldown: Duration, utterance_debounce: Duration) -> Self {
        Self {
            cycle_cooldown,
            utterance_debounce,
            last_cycle_at: None,
            last_utterance_at: None,
        }
    }

    /// Accept an analysis cycle at `now` if the cooldown has elapsed since
    /// the last accepted one.
    pub fn try_begin_cycle(&mut self, now: Instant) -> bool {
        if !elapsed_at_least(self.last_cycle_at, now, self.cycle_cooldown) {
            return false;
        }
        self.last_cycle_at = Some(now);
        true
    }

    /// Accept an utterance at `now` if the debounce has elapsed since the
    /// last accepted one.
    pub fn try_accept_utterance(&mut self, now: Instant) -> bool {
        if !elapsed_at_least(self.last_utterance_at, now, self.utterance_debounce) {
            return false;
        }
        self.last_utterance_at = Some(now);
        true
    }

    pub fn last_cycle_at(&self) -> Option<Instant> {
        self.last_cycle_at
    }

    pub fn last_utterance_at(&self) -> Option<Instant> {
        self.last_utterance_at
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CYCLE_COOLDOWN, DEFAULT_UTTERANCE_DEBOUNCE)
    }
}

fn elapsed_at_least(last: Option<Instant>, now: Instant, interval: Duration) -> bool {
    match last {
        None => true,
        // Out-of-order timestamps saturate to zero elapsed.
        Some(last) => now.saturating_duration_since(last) >= interval,
    }
}
