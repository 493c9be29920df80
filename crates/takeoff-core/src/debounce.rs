//! Keyed debouncing with caller-supplied time.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Pending<K, V> {
    key: K,
    value: V,
    first_scheduled_at: Instant,
    last_scheduled_at: Instant,
}

/// Delays a value until it has been quiet for `delay`.
///
/// Scheduling again with the same key replaces the value and restarts the
/// quiet period. Scheduling with a different key cancels the pending value.
/// An optional `max_delay` bounds how long a busy key can be postponed.
#[derive(Debug, Clone)]
pub struct Debouncer<K, V> {
    delay: Duration,
    max_delay: Option<Duration>,
    pending: Option<Pending<K, V>>,
}

impl<K: PartialEq, V> Debouncer<K, V> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_delay: None,
            pending: None,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `value` under `key`.
    pub fn schedule(&mut self, key: K, value: V, now: Instant) {
        let first_scheduled_at = match &self.pending {
            Some(pending) if pending.key == key => pending.first_scheduled_at,
            _ => now,
        };
        self.pending = Some(Pending {
            key,
            value,
            first_scheduled_at,
            last_scheduled_at: now,
        });
    }

    /// Whether the pending value is due at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        let Some(pending) = &self.pending else {
            return false;
        };
        let quiet = now.saturating_duration_since(pending.last_scheduled_at) >= self.delay;
        let overdue = self
            .max_delay
            .is_some_and(|max| now.saturating_duration_since(pending.first_scheduled_at) >= max);
        quiet || overdue
    }

    /// Take the pending value if it is due.
    pub fn poll(&mut self, now: Instant) -> Option<(K, V)> {
        if !self.is_due(now) {
            return None;
        }
        self.pending.take().map(|p| (p.key, p.value))
    }

    /// Take the pending value regardless of timing.
    pub fn flush(&mut self) -> Option<(K, V)> {
        self.pending.take().map(|p| (p.key, p.value))
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_key(&self) -> Option<&K> {
        self.pending.as_ref().map(|p| &p.key)
    }
}
