//! Aging values: a stored value paired with its lifetime.

use std::time::{Duration, Instant};

/// A caller value together with its time-to-live and creation instant.
///
/// An `AgingValue` is never mutated after creation. Storing a key again
/// replaces the whole value, which restarts its clock.
#[derive(Debug, Clone)]
pub struct AgingValue<V> {
    value: V,
    ttl: Duration,
    created_at: Instant,
}

impl<V> AgingValue<V> {
    /// Wraps `value`, starting its clock now.
    pub fn new(value: V, ttl: Duration) -> Self {
        Self::with_created_at(value, ttl, Instant::now())
    }

    /// Wraps `value` as if it had been created at `created_at`.
    pub fn with_created_at(value: V, ttl: Duration, created_at: Instant) -> Self {
        Self {
            value,
            ttl,
            created_at,
        }
    }

    /// Returns the wrapped value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Returns the lifetime the value was stored with.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns when the value was stored.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Checks whether the value's lifetime has run out at `now`.
    ///
    /// A value whose age has reached its TTL is expired, so a zero TTL
    /// expires immediately.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }

    /// Checks whether the value has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Returns the lifetime left at `now`, or `None` once expired.
    ///
    /// The returned duration is always non-zero.
    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        let age = now.saturating_duration_since(self.created_at);
        self.ttl.checked_sub(age).filter(|left| !left.is_zero())
    }

    /// Unwraps the caller value.
    pub fn into_value(self) -> V {
        self.value
    }
}
