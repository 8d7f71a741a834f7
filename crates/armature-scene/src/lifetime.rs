//! Reset-TTL-on-touch expiry for pooled objects
//!
//! A deadline map polled from the host loop with an explicit `now` -
//! nothing fires on its own, so expiry callbacks can never interleave with
//! a message handler. Re-tracking a key replaces its deadline
//! (last-update-wins), the cache-expiry policy rather than a fixed
//! deadline.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct LifetimeTracker<K> {
    deadlines: HashMap<K, Instant>,
}

impl<K: Eq + Hash + Clone> LifetimeTracker<K> {
    pub fn new() -> Self {
        Self {
            deadlines: HashMap::new(),
        }
    }

    /// (Re)arm the single-shot deadline for `key`. A timeout of zero (or
    /// anything non-positive) means "never expire": no deadline is armed
    /// and any existing one is cleared.
    pub fn track(&mut self, key: K, timeout_secs: f64, now: Instant) {
        if timeout_secs > 0.0 && timeout_secs.is_finite() {
            self.deadlines
                .insert(key, now + Duration::from_secs_f64(timeout_secs));
        } else {
            self.deadlines.remove(&key);
        }
    }

    /// Cancel without firing
    pub fn untrack(&mut self, key: &K) {
        self.deadlines.remove(key);
    }

    /// Remove and return every key whose deadline has passed; the caller
    /// owns the consequences (this tracker holds no object references)
    pub fn poll(&mut self, now: Instant) -> Vec<K> {
        let due: Vec<K> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &due {
            self.deadlines.remove(key);
        }
        due
    }

    /// Cancel all outstanding deadlines (teardown)
    pub fn clear(&mut self) {
        self.deadlines.clear();
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for LifetimeTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn test_fires_after_timeout_not_before() {
        let t0 = Instant::now();
        let mut tracker = LifetimeTracker::new();
        tracker.track("x", 1.0, t0);

        assert!(tracker.poll(t0 + secs(0.99)).is_empty());
        assert_eq!(tracker.poll(t0 + secs(1.0)), vec!["x"]);
        // single-shot: gone after firing
        assert!(tracker.poll(t0 + secs(5.0)).is_empty());
    }

    #[test]
    fn test_retouch_pushes_the_deadline() {
        let t0 = Instant::now();
        let mut tracker = LifetimeTracker::new();
        tracker.track("x", 1.0, t0);
        tracker.track("x", 1.0, t0 + secs(0.5));

        // the original 1s mark must not fire
        assert!(tracker.poll(t0 + secs(1.2)).is_empty());
        assert_eq!(tracker.poll(t0 + secs(1.5)), vec!["x"]);
    }

    #[test]
    fn test_zero_timeout_means_never() {
        let t0 = Instant::now();
        let mut tracker = LifetimeTracker::new();
        tracker.track("x", 1.0, t0);
        tracker.track("x", 0.0, t0);

        assert!(tracker.is_empty());
        assert!(tracker.poll(t0 + secs(100.0)).is_empty());
    }

    #[test]
    fn test_untrack_cancels_without_firing() {
        let t0 = Instant::now();
        let mut tracker = LifetimeTracker::new();
        tracker.track("x", 1.0, t0);
        tracker.untrack(&"x");
        assert!(tracker.poll(t0 + secs(2.0)).is_empty());
    }

    #[test]
    fn test_clear_cancels_everything() {
        let t0 = Instant::now();
        let mut tracker = LifetimeTracker::new();
        tracker.track("a", 1.0, t0);
        tracker.track("b", 2.0, t0);
        tracker.clear();
        assert!(tracker.is_empty());
    }
}
