//! Per-key in-flight tracking
//!
//! A key is "loading" while exactly one fetch for it is outstanding. Each
//! slot carries a watch channel so callers can wait for the fetch to settle
//! and receive the same outcome.

use std::collections::HashMap;

use tokio::sync::watch;
use tracing::debug;

use crate::theme::{ThemeError, ThemeKey};

/// Settled result of one fetch: `Ok(None)` means the backend had no theme
pub type FetchOutcome = Result<Option<String>, ThemeError>;

/// Receiver half handed to callers waiting on an in-flight fetch
pub type FlightReceiver = watch::Receiver<Option<FetchOutcome>>;

/// Tracks which keys have a fetch outstanding
#[derive(Debug, Default)]
pub struct LoadingTracker {
    flights: HashMap<ThemeKey, watch::Sender<Option<FetchOutcome>>>,
}

impl LoadingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self, key: &ThemeKey) -> bool {
        self.flights.contains_key(key)
    }

    /// Marks `key` as loading or not
    ///
    /// Setting `true` on a key that is already loading keeps the existing
    /// slot. Setting `false` is idempotent; waiters on a slot released this
    /// way see the channel close without an outcome.
    pub fn set_loading(&mut self, key: &ThemeKey, loading: bool) {
        if loading {
            self.flights.entry(key.clone()).or_insert_with(|| {
                let (tx, _rx) = watch::channel(None);
                tx
            });
        } else if self.flights.remove(key).is_some() {
            debug!(key = %key, "loading slot released");
        }
    }

    /// Subscribes to the outstanding fetch for `key`, if any
    pub fn subscribe(&self, key: &ThemeKey) -> Option<FlightReceiver> {
        self.flights.get(key).map(|tx| tx.subscribe())
    }

    /// Releases the slot for `key` and hands `outcome` to every waiter
    pub fn settle(&mut self, key: &ThemeKey, outcome: FetchOutcome) {
        if let Some(tx) = self.flights.remove(key) {
            // send_replace never fails, even with no receivers
            tx.send_replace(Some(outcome));
            debug!(key = %key, "loading slot settled");
        }
    }

    /// Number of keys currently loading
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::Language;

    fn key() -> ThemeKey {
        ThemeKey::new("42", Language::English)
    }

    #[test]
    fn test_not_loading_by_default() {
        let tracker = LoadingTracker::new();
        assert!(!tracker.is_loading(&key()));
        assert!(tracker.subscribe(&key()).is_none());
    }

    #[test]
    fn test_set_loading_round_trip() {
        let mut tracker = LoadingTracker::new();
        tracker.set_loading(&key(), true);
        assert!(tracker.is_loading(&key()));
        assert_eq!(tracker.in_flight(), 1);

        tracker.set_loading(&key(), false);
        assert!(!tracker.is_loading(&key()));
    }

    #[test]
    fn test_clearing_unset_flag_is_safe() {
        let mut tracker = LoadingTracker::new();
        tracker.set_loading(&key(), false);
        tracker.set_loading(&key(), false);
        assert!(!tracker.is_loading(&key()));
    }

    #[test]
    fn test_keys_are_independent() {
        let mut tracker = LoadingTracker::new();
        let other = ThemeKey::new("42", Language::Urdu);
        tracker.set_loading(&key(), true);

        assert!(!tracker.is_loading(&other));
    }

    #[tokio::test]
    async fn test_settle_delivers_outcome_and_clears_flag() {
        let mut tracker = LoadingTracker::new();
        tracker.set_loading(&key(), true);
        let mut rx = tracker.subscribe(&key()).expect("slot should exist");

        tracker.settle(&key(), Ok(Some("theme".to_string())));

        assert!(!tracker.is_loading(&key()));
        rx.changed().await.expect("outcome should be sent");
        assert_eq!(*rx.borrow(), Some(Ok(Some("theme".to_string()))));
    }

    #[tokio::test]
    async fn test_release_without_outcome_closes_channel() {
        let mut tracker = LoadingTracker::new();
        tracker.set_loading(&key(), true);
        let mut rx = tracker.subscribe(&key()).expect("slot should exist");

        tracker.set_loading(&key(), false);

        assert!(rx.changed().await.is_err());
    }
}
