//! In-memory fill-correlation cache (spec §4.11), grounded on
//! `ratelimit::cooldown::WalletCooldown`'s `Mutex<HashMap<_, Instant>>` shape: order ids
//! this process dispatched an execution for are tracked here until either a matching
//! `orders_matched` event confirms the fill or the entry goes stale.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub struct PendingOrders {
    ttl: Duration,
    entries: Mutex<HashMap<String, Instant>>,
}

impl PendingOrders {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()) }
    }

    pub fn insert(&self, order_id: String) {
        self.entries.lock().insert(order_id, Instant::now());
    }

    /// Returns whether `order_id` was a dispatch this process is awaiting a fill for,
    /// removing it from the cache either way (a match is consumed once; a stale hit is
    /// dropped silently).
    pub fn take_if_pending(&self, order_id: &str) -> bool {
        let mut entries = self.entries.lock();
        match entries.remove(order_id) {
            Some(inserted_at) => inserted_at.elapsed() < self.ttl,
            None => false,
        }
    }

    /// Drops entries older than `ttl` that were never matched by a fill event.
    pub fn purge_stale(&self) {
        let ttl = self.ttl;
        self.entries.lock().retain(|_, inserted_at| inserted_at.elapsed() < ttl);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matched_order_is_consumed_once() {
        let cache = PendingOrders::new(Duration::from_secs(60));
        cache.insert("order-1".to_string());
        assert!(cache.take_if_pending("order-1"));
        assert!(!cache.take_if_pending("order-1"));
    }

    #[test]
    fn unknown_order_is_not_pending() {
        let cache = PendingOrders::new(Duration::from_secs(60));
        assert!(!cache.take_if_pending("never-dispatched"));
    }

    #[test]
    fn purge_stale_drops_expired_entries() {
        let cache = PendingOrders::new(Duration::from_millis(1));
        cache.insert("order-1".to_string());
        std::thread::sleep(Duration::from_millis(5));
        cache.purge_stale();
        assert_eq!(cache.len(), 0);
    }
}
