//! Per-user, process-local holding area with a fixed time-to-live.
//!
//! Entries carry their own expiry instant. Reads check expiry lazily and
//! [`ExpiringCache::purge_expired`] sweeps everything at once, so no timer is
//! kept per entry. Nothing here is persisted: a restart loses all entries.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct ExpiringCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V: Clone> ExpiringCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry<V>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store `value` for `user_id`, replacing any previous entry.
    pub fn insert(&self, user_id: &str, value: V) {
        self.insert_at(user_id, value, Instant::now());
    }

    pub fn insert_at(&self, user_id: &str, value: V, now: Instant) {
        self.lock().insert(
            user_id.to_string(),
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    pub fn get(&self, user_id: &str) -> Option<V> {
        self.get_at(user_id, Instant::now())
    }

    pub fn get_at(&self, user_id: &str, now: Instant) -> Option<V> {
        let mut entries = self.lock();
        match entries.get(user_id) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(user_id);
                None
            }
            None => None,
        }
    }

    /// Remove and return the live entry for `user_id`.
    pub fn take(&self, user_id: &str) -> Option<V> {
        self.take_at(user_id, Instant::now())
    }

    pub fn take_at(&self, user_id: &str, now: Instant) -> Option<V> {
        self.lock()
            .remove(user_id)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value)
    }

    pub fn remove(&self, user_id: &str) {
        self.lock().remove(user_id);
    }

    /// Drop every expired entry and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
