//! Injectable TTL cache for connected remote clients.
//!
//! Owned by whoever builds the engine and passed in explicitly, so each test
//! gets its own cache and its own clock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use gasket_core::ContentHash;

/// Default lifetime of a cached client.
pub const DEFAULT_CLIENT_TTL: Duration = Duration::from_secs(50 * 60);

/// Source of "now" for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock [`Clock`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Cache key for a credential; the raw token is never stored.
pub fn credential_fingerprint(access_token: &str) -> String {
    ContentHash::of(access_token).to_string()
}

/// Key → value map whose entries expire `ttl` after insertion.
pub struct ClientCache<V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, (Instant, V)>>,
}

impl<V: Clone> ClientCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Live value for `key`; an expired entry is evicted and `None` returned.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some((inserted, value)) if now.duration_since(*inserted) < self.ttl => {
                Some(value.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        let now = self.clock.now();
        self.lock().insert(key.into(), (now, value));
    }

    pub fn invalidate(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, (inserted, _)| now.duration_since(*inserted) < self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, (Instant, V)>> {
        // Poisoning is ignored: every critical section is a single map call.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
