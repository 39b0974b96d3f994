use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Time-bounded memo of fetched payloads, keyed by URL.
///
/// Owned by whoever loads sources; there is no process-wide cache. An entry
/// older than `ttl` is treated as absent.
#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: HashMap<String, (Instant, V)>,
}

impl<V> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: HashMap::new() }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<&V> {
        match self.entries.get(key) {
            Some((stored, value)) if now.saturating_duration_since(*stored) < self.ttl => {
                Some(value)
            }
            _ => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), (Instant::now(), value));
    }

    /// Drop one entry. Returns whether it was present (expired or not).
    pub fn invalidate(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Remove expired entries; returns how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, (stored, _)| now.saturating_duration_since(*stored) < ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_within_ttl() {
        let mut cache = TtlCache::new(Duration::from_secs(3600));
        cache.insert("u", 1);
        assert_eq!(cache.get("u"), Some(&1));
        assert_eq!(cache.get("other"), None);
    }

    #[test]
    fn zero_ttl_never_hits() {
        let mut cache = TtlCache::new(Duration::ZERO);
        cache.insert("u", 1);
        assert_eq!(cache.get("u"), None);
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn expires_after_ttl() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("u", 1);
        let later = Instant::now() + Duration::from_secs(61);
        assert_eq!(cache.get_at("u", later), None);
    }

    #[test]
    fn invalidate_and_clear() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
