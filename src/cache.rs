use std::collections::HashMap;
use std::time::{Duration, Instant};

/// In-memory store for rendered pages, each entry living for a fixed window.
///
/// Entries are keyed by whatever the caller considers a distinct page (request
/// URI plus viewer for the global feed). Nothing invalidates an entry early
/// except `clear`.
pub struct PageCache {
    ttl: Duration,
    entries: HashMap<String, (Instant, String)>,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Cached body for `key`, if it is still inside its window.
    pub fn get(&mut self, key: &str) -> Option<String> {
        let fresh = match self.entries.get(key) {
            Some((stored_at, _)) => stored_at.elapsed() < self.ttl,
            None => return None,
        };

        if !fresh {
            self.entries.remove(key);
            return None;
        }

        self.entries.get(key).map(|(_, body)| body.clone())
    }

    pub fn insert(&mut self, key: String, body: String) {
        self.clear_stale();
        self.entries.insert(key, (Instant::now(), body));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn clear_stale(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
    }
}
