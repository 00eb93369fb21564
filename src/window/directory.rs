//! Process-wide registry of per-user window caches, lazily populated.
//!
//! The directory mutex guards lookup and insertion only; each returned cache
//! carries its own lock and is exclusively owned by whichever single-threaded
//! sequence processes that user's batches.

use super::UserWindowCache;
use crate::error::Error;
use crate::store::RowStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

struct Entry {
    cache: Arc<Mutex<UserWindowCache>>,
    last_access: Instant,
}

pub struct CacheDirectory {
    store: RowStore,
    entries: Mutex<HashMap<String, Entry>>,
}

impl CacheDirectory {
    pub fn new(store: RowStore) -> Self {
        Self {
            store,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the cache for `user_id`, constructing it (and loading any
    /// persisted history) on first sight.
    pub fn get_or_create(&self, user_id: &str) -> Result<Arc<Mutex<UserWindowCache>>, Error> {
        let mut entries = self.entries.lock().expect("lock");
        if let Some(entry) = entries.get_mut(user_id) {
            entry.last_access = Instant::now();
            return Ok(Arc::clone(&entry.cache));
        }
        let cache = Arc::new(Mutex::new(UserWindowCache::load_or_new(
            user_id,
            self.store.clone(),
        )?));
        entries.insert(
            user_id.to_string(),
            Entry {
                cache: Arc::clone(&cache),
                last_access: Instant::now(),
            },
        );
        Ok(cache)
    }

    /// Drop in-memory entries not accessed within `max_idle`, bounding memory
    /// for long runs with many distinct users. Persisted files remain, so a
    /// later access reloads the same history. Returns the evicted count.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut entries = self.entries.lock().expect("lock");
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, e| now.duration_since(e.last_access) <= max_idle);
        before - entries.len()
    }

    /// Number of users currently resident in memory.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
