//! One user's rolling history plus training bookkeeping.
//!
//! Invariants: `last_train_count <= total_count` always, and `total_count`
//! equals the persisted history length after every successful append.

use crate::error::Error;
use crate::rows::{Row, StoredRow};
use crate::store::{PersistedWindow, RowStore, UserHistory};
use std::path::PathBuf;

#[derive(Debug)]
pub struct UserWindowCache {
    user_id: String,
    store: RowStore,
    history: UserHistory,
    total_count: usize,
    last_train_count: usize,
}

impl UserWindowCache {
    /// Load any persisted history for `user_id`, or start empty.
    pub fn load_or_new(user_id: &str, store: RowStore) -> Result<Self, Error> {
        let (history, last_train_count) = match store.load(user_id)? {
            Some(window) => (window.history, window.last_train_count),
            None => (UserHistory::default(), 0),
        };
        let total_count = history.len();
        // A hand-edited cache file must not break the marker invariant
        let last_train_count = last_train_count.min(total_count);
        Ok(Self {
            user_id: user_id.to_string(),
            store,
            history,
            total_count,
            last_train_count,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Location of this user's persisted history file.
    pub fn cache_path(&self) -> PathBuf {
        self.store.cache_path(&self.user_id)
    }

    /// Full current history length.
    pub fn count(&self) -> usize {
        self.history.len()
    }

    /// Total rows ever appended; tracked separately from [`Self::count`] to
    /// keep the trained-subset arithmetic explicit.
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn last_train_count(&self) -> usize {
        self.last_train_count
    }

    /// Merge a batch of timestamp-normalized rows into the history.
    /// Returns `false` when the batch precedes existing history — a
    /// caller-visible warning condition, not an error. Counters only advance
    /// on a successful merge.
    pub fn append_batch(&mut self, rows: &[Row]) -> bool {
        if !self.history.merge(rows) {
            return false;
        }
        self.total_count = self.history.len();
        true
    }

    /// Persist the current history. A failed save is fatal for the batch;
    /// the caller must not evaluate thresholds on unsaved state.
    pub fn save(&self) -> Result<(), Error> {
        let window = PersistedWindow {
            user_id: self.user_id.clone(),
            last_train_count: self.last_train_count,
            history: self.history.clone(),
        };
        self.store.save(&self.user_id, &window)
    }

    /// The most recent `max_history` rows ascending by timestamp, or the
    /// whole history if it is shorter. `max_history == 0` means unbounded.
    /// An upper bound, not a requirement: never errors.
    pub fn train_window(&self, max_history: usize) -> &[StoredRow] {
        let rows = self.history.rows();
        if max_history == 0 || rows.len() <= max_history {
            rows
        } else {
            &rows[rows.len() - max_history..]
        }
    }

    /// Advance the last-trained marker to the current total. Called by the
    /// policy engine only after a successful emission.
    pub fn mark_trained(&mut self) {
        self.last_train_count = self.total_count;
    }
}
