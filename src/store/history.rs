//! In-memory form of one user's persisted history: rows sorted ascending by
//! timestamp, each carrying its content fingerprint.

use crate::rows::{Row, StoredRow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserHistory {
    rows: Vec<StoredRow>,
    /// Column set recorded from the first row seen; later drift is warned on,
    /// reconciliation is an upstream concern.
    columns: Vec<String>,
}

impl UserHistory {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[StoredRow] {
        &self.rows
    }

    pub fn min_ts(&self) -> Option<DateTime<Utc>> {
        self.rows.first().map(|r| r.ts)
    }

    pub fn max_ts(&self) -> Option<DateTime<Utc>> {
        self.rows.last().map(|r| r.ts)
    }

    /// Merge a batch of new rows into this history.
    ///
    /// Returns `false` (leaving the history untouched) when the history is
    /// non-empty and any incoming row precedes its minimum timestamp — the
    /// batch arrived out of order and must be dropped by the caller.
    ///
    /// Otherwise rows already present (by fingerprint) are dropped, the rest
    /// are appended, and the history is re-sorted with a stable sort: rows
    /// sharing a timestamp keep existing-before-incoming order, and incoming
    /// rows keep their batch order.
    pub fn merge(&mut self, incoming: &[Row]) -> bool {
        if incoming.is_empty() {
            return true;
        }
        if let Some(min_ts) = self.min_ts() {
            if incoming.iter().any(|r| r.ts < min_ts) {
                return false;
            }
        }

        self.check_schema(incoming);

        let mut seen: HashSet<u64> = self.rows.iter().map(|r| r.row_hash).collect();
        let before = self.rows.len();
        for row in incoming {
            let stored = StoredRow::from(row.clone());
            if seen.insert(stored.row_hash) {
                self.rows.push(stored);
            }
        }
        let dropped = incoming.len() - (self.rows.len() - before);
        if dropped > 0 {
            debug!(dropped, "dropped already-observed rows during merge");
        }
        self.rows.sort_by_key(|r| r.ts);
        true
    }

    fn check_schema(&mut self, incoming: &[Row]) {
        let Some(first) = incoming.first() else { return };
        if self.columns.is_empty() {
            self.columns = first.fields.keys().cloned().collect();
            return;
        }
        let drifted = first.fields.len() != self.columns.len()
            || !first.fields.keys().zip(&self.columns).all(|(a, b)| a == b);
        if drifted {
            warn!(
                expected = ?self.columns,
                got = ?first.fields.keys().collect::<Vec<_>>(),
                "incoming batch schema differs from recorded history schema"
            );
        }
    }
}

/// On-disk layout of one user's cache file: the history table plus the
/// training bookkeeping that must survive a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedWindow {
    pub user_id: String,
    pub last_train_count: usize,
    pub history: UserHistory,
}
