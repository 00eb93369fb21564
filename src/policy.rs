//! Window policy engine: per-batch decision logic over the cache directory.
//! Streaming batches are merged, persisted, and checked against the history
//! and increment thresholds; payload batches pass through untouched.

use crate::error::Error;
use crate::overlap;
use crate::rows::{BatchMode, Row, UserBatch};
use crate::window::CacheDirectory;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Emission thresholds. `max_history` bounds the emitted window size;
/// zero means unbounded. The bound must still cover each incoming batch,
/// otherwise the overlap check rejects the truncated window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowThresholds {
    pub min_history: usize,
    pub min_increment: usize,
    pub max_history: usize,
}

impl WindowThresholds {
    /// Low-friction inference configuration: emit on every batch once any
    /// history exists.
    pub fn inference(max_history: usize) -> Self {
        Self {
            min_history: 1,
            min_increment: 0,
            max_history,
        }
    }

    /// Training configuration: wait for a significant batch of new rows
    /// before retraining.
    pub fn training(max_history: usize) -> Self {
        Self {
            min_history: 300,
            min_increment: 300,
            max_history,
        }
    }
}

impl Default for WindowThresholds {
    fn default() -> Self {
        Self::training(0)
    }
}

/// Per-batch outcome of the threshold check, recomputed from counters on
/// every call rather than persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// Not enough total history yet.
    AwaitingHistory,
    /// Enough history, but too little new data since the last emission.
    AwaitingIncrement,
    /// Emit a train window.
    Ready,
}

impl WindowState {
    pub fn evaluate(
        count: usize,
        total_count: usize,
        last_train_count: usize,
        thresholds: &WindowThresholds,
    ) -> Self {
        if count < thresholds.min_history {
            WindowState::AwaitingHistory
        } else if total_count - last_train_count < thresholds.min_increment {
            WindowState::AwaitingIncrement
        } else {
            WindowState::Ready
        }
    }
}

pub struct WindowPolicyEngine {
    thresholds: WindowThresholds,
    directory: Arc<CacheDirectory>,
}

impl WindowPolicyEngine {
    /// The directory is injected so independent engines (e.g. one with
    /// training thresholds, one with inference thresholds) can share or
    /// isolate user state explicitly.
    pub fn new(thresholds: WindowThresholds, directory: Arc<CacheDirectory>) -> Self {
        Self {
            thresholds,
            directory,
        }
    }

    pub fn thresholds(&self) -> &WindowThresholds {
        &self.thresholds
    }

    /// Process one batch. Payload batches are returned untouched; streaming
    /// batches either produce an emitted window (re-tagged payload, so it is
    /// never re-windowed downstream) or nothing.
    pub fn process(&self, batch: UserBatch) -> Result<Option<UserBatch>, Error> {
        match batch.mode {
            BatchMode::Payload => Ok(Some(batch)),
            BatchMode::Streaming => self.build_window(batch),
        }
    }

    fn build_window(&self, batch: UserBatch) -> Result<Option<UserBatch>, Error> {
        if batch.is_empty() {
            debug!(user_id = %batch.user_id, "empty batch, nothing to window");
            return Ok(None);
        }
        let started = Instant::now();

        let cache = self.directory.get_or_create(&batch.user_id)?;
        let mut cache = cache.lock().expect("lock");

        if !cache.append_batch(&batch.rows) {
            warn!(
                user_id = %batch.user_id,
                batch_id = %batch.batch_id,
                "incoming data preceded existing history; consider deleting the rolling window cache and restarting"
            );
            return Ok(None);
        }

        cache.save()?;
        debug!(
            user_id = %batch.user_id,
            total = cache.total_count(),
            "saved rolling window cache"
        );

        match WindowState::evaluate(
            cache.count(),
            cache.total_count(),
            cache.last_train_count(),
            &self.thresholds,
        ) {
            WindowState::AwaitingHistory => {
                debug!(
                    user_id = %batch.user_id,
                    count = cache.count(),
                    min_history = self.thresholds.min_history,
                    "not enough data to train"
                );
                return Ok(None);
            }
            WindowState::AwaitingIncrement => {
                debug!(
                    user_id = %batch.user_id,
                    new_rows = cache.total_count() - cache.last_train_count(),
                    min_increment = self.thresholds.min_increment,
                    "not enough new data since last train"
                );
                return Ok(None);
            }
            WindowState::Ready => {}
        }

        let window = cache.train_window(self.thresholds.max_history);
        let (first, last) = overlap::locate(&batch.user_id, &batch.rows, window)?;
        let rows: Vec<Row> = window.iter().map(|r| r.to_row()).collect();
        cache.mark_trained();
        // Persist the advanced marker so a restart does not re-emit this window
        cache.save()?;

        debug!(
            user_id = %batch.user_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            in_rows = batch.len(),
            out_rows = rows.len(),
            span_first = first,
            span_last = last,
            window_start = ?rows.first().map(|r| r.ts),
            window_end = ?rows.last().map(|r| r.ts),
            "rolling window complete"
        );

        Ok(Some(UserBatch {
            batch_id: batch.batch_id,
            user_id: batch.user_id,
            mode: BatchMode::Payload,
            rows,
        }))
    }
}
