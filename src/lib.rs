//! DFP rolling window — streaming digital-fingerprinting history pipeline.
//!
//! Maintains a durable, de-duplicated rolling history of timestamped events
//! per user and decides, per incoming batch, whether enough new data has
//! accumulated to emit a bounded training/inference window downstream.
//!
//! Modular structure:
//! - [`rows`] — Event rows, fingerprints, per-user batches
//! - [`files`] — Batch file input and emitted window output
//! - [`split`] — Per-user splitting of raw record streams
//! - [`store`] — Durable per-user history (file-backed, atomic overwrite)
//! - [`window`] — Per-user window cache and the process-wide cache directory
//! - [`overlap`] — Content-hash overlap detection for emitted windows
//! - [`policy`] — Threshold-driven emission decision engine
//! - [`logging`] — Structured JSON logging

pub mod config;
pub mod error;
pub mod files;
pub mod rows;
pub mod split;
pub mod store;
pub mod window;
pub mod overlap;
pub mod policy;
pub mod logging;

pub use config::DfpConfig;
pub use error::{Error, ViolationReason};
pub use rows::{BatchMode, Row, StoredRow, UserBatch};
pub use split::UserSplitter;
pub use store::{RowStore, UserHistory};
pub use window::{CacheDirectory, UserWindowCache};
pub use policy::{WindowPolicyEngine, WindowState, WindowThresholds};
pub use logging::StructuredLogger;
