//! Error taxonomy: storage failures and invariant violations are fatal for the
//! affected user stream; configuration errors are fatal at construction only.
//! Out-of-order batch arrival is a soft condition (a `false` return), not an error.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Durable I/O failure (read or write). No partial state is committed.
    #[error("storage failure at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: StorageError,
    },

    /// Overlap-detection failure: the emitted window does not contain the
    /// incoming batch as a contiguous tail. Retrying reproduces the same
    /// corruption; the user's cache file requires manual remediation.
    #[error("rolling window invariant violated for user {user_id}: {reason}")]
    InvariantViolation {
        user_id: String,
        reason: ViolationReason,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn storage(path: &Path, source: impl Into<StorageError>) -> Self {
        Error::Storage {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }

    pub fn violation(user_id: &str, reason: ViolationReason) -> Self {
        Error::InvariantViolation {
            user_id: user_id.to_string(),
            reason,
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("corrupt cache file: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Reason codes for [`Error::InvariantViolation`], distinguishable by callers
/// rather than by message string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ViolationReason {
    #[error("first incoming row has no fingerprint match in the train window")]
    LeadRowMissing,
    #[error("last incoming row has no fingerprint match in the train window")]
    TailRowMissing,
    #[error("window span covers {found} rows but the incoming batch has {expected}; history overlaps non-contiguously")]
    NonContiguousSpan { expected: usize, found: usize },
}
