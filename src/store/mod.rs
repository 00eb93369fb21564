//! Persistent row store: durable, de-duplicated, timestamp-ordered history
//! per user, one serialized table file per user under the cache root.

mod file;
mod history;

pub use file::{sanitize_user_id, RowStore};
pub use history::{PersistedWindow, UserHistory};
