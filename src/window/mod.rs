//! Per-user rolling window state: the in-memory cache wrapping one user's
//! persisted history, and the process-wide directory of those caches.

mod cache;
mod directory;

pub use cache::UserWindowCache;
pub use directory::CacheDirectory;
