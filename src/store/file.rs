//! File-backed store: one JSON table per user under
//! `<cache_dir>/rolling-user-data/`, full overwrite on save via
//! write-temp-then-rename so a concurrent load never sees a partial file.

use super::PersistedWindow;
use crate::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

const SUBDIR: &str = "rolling-user-data";

/// Filesystem-safe form of a user id: anything outside a conservative
/// character set becomes `_`, so an id can never escape its directory.
pub fn sanitize_user_id(user_id: &str) -> String {
    user_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct RowStore {
    root: PathBuf,
}

impl RowStore {
    /// Create the store under `cache_dir`, making the directory if needed.
    pub fn new(cache_dir: &Path) -> Result<Self, Error> {
        let root = cache_dir.join(SUBDIR);
        fs::create_dir_all(&root).map_err(|e| Error::storage(&root, e))?;
        Ok(Self { root })
    }

    /// Location of one user's cache file, named from the sanitized user id.
    pub fn cache_path(&self, user_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize_user_id(user_id)))
    }

    /// Read a user's persisted window. `None` when no file exists yet;
    /// an unreadable or corrupt file is a hard error, never partial data.
    pub fn load(&self, user_id: &str) -> Result<Option<PersistedWindow>, Error> {
        let path = self.cache_path(user_id);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::storage(&path, e)),
        };
        let window: PersistedWindow =
            serde_json::from_slice(&data).map_err(|e| Error::storage(&path, e))?;
        Ok(Some(window))
    }

    /// Overwrite a user's persisted window atomically: serialize to a
    /// sibling temp file, then rename over the target.
    pub fn save(&self, user_id: &str, window: &PersistedWindow) -> Result<(), Error> {
        let path = self.cache_path(user_id);
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_vec(window).map_err(|e| Error::storage(&path, e))?;
        fs::write(&tmp, data).map_err(|e| Error::storage(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| Error::storage(&path, e))?;
        Ok(())
    }
}
