//! Batch file I/O for the driver: input directory scanning, record parsing,
//! and emitted window output. Corrupt input is loud — a malformed file or
//! line gets a warning with its location, never a silent drop.

use crate::error::Error;
use crate::rows::{Row, UserBatch};
use crate::store::sanitize_user_id;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Batch files under `input_dir` (`.json` array or `.jsonl` lines).
pub fn batch_files(input_dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(input_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("json") | Some("jsonl")
            )
        })
        .collect();
    // Upstream batching names files by time window; lexicographic order is arrival order
    files.sort();
    files
}

/// Parse one batch file into rows. A malformed `.json` body, `.jsonl` line,
/// or record is warned about (with file and line) and skipped; only cleanly
/// parsed records survive. I/O failure reading the file is the caller's error.
pub fn parse_rows(path: &Path, timestamp_column: &str) -> std::io::Result<Vec<Row>> {
    let data = std::fs::read_to_string(path)?;
    let mut records: Vec<serde_json::Value> = Vec::new();
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        match serde_json::from_str(&data) {
            Ok(parsed) => records = parsed,
            Err(e) => warn!(file = %path.display(), error = %e, "malformed batch file, skipping"),
        }
    } else {
        for (idx, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(value) => records.push(value),
                Err(e) => warn!(
                    file = %path.display(),
                    line = idx + 1,
                    error = %e,
                    "skipping malformed record line"
                ),
            }
        }
    }

    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        match Row::from_record(record, timestamp_column) {
            Ok(row) => rows.push(row),
            Err(e) => warn!(file = %path.display(), error = %e, "skipping bad record"),
        }
    }
    Ok(rows)
}

/// Write an emitted window under `<cache_dir>/emitted/`, named from the
/// sanitized user id so input data cannot steer the path. Returns the
/// written location.
pub fn write_emission(cache_dir: &Path, window: &UserBatch) -> Result<PathBuf, Error> {
    let out_dir = cache_dir.join("emitted");
    std::fs::create_dir_all(&out_dir).map_err(|e| Error::storage(&out_dir, e))?;
    let path = out_dir.join(format!(
        "{}-{}.json",
        sanitize_user_id(&window.user_id),
        window.batch_id
    ));
    let data = serde_json::to_vec(window).map_err(|e| Error::storage(&path, e))?;
    std::fs::write(&path, data).map_err(|e| Error::storage(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scans_and_orders_batch_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.jsonl", "a.json", "ignored.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let files = batch_files(dir.path());
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.json", "b.jsonl"]);
    }

    #[test]
    fn parses_json_array_and_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let array = dir.path().join("a.json");
        std::fs::write(&array, r#"[{"timestamp": 1659312000, "username": "alice"}]"#).unwrap();
        assert_eq!(parse_rows(&array, "timestamp").unwrap().len(), 1);

        let lines = dir.path().join("b.jsonl");
        std::fs::write(
            &lines,
            "{\"timestamp\": 1659312000, \"username\": \"alice\"}\n\n{\"timestamp\": 1659312060, \"username\": \"bob\"}\n",
        )
        .unwrap();
        assert_eq!(parse_rows(&lines, "timestamp").unwrap().len(), 2);
    }

    #[test]
    fn malformed_json_file_yields_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("truncated.json");
        std::fs::write(&path, r#"[{"timestamp": 1659312000, "username": "alice"}"#).unwrap();
        assert!(parse_rows(&path, "timestamp").unwrap().is_empty());
    }

    #[test]
    fn malformed_jsonl_line_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.jsonl");
        std::fs::write(
            &path,
            "{\"timestamp\": 1659312000, \"username\": \"alice\"}\n{oops\n{\"timestamp\": 1659312060, \"username\": \"bob\"}\n",
        )
        .unwrap();
        let rows = parse_rows(&path, "timestamp").unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn emission_path_cannot_escape_emitted_dir() {
        let dir = tempfile::tempdir().unwrap();
        let row = Row::from_record(json!({"timestamp": 1659312000, "x": 1}), "timestamp").unwrap();
        let window = UserBatch::payload("../../escaped", vec![row]);
        let path = write_emission(dir.path(), &window).unwrap();
        assert_eq!(path.parent().unwrap(), dir.path().join("emitted"));
        assert!(path.exists());
        assert!(!dir.path().parent().unwrap().join(format!("escaped-{}.json", window.batch_id)).exists());
    }
}
