//! Event rows and per-user batches flowing through the rolling window.
//! Rows carry a timezone-aware timestamp plus arbitrary feature columns;
//! a content fingerprint locates rows across merge and reload boundaries.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// One observed event for one user. `fields` is the full feature column set,
/// keyed by column name; BTreeMap gives a canonical key order so fingerprints
/// are independent of load order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub ts: DateTime<Utc>,
    pub fields: BTreeMap<String, Value>,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("record is missing timestamp column {0:?}")]
    MissingTimestamp(String),
    #[error("timestamp column {column:?} is not a recognized encoding: {value}")]
    BadTimestamp { column: String, value: Value },
}

impl Row {
    /// Build a row from a raw JSON record, extracting and normalizing the
    /// configured timestamp column. Accepted encodings: RFC 3339 (any offset),
    /// naive datetime (treated as UTC), epoch seconds (integer or float),
    /// epoch milliseconds.
    pub fn from_record(record: Value, timestamp_column: &str) -> Result<Self, RecordError> {
        let Value::Object(map) = record else {
            return Err(RecordError::NotAnObject);
        };
        let mut fields: BTreeMap<String, Value> = map.into_iter().collect();
        let raw = fields
            .remove(timestamp_column)
            .ok_or_else(|| RecordError::MissingTimestamp(timestamp_column.to_string()))?;
        let ts = parse_timestamp(&raw).ok_or_else(|| RecordError::BadTimestamp {
            column: timestamp_column.to_string(),
            value: raw,
        })?;
        Ok(Self { ts, fields })
    }

    /// Deterministic content hash over timestamp and all feature columns.
    /// Stable across process restarts: same content, same fingerprint.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(self.ts.to_rfc3339().as_bytes());
        hasher.update(b"\n");
        // BTreeMap serializes keys in sorted order
        hasher.update(serde_json::to_string(&self.fields).unwrap_or_default().as_bytes());
        let digest = hasher.finalize();
        u64::from_be_bytes(digest[..8].try_into().expect("sha256 digest is 32 bytes"))
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
                if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
                    return Some(Utc.from_utc_datetime(&naive));
                }
            }
            None
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                // Heuristic: magnitudes past the year-30000 epoch are milliseconds
                if i.abs() >= 1_000_000_000_000 {
                    Utc.timestamp_millis_opt(i).single()
                } else {
                    Utc.timestamp_opt(i, 0).single()
                }
            } else {
                let secs = n.as_f64()?;
                let whole = secs.floor() as i64;
                let nanos = ((secs - whole as f64) * 1e9) as u32;
                Utc.timestamp_opt(whole, nanos).single()
            }
        }
        _ => None,
    }
}

/// A row as persisted in a user's history file: the feature columns, the
/// timestamp, and the derived fingerprint column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRow {
    pub ts: DateTime<Utc>,
    pub fields: BTreeMap<String, Value>,
    #[serde(rename = "_row_hash")]
    pub row_hash: u64,
}

impl From<Row> for StoredRow {
    fn from(row: Row) -> Self {
        let row_hash = row.fingerprint();
        Self {
            ts: row.ts,
            fields: row.fields,
            row_hash,
        }
    }
}

impl StoredRow {
    pub fn to_row(&self) -> Row {
        Row {
            ts: self.ts,
            fields: self.fields.clone(),
        }
    }
}

/// Processing mode tag carried by every batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// Still subject to windowing and threshold policy.
    Streaming,
    /// Already windowed; passes through the policy engine untouched.
    Payload,
}

/// A batch of newly observed rows for exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBatch {
    pub batch_id: Uuid,
    pub user_id: String,
    pub mode: BatchMode,
    pub rows: Vec<Row>,
}

impl UserBatch {
    pub fn streaming(user_id: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            user_id: user_id.into(),
            mode: BatchMode::Streaming,
            rows,
        }
    }

    pub fn payload(user_id: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            user_id: user_id.into(),
            mode: BatchMode::Payload,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn min_ts(&self) -> Option<DateTime<Utc>> {
        self.rows.iter().map(|r| r.ts).min()
    }

    pub fn max_ts(&self) -> Option<DateTime<Utc>> {
        self.rows.iter().map(|r| r.ts).max()
    }
}
