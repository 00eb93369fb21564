//! Splits a parsed record stream into per-user streaming batches, applying
//! skip/only filters and an optional combined generic-user stream.

use crate::config::{ColumnsConfig, SplitConfig};
use crate::rows::{Row, UserBatch};
use std::collections::BTreeMap;
use tracing::debug;

pub struct UserSplitter {
    userid_column: String,
    config: SplitConfig,
}

impl UserSplitter {
    pub fn new(columns: &ColumnsConfig, config: SplitConfig) -> Self {
        Self {
            userid_column: columns.userid.clone(),
            config,
        }
    }

    fn user_of(&self, row: &Row) -> String {
        row.fields
            .get(&self.userid_column)
            .and_then(|v| v.as_str())
            .unwrap_or(&self.config.fallback_username)
            .to_string()
    }

    /// Group rows into per-user batches, user ids in sorted order. Rows keep
    /// their input order within each batch; the generic stream, when enabled,
    /// receives every surviving row under the fallback username.
    pub fn split(&self, rows: Vec<Row>) -> Vec<UserBatch> {
        let total = rows.len();
        let mut per_user: BTreeMap<String, Vec<Row>> = BTreeMap::new();
        let mut generic: Vec<Row> = Vec::new();

        for row in rows {
            let user = self.user_of(&row);
            if self.config.skip_users.contains(&user) {
                continue;
            }
            if !self.config.only_users.is_empty() && !self.config.only_users.contains(&user) {
                continue;
            }
            if self.config.include_generic {
                generic.push(row.clone());
            }
            if self.config.include_individual {
                per_user.entry(user).or_default().push(row);
            }
        }

        let mut batches: Vec<UserBatch> = Vec::new();
        if self.config.include_generic && !generic.is_empty() {
            batches.push(UserBatch::streaming(
                self.config.fallback_username.clone(),
                generic,
            ));
        }
        for (user, user_rows) in per_user {
            if user == self.config.fallback_username && self.config.include_generic {
                // Already covered by the combined stream
                continue;
            }
            batches.push(UserBatch::streaming(user, user_rows));
        }

        debug!(
            input_rows = total,
            batches = batches.len(),
            "split records into per-user batches"
        );
        batches
    }
}
