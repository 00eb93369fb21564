//! Pipeline driver: scans an input directory for batch files (`.json` array
//! or `.jsonl` lines of records), splits rows per user, runs every batch
//! through the window policy engine, and writes emitted windows under
//! `<cache_dir>/emitted/`. A storage or invariant failure halts that user's
//! stream only; other users keep processing.

use dfp_window::{
    config::DfpConfig,
    error::Error,
    files::{batch_files, parse_rows, write_emission},
    logging::StructuredLogger,
    policy::WindowPolicyEngine,
    split::UserSplitter,
    store::RowStore,
    window::CacheDirectory,
};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

fn main() -> Result<(), Error> {
    let config_path = std::env::var("DFP_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let config = DfpConfig::load(&config_path)?;
    config.validate()?;

    StructuredLogger::init(config.log.json, &config.log.level);
    info!(
        input_dir = %config.input_dir.display(),
        cache_dir = %config.cache_dir.display(),
        min_history = config.thresholds.min_history,
        min_increment = config.thresholds.min_increment,
        max_history = config.thresholds.max_history,
        "dfp rolling window starting"
    );

    let store = RowStore::new(&config.cache_dir)?;
    let directory = Arc::new(CacheDirectory::new(store));
    let engine = WindowPolicyEngine::new(config.thresholds.clone(), Arc::clone(&directory));
    let splitter = UserSplitter::new(&config.columns, config.split.clone());

    let files = batch_files(&config.input_dir);
    info!(files = files.len(), "scanned input directory");

    let mut halted: HashSet<String> = HashSet::new();
    let mut emissions: usize = 0;
    let mut batches: usize = 0;

    for file in &files {
        let rows = match parse_rows(file, &config.columns.timestamp) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "unreadable batch file, skipping");
                continue;
            }
        };

        for batch in splitter.split(rows) {
            if halted.contains(&batch.user_id) {
                continue;
            }
            batches += 1;
            let user_id = batch.user_id.clone();
            match engine.process(batch) {
                Ok(Some(window)) => {
                    info!(
                        user_id = %window.user_id,
                        batch_id = %window.batch_id,
                        rows = window.len(),
                        window_start = ?window.min_ts(),
                        window_end = ?window.max_ts(),
                        "emitting train window"
                    );
                    write_emission(&config.cache_dir, &window)?;
                    emissions += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    // Loud by design: this user needs operator intervention
                    error!(user_id = %user_id, error = %e, "user stream halted");
                    halted.insert(user_id);
                }
            }
        }
    }

    info!(
        files = files.len(),
        batches,
        emissions,
        halted_users = halted.len(),
        resident_users = directory.len(),
        "dfp rolling window complete"
    );
    Ok(())
}
