//! LMDB database integrity checks.
//!
//! Run on startup to detect corruption early, before the node admits records.

use std::path::Path;

use heed::types::Bytes;

use crate::environment::DATABASES;
use crate::{LmdbEnvironment, LmdbError};

/// Summary of an integrity check run.
#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub databases_checked: u32,
    pub total_entries: u64,
    /// Index entries whose content is no longer stored (garbage collected).
    pub missing_content: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check every database, re-hash every stored blob against its key, and count
/// index entries whose content is missing.
///
/// Read failures are recorded in the report rather than causing a hard error.
pub fn check_integrity(env: &LmdbEnvironment) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport::default();
    let rtxn = env.env().read_txn()?;

    for &db_name in DATABASES {
        match env.env().open_database::<Bytes, Bytes>(&rtxn, Some(db_name)) {
            Ok(Some(db)) => {
                report.databases_checked += 1;
                match db.len(&rtxn) {
                    Ok(count) => report.total_entries += count,
                    Err(e) => report
                        .errors
                        .push(format!("failed to read database '{}': {}", db_name, e)),
                }
            }
            Ok(None) => report
                .errors
                .push(format!("database '{}' is missing", db_name)),
            Err(e) => report
                .errors
                .push(format!("failed to open database '{}': {}", db_name, e)),
        }
    }

    for result in env.content_db.iter(&rtxn)? {
        let (key, bytes) = result?;
        let fingerprint = vouch_crypto::fingerprint_of(bytes);
        if fingerprint.digest().as_slice() != key {
            report
                .errors
                .push(format!("content under {} does not match its hash", hex_prefix(key)));
        }
    }

    for result in env.entries_db.iter(&rtxn)? {
        let (key, _) = result?;
        if env.content_db.get(&rtxn, key)?.is_none() {
            report.missing_content += 1;
        }
    }

    Ok(report)
}

fn hex_prefix(key: &[u8]) -> String {
    key.iter().take(4).map(|b| format!("{b:02x}")).collect()
}

/// Check if the LMDB data directory looks valid before opening.
///
/// Returns `Ok(())` for a fresh (nonexistent) directory. Returns an error
/// if the directory exists but `data.mdb` is missing.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    let data_file = path.join("data.mdb");
    if !data_file.exists() {
        return Err(format!(
            "LMDB directory exists but data.mdb is missing at {}",
            path.display()
        ));
    }
    Ok(())
}
