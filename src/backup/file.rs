//! Backup files on disk.
//!
//! Writes go through a temp file and a rename so an interrupted export
//! never leaves a truncated backup behind.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::backup::types::{BackupError, BackupResult};

/// Write content to a file atomically.
///
/// 1. Writes content to `<path>.tmp`
/// 2. Calls `fsync` to ensure data is on disk
/// 3. Renames the temp file over the target path
///
/// If any step fails, the original file (if any) remains untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &str) -> BackupResult<()> {
    let temp_path = path.with_extension("json.tmp");

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    fs::rename(&temp_path, path)?;

    Ok(())
}

/// SHA256 of `content`, lowercase hex.
#[must_use]
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Read a backup file and return the document inside it.
///
/// Accepts either a bare document (`{"version":..,"tables":..}`) or the
/// envelope the export endpoint returns (`{"filename":..,"backup":..}`).
///
/// # Errors
///
/// Returns an error if the file can't be read or isn't JSON, or
/// [`BackupError::Validation`] if it holds neither shape.
pub fn read_backup_file(path: &Path) -> BackupResult<Value> {
    let content = fs::read_to_string(path)?;
    let mut value: Value = serde_json::from_str(&content)?;

    if value.get("tables").is_some() {
        return Ok(value);
    }
    match value.get_mut("backup") {
        Some(backup) if backup.is_object() => Ok(backup.take()),
        _ => Err(BackupError::Validation(
            "Backup payload is required".to_string(),
        )),
    }
}
