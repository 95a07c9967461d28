//! Backup command implementations.
//!
//! `export` writes the snapshot as a bare document, the same shape the web
//! client saves from the export endpoint. `import` accepts that or the full
//! `{filename, backup}` envelope.

use crate::backup::{
    atomic_write, read_backup_file, sha256_hex, BackupEngine, TableAccess, TABLE_ORDER,
};
use crate::cli::BackupCommands;
use crate::error::Result;
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::open_storage;

/// Execute backup commands.
pub fn execute(command: &BackupCommands, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    match command {
        BackupCommands::Export { output, stdout } => {
            export(output.as_deref(), *stdout, db_path, json)
        }
        BackupCommands::Import { file } => import(file, db_path, json),
        BackupCommands::Tables => tables(db_path, json),
    }
}

#[derive(Serialize)]
struct ExportOutput {
    path: PathBuf,
    generated_at: String,
    total_rows: usize,
    counts: BTreeMap<String, usize>,
    sha256: String,
}

/// Where the backup file lands: inside `output` if it's a directory,
/// at `output` if it names a file, or in the working directory.
fn export_target(output: Option<&Path>, filename: &str) -> PathBuf {
    match output {
        Some(path) if path.is_dir() => path.join(filename),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(filename),
    }
}

fn export(output: Option<&Path>, stdout: bool, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let mut storage = open_storage(db_path)?;
    let envelope = BackupEngine::new(&mut storage).export_envelope()?;

    if stdout {
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        return Ok(());
    }

    let content = serde_json::to_string_pretty(&envelope.backup)?;
    let path = export_target(output, &envelope.filename);
    atomic_write(&path, &content)?;
    tracing::info!(path = %path.display(), bytes = content.len(), "backup written");

    let backup = &envelope.backup;
    let result = ExportOutput {
        path,
        generated_at: backup.generated_at.clone(),
        total_rows: backup.total_rows(),
        counts: backup
            .tables
            .iter()
            .map(|(table, rows)| (table.clone(), rows.len()))
            .collect(),
        sha256: sha256_hex(content.as_bytes()),
    };

    if json {
        println!("{}", serde_json::to_string(&result)?);
    } else if !crate::is_quiet() {
        println!("{} {}", "Backup written:".green().bold(), result.path.display());
        println!();
        for table in TABLE_ORDER {
            let count = backup.row_count(table).unwrap_or(0);
            println!("  {table:<16} {count}");
        }
        println!();
        println!("  Total:  {} rows", result.total_rows);
        println!("  SHA256: {}", result.sha256.dimmed());
    }

    Ok(())
}

fn import(file: &Path, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let document = read_backup_file(file)?;
    let mut storage = open_storage(db_path)?;
    let summary = BackupEngine::new(&mut storage).import(&document)?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "file": file.display().to_string(),
            "restored": summary,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else if !crate::is_quiet() {
        if summary.tables.is_empty() {
            println!("No known tables in: {}", file.display());
            return Ok(());
        }
        println!("{} {}", "Restored from:".green().bold(), file.display());
        println!();
        for table in &summary.tables {
            let count = summary.counts.get(table).copied().unwrap_or(0);
            println!("  {table:<16} {count}");
        }
        println!();
        println!("  Total: {} rows", summary.total_rows());
    }

    Ok(())
}

#[derive(Serialize)]
struct TableCount {
    table: &'static str,
    rows: u64,
}

fn tables(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let mut storage = open_storage(db_path)?;

    let mut counts = Vec::with_capacity(TABLE_ORDER.len());
    for &table in TABLE_ORDER {
        counts.push(TableCount {
            table,
            rows: storage.count(table)?,
        });
    }

    if json {
        println!("{}", serde_json::to_string(&counts)?);
    } else if !crate::is_quiet() {
        println!("{}", "Tables (restore order)".cyan().bold());
        for (position, entry) in counts.iter().enumerate() {
            println!("  {:>2}. {:<16} {}", position + 1, entry.table, entry.rows);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::storage::SqliteStorage;
    use serde_json::Value;
    use tempfile::TempDir;

    fn seeded_db(dir: &TempDir) -> PathBuf {
        let db_path = dir.path().join("kai.db");
        let storage = SqliteStorage::open(&db_path).unwrap();
        storage
            .conn()
            .execute_batch(
                "INSERT INTO goals (id, name) VALUES (1, 'Learn X');
                 INSERT INTO phases (id, goal_id, name) VALUES (1, 1, 'Basics');",
            )
            .unwrap();
        db_path
    }

    #[test]
    fn test_export_target() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            export_target(Some(dir.path()), "kai-backup-x.json"),
            dir.path().join("kai-backup-x.json")
        );
        let file = dir.path().join("mine.json");
        assert_eq!(export_target(Some(&file), "kai-backup-x.json"), file);
        assert_eq!(
            export_target(None, "kai-backup-x.json"),
            PathBuf::from("kai-backup-x.json")
        );
    }

    #[test]
    fn test_export_writes_bare_document() {
        let dir = TempDir::new().unwrap();
        let db_path = seeded_db(&dir);
        let out = dir.path().join("backup.json");

        export(Some(&out), false, Some(&db_path), true).unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written["version"], 1);
        assert_eq!(written["tables"]["goals"][0]["name"], "Learn X");
        assert_eq!(written["tables"]["tasks"], serde_json::json!([]));
    }

    #[test]
    fn test_export_then_import_restores() {
        let dir = TempDir::new().unwrap();
        let db_path = seeded_db(&dir);
        let out = dir.path().join("backup.json");
        export(Some(&out), false, Some(&db_path), true).unwrap();

        {
            let storage = SqliteStorage::open(&db_path).unwrap();
            storage
                .conn()
                .execute_batch("DELETE FROM phases; DELETE FROM goals;")
                .unwrap();
        }

        import(&out, Some(&db_path), true).unwrap();

        let mut storage = SqliteStorage::open(&db_path).unwrap();
        assert_eq!(storage.count("goals").unwrap(), 1);
        assert_eq!(storage.count("phases").unwrap(), 1);
    }

    #[test]
    fn test_import_invalid_file_leaves_store() {
        let dir = TempDir::new().unwrap();
        let db_path = seeded_db(&dir);
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"something": "else"}"#).unwrap();

        let result = import(&bad, Some(&db_path), true);
        assert!(matches!(result, Err(Error::Backup(_))));

        let mut storage = SqliteStorage::open(&db_path).unwrap();
        assert_eq!(storage.count("goals").unwrap(), 1);
    }

    #[test]
    fn test_commands_require_database() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.db");

        assert!(matches!(
            tables(Some(&missing), true),
            Err(Error::NotInitialized)
        ));
        assert!(!missing.exists());
    }
}
