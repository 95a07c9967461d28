//! Print the binary version along with the formats it reads and writes.

use crate::backup::BACKUP_VERSION;
use crate::error::Result;
use crate::storage::schema::CURRENT_SCHEMA_VERSION;
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput {
    version: &'static str,
    backup_format: u32,
    schema: i32,
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let output = VersionOutput {
        version: env!("CARGO_PKG_VERSION"),
        backup_format: BACKUP_VERSION,
        schema: CURRENT_SCHEMA_VERSION,
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!(
            "kai {} (backup format v{}, schema v{})",
            output.version, output.backup_format, output.schema
        );
    }
    Ok(())
}
