//! Run the backup API.

use crate::config::ServerConfig;
use crate::error::Result;
use crate::server;
use std::path::PathBuf;

use super::open_storage;

/// Execute the serve command. Blocks until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the database is
/// missing, or the server can't bind.
pub fn execute(
    db_path: Option<&PathBuf>,
    bind: Option<&str>,
    token: Option<&str>,
) -> Result<()> {
    let config = ServerConfig::resolve(bind, token)?;
    if config.uses_default_token() {
        tracing::warn!("API_SHARED_TOKEN is not set; using the default token");
    }

    let storage = open_storage(db_path)?;

    if !crate::is_quiet() {
        eprintln!("Serving Kai backup API on http://{}", config.bind);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(server::serve(config, storage))
}
