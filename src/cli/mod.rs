//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Kai - backup and restore for the personal productivity tracker
#[derive(Parser, Debug)]
#[command(name = "kai", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.kai/data/kai.db)
    #[arg(long, global = true, env = "KAI_DB")]
    pub db: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the Kai database
    Init {
        /// Overwrite existing database
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Export or restore a full backup
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },

    /// Serve the backup API over HTTP
    Serve {
        /// Address to listen on (default: 127.0.0.1:8080)
        #[arg(long, env = "KAI_BIND")]
        bind: Option<String>,

        /// Shared bearer token
        #[arg(long, env = "API_SHARED_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// Backup Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum BackupCommands {
    /// Snapshot every table to a JSON file
    Export {
        /// Output directory or file (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the export envelope to stdout instead of writing a file
        #[arg(long, conflicts_with = "output")]
        stdout: bool,
    },

    /// Replace every table with the contents of a backup file
    Import {
        /// Backup file (bare document or export envelope)
        file: PathBuf,
    },

    /// List backed-up tables in restore order with row counts
    Tables,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_backup_import() {
        let cli = Cli::parse_from(["kai", "--db", "/tmp/k.db", "backup", "import", "b.json"]);
        match cli.command {
            Commands::Backup {
                command: BackupCommands::Import { file },
            } => assert_eq!(file, PathBuf::from("b.json")),
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/k.db")));
    }
}
