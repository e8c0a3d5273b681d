//! marina - slip occupancy tracking
//!
//! Command-line front end over `marina-core`. Every command prints JSON to
//! stdout; logs go to stderr.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use marina_core::Marina;
use marina_core::config::{MarinaConfig, StorageBackend};

mod commands;

/// marina - slip occupancy tracking
#[derive(Parser, Debug)]
#[command(name = "marina")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to marina configuration file
    ///
    /// When the file is missing, slips are kept in `marina.db` in the
    /// working directory.
    #[arg(short, long, default_value = "marina.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    // === Slip management ===
    /// Slip CRUD
    #[command(subcommand)]
    Slip(SlipCommands),

    // === Occupancy ===
    /// Dock a boat in the first vacant slip, or in a given slip
    Arrive {
        /// Boat identifier
        boat: String,

        /// Slip identifier to dock in
        #[arg(long)]
        slip: Option<String>,
    },

    /// Record a boat leaving its slip
    Depart {
        /// Boat identifier
        boat: String,
    },

    /// Erase every reference to a boat that was deleted
    RemoveBoat {
        /// Boat identifier
        boat: String,
    },
}

#[derive(Subcommand, Debug)]
enum SlipCommands {
    /// List all slips
    #[command(alias = "ls")]
    List,

    /// Create a vacant slip with a unique number
    Create {
        /// Slip number
        number: u32,
    },

    /// Show one slip
    Show {
        /// Slip identifier
        id: String,
    },

    /// Delete a slip
    Delete {
        /// Slip identifier
        id: String,
    },
}

/// Database used when no configuration file exists.
const DEFAULT_DB_PATH: &str = "marina.db";

fn load_config(path: &Path) -> Result<MarinaConfig> {
    if path.exists() {
        return MarinaConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()));
    }

    let mut config = MarinaConfig::default();
    config.storage.backend = StorageBackend::Sqlite;
    config.storage.path = Some(PathBuf::from(DEFAULT_DB_PATH));
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    let level = cli.log_level.as_deref().unwrap_or(&config.log.level);
    marina_core::log::init(level).context("failed to initialize logging")?;

    let marina = Marina::from_config(&config).context("failed to open storage")?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    rt.block_on(async {
        match cli.command {
            Commands::Slip(cmd) => match cmd {
                SlipCommands::List => commands::slip::list(&marina).await,
                SlipCommands::Create { number } => commands::slip::create(&marina, number).await,
                SlipCommands::Show { id } => commands::slip::show(&marina, &id).await,
                SlipCommands::Delete { id } => commands::slip::delete(&marina, &id).await,
            },
            Commands::Arrive { boat, slip } => {
                commands::boat::arrive(&marina, &boat, slip.as_deref()).await
            },
            Commands::Depart { boat } => commands::boat::depart(&marina, &boat).await,
            Commands::RemoveBoat { boat } => commands::boat::remove(&marina, &boat).await,
        }
    })
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_arrive_with_slip() {
        let cli = Cli::try_parse_from(["marina", "arrive", "boat-1", "--slip", "s-1"]).unwrap();
        match cli.command {
            Commands::Arrive { boat, slip } => {
                assert_eq!(boat, "boat-1");
                assert_eq!(slip.as_deref(), Some("s-1"));
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_slip_create() {
        let cli = Cli::try_parse_from(["marina", "slip", "create", "7"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Slip(SlipCommands::Create { number: 7 })
        ));
    }

    #[test]
    fn test_rejects_negative_slip_number() {
        assert!(Cli::try_parse_from(["marina", "slip", "create", "-1"]).is_err());
    }

    #[test]
    fn test_missing_config_falls_back_to_sqlite() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.path, Some(PathBuf::from(DEFAULT_DB_PATH)));
        assert_eq!(config.occupancy, MarinaConfig::default().occupancy);
    }

    #[test]
    fn test_config_file_is_loaded() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("marina.toml");
        std::fs::write(&path, "[occupancy]\nconflict_retries = 9\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.occupancy.conflict_retries, 9);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }
}
