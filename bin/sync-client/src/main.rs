use std::path::PathBuf;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use config::ClientConfig;
use rollup_sync_block_source::RollupId;
use rollup_sync_utils::config::load_config;

mod commands;
mod config;

// CONSTANTS
// ================================================================================================

const CLIENT_CONFIG_FILE_PATH: &str = "rollup-sync.toml";

/// Tracing target of the client binary.
const COMPONENT: &str = "rollup-sync";

// COMMANDS
// ================================================================================================

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Derives the account controlled by a private key
    ///
    /// A random key is generated if none is given. The generated key is printed so the account
    /// can be used again.
    DeriveKey {
        /// Hex encoded private key
        #[arg(short, long, value_name = "HEX")]
        private_key: Option<String>,

        /// Account nonce
        #[arg(short, long, default_value_t = 0)]
        nonce: u32,

        /// Alias to bind to the account
        #[arg(short, long)]
        alias: Option<String>,
    },

    /// Follows a locally produced rollup chain
    ///
    /// Backfills every block from the starting rollup, then streams new blocks as they are
    /// produced and advances the account's sync horizon with each one.
    Follow {
        #[arg(short, long, value_name = "FILE", default_value = CLIENT_CONFIG_FILE_PATH)]
        config: PathBuf,

        /// Hex encoded private key of the account to sync. Random if not given.
        #[arg(short, long, value_name = "HEX")]
        private_key: Option<String>,

        /// Rollup to start from. Genesis if not given.
        #[arg(short, long, value_name = "ROLLUP_ID")]
        from: Option<u32>,

        /// Stop after this many blocks. Runs until interrupted if not given.
        #[arg(short, long)]
        blocks: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rollup_sync_utils::logging::setup_tracing()?;

    let cli = Cli::parse();

    match cli.command {
        Command::DeriveKey { private_key, nonce, alias } => {
            commands::derive_key(private_key.as_deref(), nonce, alias.as_deref())
        },
        Command::Follow { config, private_key, from, blocks } => {
            let config: ClientConfig = load_config(&config).map_err(|err| {
                anyhow!("failed to load config file `{}`: {err}", config.display())
            })?;
            commands::follow(config, private_key.as_deref(), from.map(RollupId::new), blocks).await
        },
    }
}
