//! `conduit` - command-line front end for the connection broker
//!
//! Results go to stdout; logs go to stderr and a rolling JSON file.

mod commands;
mod logging;
mod output;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use conduit_connection::{
    ConfigStore, ConnectionRegistry, KeyringSecretStore, MemorySecretStore, QueryHistory,
    SecretStore,
};
use conduit_providers::ProviderRegistry;
use std::path::PathBuf;
use std::sync::Arc;

use crate::commands::Command;
use crate::logging::LoggingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogProfile {
    Production,
    Development,
    Testing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SecretBackend {
    /// OS keychain
    Keyring,
    /// Process memory only; nothing survives the run
    Memory,
}

/// Multi-protocol connection broker
#[derive(Parser)]
#[command(name = "conduit")]
#[command(version, about)]
struct Cli {
    /// Configuration file holding saved connections
    #[arg(long, global = true, env = "CONDUIT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level for conduit crates (RUST_LOG overrides)
    #[arg(long, global = true, env = "CONDUIT_LOG_LEVEL", value_name = "LEVEL")]
    log_level: Option<String>,

    /// Logging preset
    #[arg(long, global = true, value_enum)]
    log_profile: Option<LogProfile>,

    /// Where credentials are kept
    #[arg(long, global = true, env = "CONDUIT_SECRETS", value_enum, default_value = "keyring")]
    secrets: SecretBackend,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn logging_config(&self) -> LoggingConfig {
        let profile = self.log_profile.unwrap_or(if cfg!(debug_assertions) {
            LogProfile::Development
        } else {
            LogProfile::Production
        });
        let config = match profile {
            LogProfile::Production => LoggingConfig::production(),
            LogProfile::Development => LoggingConfig::development(),
            LogProfile::Testing => LoggingConfig::testing(),
        };
        match &self.log_level {
            Some(level) => config.with_level(level),
            None => config,
        }
    }

    fn config_store(&self) -> ConfigStore {
        match &self.config {
            Some(path) => ConfigStore::at(path),
            None => ConfigStore::default_location(),
        }
    }

    fn secret_store(&self) -> Arc<dyn SecretStore> {
        match self.secrets {
            SecretBackend::Keyring => Arc::new(KeyringSecretStore::new()),
            SecretBackend::Memory => Arc::new(MemorySecretStore::new()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.logging_config()).context("failed to initialize logging")?;

    let store = cli.config_store();
    if store.path().is_none() {
        anyhow::bail!("no configuration directory available; pass --config <FILE>");
    }

    let history = Arc::new(QueryHistory::new());
    let registry = ConnectionRegistry::builder()
        .config_store(store)
        .secret_store(cli.secret_store())
        .providers(Arc::new(ProviderRegistry::with_defaults()))
        .query_logger(history.clone())
        .build()
        .await;

    let result = commands::run(&registry, &history, cli.command).await;
    registry.shutdown().await;
    result
}
