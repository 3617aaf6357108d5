use anyhow::Result;
use chainsync_client::SyncConfig;
use chainsync_common::utils::config::{load_layered, ENV_PREFIX};
use chainsync_common::utils::logging::LoggingConfig;
use serde::Deserialize;
use std::path::PathBuf;

use crate::cli::Cli;

/// Everything the binary reads from file, environment and flags.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Recorded chain served in place of a node.
    #[serde(default)]
    pub replay_file: Option<PathBuf>,

    #[serde(default)]
    pub verbose: bool,
}

/// Defaults, then the config file, then `CARDANO_NODE_*`, then flags.
pub fn load_app_config(cli: &Cli) -> Result<AppConfig> {
    let mut config: AppConfig = load_layered(cli.config.as_deref(), ENV_PREFIX)?;
    apply_overrides(&mut config, cli);
    Ok(config)
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(network) = &cli.network {
        config.sync.network = Some(network.clone());
    }
    if let Some(magic) = cli.network_magic {
        config.sync.network_magic = Some(magic);
    }
    if let Some(era) = &cli.start_era {
        config.sync.start_era = era.clone();
    }
    if let Some(path) = &cli.socket_path {
        config.sync.socket_path = path.clone();
    }
    if let Some(address) = &cli.address {
        config.sync.address = Some(address.clone());
    }
    if let Some(replay) = &cli.replay {
        config.replay_file = Some(replay.clone());
    }

    // Flags only switch things on
    config.sync.tip |= cli.tip;
    config.sync.bulk |= cli.bulk;
    config.sync.block_range |= cli.range;
    config.verbose |= cli.verbose;
    if cli.debug {
        config.logging.level = "debug".to_string();
    }
}
