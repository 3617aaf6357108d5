use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "chainsync")]
#[command(about = "Follow a Cardano node over chain-sync and block-fetch", long_about = None)]
pub struct Cli {
    /// Path to the configuration file (TOML, YAML or JSON)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Network name (mainnet, preprod, preview, sanchonet)
    #[arg(short, long)]
    pub network: Option<String>,

    /// Explicit network magic, overrides the network name
    #[arg(long, value_name = "MAGIC")]
    pub network_magic: Option<u32>,

    /// Era to start chain-sync at
    #[arg(long, value_name = "ERA")]
    pub start_era: Option<String>,

    /// Start chain-sync at the current chain tip
    #[arg(long)]
    pub tip: bool,

    /// Fetch the available block range in one batch (node-to-node only)
    #[arg(long)]
    pub bulk: bool,

    /// Show the available block range and exit
    #[arg(long)]
    pub range: bool,

    /// Local node socket (node-to-client)
    #[arg(long, value_name = "PATH")]
    pub socket_path: Option<PathBuf>,

    /// Remote node address (node-to-node), e.g. relay.example:3001
    #[arg(long, value_name = "HOST:PORT")]
    pub address: Option<String>,

    /// Serve a recorded chain from a JSON file instead of a live node
    #[arg(long, value_name = "FILE")]
    pub replay: Option<PathBuf>,

    /// Print transaction details for each block
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}
