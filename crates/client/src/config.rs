use chainsync_common::eras::{GENESIS_ERA, UNKNOWN_NETWORK};
use chainsync_common::networks::{self, DEFAULT_NETWORK};
use chainsync_common::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::connection::{DialOptions, Transport};

/// How blocks are obtained once the start point is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncMode {
    /// Follow the tip through the chain-sync subscription.
    Streaming,
    /// Stop chain-sync and fetch the whole available range in one request.
    Bulk,
}

/// Chain-sync run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Network name (mainnet, preprod, preview, ...).
    #[serde(default)]
    pub network: Option<String>,

    /// Explicit handshake magic; wins over the network name.
    #[serde(default)]
    pub network_magic: Option<u32>,

    /// Era to start chain-sync at.
    #[serde(default = "default_start_era")]
    pub start_era: String,

    /// Start at the peer's current tip instead of an era anchor.
    #[serde(default)]
    pub tip: bool,

    /// Fetch the available range in bulk (node-to-node only).
    #[serde(default)]
    pub bulk: bool,

    /// Only report the available block range and exit.
    #[serde(default)]
    pub block_range: bool,

    /// Local node socket (node-to-client).
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Remote node address (node-to-node). Takes precedence over the socket.
    #[serde(default)]
    pub address: Option<String>,

    /// Chain-sync pipelining depth.
    #[serde(default = "default_pipeline_limit")]
    pub pipeline_limit: usize,

    #[serde(default = "default_keep_alive")]
    pub keep_alive: bool,
}

// Default values
fn default_start_era() -> String { GENESIS_ERA.to_string() }
fn default_socket_path() -> PathBuf { PathBuf::from("/ipc/node.socket") }
fn default_pipeline_limit() -> usize { 10 }
fn default_keep_alive() -> bool { true }

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            network: None,
            network_magic: None,
            start_era: default_start_era(),
            tip: false,
            bulk: false,
            block_range: false,
            socket_path: default_socket_path(),
            address: None,
            pipeline_limit: default_pipeline_limit(),
            keep_alive: default_keep_alive(),
        }
    }
}

impl SyncConfig {
    /// Network address wins when both transports are configured.
    pub fn transport(&self) -> Transport {
        match self.address.as_deref() {
            Some(address) if !address.is_empty() => Transport::Network(address.to_string()),
            _ => Transport::LocalSocket(self.socket_path.clone()),
        }
    }

    pub fn node_to_node(&self) -> bool {
        self.transport().is_node_to_node()
    }

    pub fn mode(&self) -> SyncMode {
        if self.bulk {
            SyncMode::Bulk
        } else {
            SyncMode::Streaming
        }
    }

    fn explicit_magic(&self) -> Option<u32> {
        self.network_magic.filter(|magic| *magic != 0)
    }

    /// Name used for era anchor lookups.
    ///
    /// With only a magic configured, a well-known magic maps back to its
    /// network; anything else is treated as an unknown network.
    pub fn network_name(&self) -> String {
        match (self.network.as_deref(), self.explicit_magic()) {
            (Some(name), _) if !name.is_empty() => name.to_string(),
            (_, None) => DEFAULT_NETWORK.to_string(),
            (_, Some(magic)) => networks::network_by_magic(magic)
                .map(|n| n.name)
                .unwrap_or(UNKNOWN_NETWORK)
                .to_string(),
        }
    }

    pub fn resolved_magic(&self) -> Result<u32> {
        if let Some(magic) = self.explicit_magic() {
            return Ok(magic);
        }
        let name = self.network_name();
        networks::network_by_name(&name)
            .map(|n| n.network_magic)
            .ok_or(SyncError::UnknownNetwork(name))
    }

    /// Rejects combinations that must never reach the wire.
    pub fn validate(&self) -> Result<()> {
        if self.bulk && !self.node_to_node() {
            return Err(SyncError::ConfigurationConflict(
                "bulk mode requires a node-to-node transport (set an address instead of a socket path)".to_string(),
            ));
        }
        if self.bulk && self.block_range {
            return Err(SyncError::ConfigurationConflict(
                "range query is a one-shot action and cannot be combined with bulk mode".to_string(),
            ));
        }
        if self.pipeline_limit == 0 {
            return Err(SyncError::ConfigurationConflict(
                "pipeline limit must be at least 1".to_string(),
            ));
        }
        self.resolved_magic()?;
        Ok(())
    }

    pub fn dial_options(&self) -> Result<DialOptions> {
        Ok(DialOptions {
            network_magic: self.resolved_magic()?,
            node_to_node: self.node_to_node(),
            keep_alive: self.keep_alive,
            pipeline_limit: self.pipeline_limit,
        })
    }
}
