//! Era anchor points.
//!
//! Every anchor after Byron is the last block of the preceding era, so
//! intersecting there and rolling forward lands on the first block of the
//! named era. Genesis and Byron anchors carry no point and mean "start at
//! chain origin".

use crate::error::{Result, SyncError};
use crate::types::{ChainPoint, Hash};

/// Network key used for any network that has no anchors of its own.
pub const UNKNOWN_NETWORK: &str = "unknown";

pub const GENESIS_ERA: &str = "genesis";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraAnchor {
    pub network: &'static str,
    pub era: &'static str,
    /// (slot, hex hash) of the last block of the preceding era.
    anchor: Option<(u64, &'static str)>,
}

impl EraAnchor {
    const fn origin(network: &'static str, era: &'static str) -> Self {
        Self { network, era, anchor: None }
    }

    const fn at(network: &'static str, era: &'static str, slot: u64, hash: &'static str) -> Self {
        Self { network, era, anchor: Some((slot, hash)) }
    }

    /// `None` means chain origin.
    pub fn point(&self) -> Result<Option<ChainPoint>> {
        match self.anchor {
            None => Ok(None),
            Some((slot, hash)) => Ok(Some(ChainPoint::new(slot, Hash::from_hex(hash)?))),
        }
    }
}

/// Anchors in chronological order per network.
const ERA_ANCHORS: &[EraAnchor] = &[
    EraAnchor::origin(UNKNOWN_NETWORK, GENESIS_ERA),
    // mainnet
    EraAnchor::origin("mainnet", GENESIS_ERA),
    EraAnchor::origin("mainnet", "byron"),
    // Last block of epoch 207 (Byron)
    EraAnchor::at(
        "mainnet",
        "shelley",
        4492799,
        "f8084c61b6a238acec985b59310b6ecec49c0ab8352249afd7268da5cff2a457",
    ),
    // Last block of epoch 235 (Shelley)
    EraAnchor::at(
        "mainnet",
        "allegra",
        16588737,
        "4e9bbbb67e3ae262133d94c3da5bffce7b1127fc436e7433b87668dba34c354a",
    ),
    // Last block of epoch 250 (Allegra)
    EraAnchor::at(
        "mainnet",
        "mary",
        23068793,
        "69c44ac1dda2ec74646e4223bc804d9126f719b1c245dadc2ad65e8de1b276d7",
    ),
    // Last block of epoch 289 (Mary)
    EraAnchor::at(
        "mainnet",
        "alonzo",
        39916796,
        "e72579ff89dc9ed325b723a33624b596c08141c7bd573ecfff56a1f7229e4d09",
    ),
    // Last block of epoch 364 (Alonzo)
    EraAnchor::at(
        "mainnet",
        "babbage",
        72316796,
        "c58a24ba8203e7629422a24d9dc68ce2ed495420bf40d9dab124373655161a20",
    ),
    // Last block of epoch 506 (Babbage)
    EraAnchor::at(
        "mainnet",
        "conway",
        133660799,
        "e757d57eb8dc9500a61c60a39fadb63d9be6973ba96ae337fd24453d4d15c343",
    ),
    // preprod
    EraAnchor::origin("preprod", GENESIS_ERA),
    EraAnchor::origin("preprod", "alonzo"),
    // preview
    EraAnchor::origin("preview", GENESIS_ERA),
    EraAnchor::origin("preview", "alonzo"),
    // Last block of epoch 3 (Alonzo)
    EraAnchor::at(
        "preview",
        "babbage",
        345594,
        "e47ac07272e95d6c3dc8279def7b88ded00e310f99ac3dfbae48ed9ff55e6001",
    ),
];

/// Static (network, era) -> anchor mapping.
#[derive(Debug, Clone, Copy)]
pub struct EraAnchorTable {
    anchors: &'static [EraAnchor],
}

impl Default for EraAnchorTable {
    fn default() -> Self {
        Self { anchors: ERA_ANCHORS }
    }
}

impl EraAnchorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_network(&self, network: &str) -> bool {
        self.anchors.iter().any(|a| a.network == network)
    }

    /// Eras registered for `network`, oldest first.
    pub fn eras(&self, network: &str) -> Vec<&'static str> {
        self.anchors
            .iter()
            .filter(|a| a.network == network)
            .map(|a| a.era)
            .collect()
    }

    fn find(&self, network: &str, era: &str) -> Option<&'static EraAnchor> {
        self.anchors
            .iter()
            .find(|a| a.network == network && a.era == era)
    }

    /// Resolves `(network, era)` to its anchor point; `None` is chain origin.
    pub fn lookup(&self, network: &str, era: &str) -> Result<Option<ChainPoint>> {
        let anchor = if self.has_network(network) {
            self.find(network, era).ok_or_else(|| SyncError::UnknownEra {
                network: network.to_string(),
                era: era.to_string(),
            })?
        } else if era == GENESIS_ERA {
            self.find(UNKNOWN_NETWORK, GENESIS_ERA)
                .ok_or_else(|| SyncError::UnknownEra {
                    network: UNKNOWN_NETWORK.to_string(),
                    era: era.to_string(),
                })?
        } else {
            return Err(SyncError::UnsupportedNetworkForEra {
                network: network.to_string(),
                era: era.to_string(),
            });
        };
        anchor.point()
    }
}
