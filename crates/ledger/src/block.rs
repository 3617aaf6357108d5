use blake2::digest::{Update, VariableOutput};
use blake2::Blake2bVar;
use chainsync_common::{ChainPoint, Hash, Result, SyncError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::transaction::DecodedTransaction;

/// Block type tags as carried by the sync and fetch protocols.
pub mod block_type {
    pub const BYRON_EBB: u32 = 0;
    pub const BYRON_MAIN: u32 = 1;
    pub const SHELLEY: u32 = 2;
    pub const ALLEGRA: u32 = 3;
    pub const MARY: u32 = 4;
    pub const ALONZO: u32 = 5;
    pub const BABBAGE: u32 = 6;
    pub const CONWAY: u32 = 7;
}

/// Byron epochs are 10k slots with k = 2160.
pub const BYRON_SLOTS_PER_EPOCH: u64 = 21600;

/// Block issuer verification key.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct IssuerKey(pub Vec<u8>);

impl IssuerKey {
    /// Blake2b-224 of the key, i.e. the pool key hash.
    pub fn pool_hash(&self) -> String {
        let mut out = [0u8; 28];
        // 28 is a valid Blake2b output size, so neither call can fail
        if let Ok(mut hasher) = Blake2bVar::new(out.len()) {
            hasher.update(&self.0);
            let _ = hasher.finalize_variable(&mut out);
        }
        hex::encode(out)
    }
}

impl fmt::Debug for IssuerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IssuerKey({})", hex::encode(&self.0))
    }
}

impl fmt::Display for IssuerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl Serialize for IssuerKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for IssuerKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map(IssuerKey).map_err(serde::de::Error::custom)
    }
}

/// Epoch boundary block: no transactions, no block number, addressed by epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ByronBoundaryBlock {
    pub hash: Hash,
    pub epoch: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ByronMainHeader {
    pub epoch: u64,
    pub slot_in_epoch: u64,
    pub block_number: u64,
    pub issuer_key: IssuerKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ByronMainBlock {
    pub hash: Hash,
    pub header: ByronMainHeader,
    #[serde(default)]
    pub transactions: Vec<DecodedTransaction>,
}

/// Header fields shared by every era from Shelley on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniformHeader {
    pub slot: u64,
    pub block_number: u64,
    pub issuer_vkey: IssuerKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniformBlock {
    pub hash: Hash,
    pub header: UniformHeader,
    #[serde(default)]
    pub transactions: Vec<DecodedTransaction>,
}

/// The three structural block shapes found on chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum DecodedBlock {
    ByronBoundary(ByronBoundaryBlock),
    ByronMain(ByronMainBlock),
    Uniform(UniformBlock),
}

impl DecodedBlock {
    pub fn hash(&self) -> Hash {
        match self {
            DecodedBlock::ByronBoundary(b) => b.hash,
            DecodedBlock::ByronMain(b) => b.hash,
            DecodedBlock::Uniform(b) => b.hash,
        }
    }

    /// Absolute slot. Boundary blocks sit on the first slot of their epoch.
    ///
    /// Fails with `MalformedBlock` when a Byron epoch/slot pair does not fit
    /// in a `u64` slot number.
    pub fn try_slot(&self) -> Result<u64> {
        let byron_slot = |epoch: u64, slot_in_epoch: u64| {
            epoch
                .checked_mul(BYRON_SLOTS_PER_EPOCH)
                .and_then(|first| first.checked_add(slot_in_epoch))
                .ok_or_else(|| {
                    SyncError::MalformedBlock(format!(
                        "byron slot overflows: epoch {} slot {} (block {})",
                        epoch,
                        slot_in_epoch,
                        self.hash()
                    ))
                })
        };
        match self {
            DecodedBlock::ByronBoundary(b) => byron_slot(b.epoch, 0),
            DecodedBlock::ByronMain(b) => byron_slot(b.header.epoch, b.header.slot_in_epoch),
            DecodedBlock::Uniform(b) => Ok(b.header.slot),
        }
    }

    /// Saturating form of [`try_slot`](Self::try_slot).
    pub fn slot(&self) -> u64 {
        match self {
            DecodedBlock::ByronBoundary(b) => b.epoch.saturating_mul(BYRON_SLOTS_PER_EPOCH),
            DecodedBlock::ByronMain(b) => b
                .header
                .epoch
                .saturating_mul(BYRON_SLOTS_PER_EPOCH)
                .saturating_add(b.header.slot_in_epoch),
            DecodedBlock::Uniform(b) => b.header.slot,
        }
    }

    pub fn point(&self) -> ChainPoint {
        ChainPoint::new(self.slot(), self.hash())
    }

    pub fn block_number(&self) -> Option<u64> {
        match self {
            DecodedBlock::ByronBoundary(_) => None,
            DecodedBlock::ByronMain(b) => Some(b.header.block_number),
            DecodedBlock::Uniform(b) => Some(b.header.block_number),
        }
    }
}

/// A full block payload together with the type tag it arrived under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBlock {
    pub block_type: u32,
    pub block: DecodedBlock,
}

impl RawBlock {
    pub fn new(block_type: u32, block: DecodedBlock) -> Self {
        Self { block_type, block }
    }

    pub fn point(&self) -> ChainPoint {
        self.block.point()
    }
}
