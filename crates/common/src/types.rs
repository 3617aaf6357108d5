use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::SyncError;

pub const HASH_LENGTH: usize = 32;

// --- NewTypes ---

/// 32-byte block or transaction hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash(pub [u8; HASH_LENGTH]);

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl Hash {
    /// Strict conversion: the slice must be exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SyncError> {
        let arr: [u8; HASH_LENGTH] = bytes.try_into().map_err(|_| {
            SyncError::InvalidHash(format!(
                "expected {} bytes, got {}",
                HASH_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Hash(arr))
    }

    pub fn from_hex(s: &str) -> Result<Self, SyncError> {
        let bytes = hex::decode(s).map_err(|e| SyncError::InvalidHash(format!("{}: {}", s, e)))?;
        Self::from_slice(&bytes)
    }
}

/// A position on the chain.
///
/// The origin sentinel carries no hash and sorts before every other point;
/// every other point carries a full 32-byte hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "PointRepr", into = "PointRepr")]
pub enum ChainPoint {
    Origin,
    Specific { slot: u64, hash: Hash },
}

impl ChainPoint {
    pub fn new(slot: u64, hash: Hash) -> Self {
        ChainPoint::Specific { slot, hash }
    }

    /// Builds a point from raw parts. An empty hash yields the origin.
    pub fn from_parts(slot: u64, hash: &[u8]) -> Result<Self, SyncError> {
        if hash.is_empty() {
            return Ok(ChainPoint::Origin);
        }
        Ok(ChainPoint::Specific {
            slot,
            hash: Hash::from_slice(hash)?,
        })
    }

    pub fn is_origin(&self) -> bool {
        matches!(self, ChainPoint::Origin)
    }

    pub fn slot(&self) -> u64 {
        match self {
            ChainPoint::Origin => 0,
            ChainPoint::Specific { slot, .. } => *slot,
        }
    }

    pub fn hash(&self) -> Option<&Hash> {
        match self {
            ChainPoint::Origin => None,
            ChainPoint::Specific { hash, .. } => Some(hash),
        }
    }
}

impl Default for ChainPoint {
    fn default() -> Self {
        ChainPoint::Origin
    }
}

impl fmt::Debug for ChainPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for ChainPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainPoint::Origin => write!(f, "origin"),
            ChainPoint::Specific { slot, hash } => write!(f, "slot {}, hash {}", slot, hash),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct PointRepr {
    slot: u64,
    #[serde(default)]
    hash: Option<Hash>,
}

impl TryFrom<PointRepr> for ChainPoint {
    type Error = String;

    fn try_from(repr: PointRepr) -> Result<Self, Self::Error> {
        match repr.hash {
            Some(hash) => Ok(ChainPoint::Specific { slot: repr.slot, hash }),
            None if repr.slot == 0 => Ok(ChainPoint::Origin),
            None => Err(format!("point at slot {} is missing its hash", repr.slot)),
        }
    }
}

impl From<ChainPoint> for PointRepr {
    fn from(point: ChainPoint) -> Self {
        match point {
            ChainPoint::Origin => PointRepr { slot: 0, hash: None },
            ChainPoint::Specific { slot, hash } => PointRepr { slot, hash: Some(hash) },
        }
    }
}

/// The peer's chain head at the moment it was reported. Never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tip {
    pub point: ChainPoint,
    pub block_number: u64,
}
