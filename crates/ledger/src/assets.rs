use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

pub const POLICY_ID_LENGTH: usize = 28;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolicyId(pub [u8; POLICY_ID_LENGTH]);

impl fmt::Debug for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PolicyId({})", hex::encode(self.0))
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Serialize for PolicyId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for PolicyId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let arr: [u8; POLICY_ID_LENGTH] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("Invalid policy id length"))?;
        Ok(PolicyId(arr))
    }
}

/// Raw asset name bytes; shown as text when they are printable UTF-8.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AssetName(pub Vec<u8>);

impl AssetName {
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetName({})", self.to_hex())
    }
}

impl fmt::Display for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) if !s.chars().any(char::is_control) => write!(f, "{}", s),
            _ => write!(f, "{}", self.to_hex()),
        }
    }
}

impl Serialize for AssetName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AssetName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map(AssetName).map_err(serde::de::Error::custom)
    }
}

/// (policy, asset name) -> amount.
///
/// Output bundles use `u64`; mint bundles use `i64` since minting can burn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultiAsset<T> {
    policies: BTreeMap<PolicyId, BTreeMap<AssetName, T>>,
}

impl<T> Default for MultiAsset<T> {
    fn default() -> Self {
        Self { policies: BTreeMap::new() }
    }
}

impl<T: Copy> MultiAsset<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, policy: PolicyId, name: AssetName, amount: T) {
        self.policies.entry(policy).or_default().insert(name, amount);
    }

    pub fn is_empty(&self) -> bool {
        self.policies.values().all(BTreeMap::is_empty)
    }

    pub fn policies(&self) -> impl Iterator<Item = &PolicyId> {
        self.policies.keys()
    }

    pub fn assets(&self, policy: &PolicyId) -> impl Iterator<Item = &AssetName> {
        self.policies.get(policy).into_iter().flat_map(BTreeMap::keys)
    }

    pub fn asset(&self, policy: &PolicyId, name: &AssetName) -> Option<T> {
        self.policies.get(policy)?.get(name).copied()
    }

    /// Flattened `(policy, name, amount)` entries in policy, then name, order.
    pub fn iter(&self) -> impl Iterator<Item = (&PolicyId, &AssetName, T)> {
        self.policies
            .iter()
            .flat_map(|(policy, names)| names.iter().map(move |(name, amount)| (policy, name, *amount)))
    }
}

impl<T: Copy> FromIterator<(PolicyId, AssetName, T)> for MultiAsset<T> {
    fn from_iter<I: IntoIterator<Item = (PolicyId, AssetName, T)>>(iter: I) -> Self {
        let mut bundle = MultiAsset::new();
        for (policy, name, amount) in iter {
            bundle.insert(policy, name, amount);
        }
        bundle
    }
}
