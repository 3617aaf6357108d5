use chainsync_common::Hash;
use serde::{Deserialize, Serialize};

use crate::assets::MultiAsset;

/// Reference to an output of an earlier transaction (`id#index`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub tx_id: Hash,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Datum {
    /// Only the datum hash is carried on chain.
    Hash(Hash),
    /// Inline datum, already decoded to JSON.
    Inline(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub amount: u64,
    #[serde(default)]
    pub assets: Option<MultiAsset<u64>>,
    #[serde(default)]
    pub datum: Option<Datum>,
}

/// A transaction as handed over by the decoding layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedTransaction {
    pub hash: Hash,
    /// Encoded size in bytes.
    pub size: usize,
    #[serde(default)]
    pub inputs: Vec<TxInput>,
    #[serde(default)]
    pub outputs: Vec<TxOutput>,
    #[serde(default)]
    pub collateral: Vec<TxInput>,
    /// Certificate kinds, e.g. "stake_registration".
    #[serde(default)]
    pub certificates: Vec<String>,
    #[serde(default)]
    pub mint: Option<MultiAsset<i64>>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Read-only projection of a transaction for display and indexing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionView {
    pub hash: Hash,
    pub size: usize,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub collateral: Vec<TxInput>,
    pub certificate_count: usize,
    pub mint: Option<MultiAsset<i64>>,
    pub has_metadata: bool,
}

impl TransactionView {
    pub fn has_certificates(&self) -> bool {
        self.certificate_count > 0
    }

    pub fn has_mint(&self) -> bool {
        self.mint.is_some()
    }
}

impl From<&DecodedTransaction> for TransactionView {
    fn from(tx: &DecodedTransaction) -> Self {
        Self {
            hash: tx.hash,
            size: tx.size,
            inputs: tx.inputs.clone(),
            outputs: tx
                .outputs
                .iter()
                .map(|output| TxOutput {
                    // empty bundles are the same as no bundle
                    assets: output.assets.clone().filter(|a| !a.is_empty()),
                    ..output.clone()
                })
                .collect(),
            collateral: tx.collateral.clone(),
            certificate_count: tx.certificates.len(),
            mint: tx.mint.clone().filter(|m| !m.is_empty()),
            has_metadata: tx.metadata.is_some(),
        }
    }
}
