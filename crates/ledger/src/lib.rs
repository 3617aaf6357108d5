//! Decoded block shapes and their normalisation into a single descriptor.

pub mod assets;
pub mod block;
pub mod classifier;
pub mod transaction;

pub use assets::{AssetName, MultiAsset, PolicyId};
pub use block::{block_type, DecodedBlock, IssuerKey, RawBlock, BYRON_SLOTS_PER_EPOCH};
pub use classifier::{BlockClassifier, BlockDescriptor, BlockEra, Era};
pub use transaction::{Datum, DecodedTransaction, TransactionView, TxInput, TxOutput};
