//! Block classification.
//!
//! Byron history comes in two incompatible shapes (epoch boundary blocks and
//! main blocks); every later era shares one uniform shape. The classifier is
//! the only place that looks inside a [`DecodedBlock`]; everything downstream
//! consumes [`BlockDescriptor`].

use chainsync_common::{Hash, Result, SyncError};
use serde::Serialize;
use std::fmt;
use tracing::trace;

use crate::block::{block_type, DecodedBlock, IssuerKey};
use crate::transaction::{DecodedTransaction, TransactionView};

/// Structural family of a classified block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BlockEra {
    ByronBoundary,
    ByronMain,
    ShelleyOrLater,
}

/// Named protocol era.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Era {
    Byron,
    Shelley,
    Allegra,
    Mary,
    Alonzo,
    Babbage,
    Conway,
}

impl Era {
    pub fn from_block_type(tag: u32) -> Option<Era> {
        match tag {
            block_type::BYRON_EBB | block_type::BYRON_MAIN => Some(Era::Byron),
            block_type::SHELLEY => Some(Era::Shelley),
            block_type::ALLEGRA => Some(Era::Allegra),
            block_type::MARY => Some(Era::Mary),
            block_type::ALONZO => Some(Era::Alonzo),
            block_type::BABBAGE => Some(Era::Babbage),
            block_type::CONWAY => Some(Era::Conway),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Era::Byron => "Byron",
            Era::Shelley => "Shelley",
            Era::Allegra => "Allegra",
            Era::Mary => "Mary",
            Era::Alonzo => "Alonzo",
            Era::Babbage => "Babbage",
            Era::Conway => "Conway",
        }
    }
}

impl fmt::Display for Era {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Normalized view of a block, independent of its on-chain shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockDescriptor {
    pub block_type: u32,
    pub era: BlockEra,
    pub era_name: Era,
    /// Byron only.
    pub epoch: Option<u64>,
    /// Absent for boundary blocks, which are addressed by epoch.
    pub slot: Option<u64>,
    pub block_number: Option<u64>,
    pub hash: Hash,
    pub issuer_key: Option<IssuerKey>,
    pub transactions: Vec<TransactionView>,
}

impl fmt::Display for BlockDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.era {
            BlockEra::ByronBoundary => write!(
                f,
                "era = Byron (EBB), epoch = {}, id = {}",
                self.epoch.unwrap_or_default(),
                self.hash
            ),
            BlockEra::ByronMain => write!(
                f,
                "era = Byron, epoch = {}, slot = {}, block_no = {}, id = {}",
                self.epoch.unwrap_or_default(),
                self.slot.unwrap_or_default(),
                self.block_number.unwrap_or_default(),
                self.hash
            ),
            BlockEra::ShelleyOrLater => write!(
                f,
                "era = {}, slot = {}, block_no = {}, id = {}",
                self.era_name,
                self.slot.unwrap_or_default(),
                self.block_number.unwrap_or_default(),
                self.hash
            ),
        }
    }
}

fn views(transactions: &[DecodedTransaction]) -> Vec<TransactionView> {
    transactions.iter().map(TransactionView::from).collect()
}

fn shape_mismatch(tag: u32, block: &DecodedBlock) -> SyncError {
    let shape = match block {
        DecodedBlock::ByronBoundary(_) => "byron boundary",
        DecodedBlock::ByronMain(_) => "byron main",
        DecodedBlock::Uniform(_) => "uniform",
    };
    SyncError::MalformedBlock(format!(
        "block type {} carries a {} payload (hash {})",
        tag,
        shape,
        block.hash()
    ))
}

/// Stateless three-way dispatch on the block type tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockClassifier;

impl BlockClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, tag: u32, block: &DecodedBlock) -> Result<BlockDescriptor> {
        let era_name = Era::from_block_type(tag).ok_or(SyncError::UnknownBlockType(tag))?;

        let descriptor = match (tag, block) {
            (block_type::BYRON_EBB, DecodedBlock::ByronBoundary(ebb)) => {
                // the boundary slot is never shown but must still be addressable
                block.try_slot()?;
                BlockDescriptor {
                    block_type: tag,
                    era: BlockEra::ByronBoundary,
                    era_name,
                    epoch: Some(ebb.epoch),
                    slot: None,
                    block_number: None,
                    hash: ebb.hash,
                    issuer_key: None,
                    transactions: Vec::new(),
                }
            }
            (block_type::BYRON_MAIN, DecodedBlock::ByronMain(main)) => BlockDescriptor {
                block_type: tag,
                era: BlockEra::ByronMain,
                era_name,
                epoch: Some(main.header.epoch),
                slot: Some(block.try_slot()?),
                block_number: Some(main.header.block_number),
                hash: main.hash,
                issuer_key: Some(main.header.issuer_key.clone()),
                transactions: views(&main.transactions),
            },
            (block_type::BYRON_EBB, _) | (block_type::BYRON_MAIN, _) => {
                return Err(shape_mismatch(tag, block))
            }
            (_, DecodedBlock::Uniform(uniform)) => BlockDescriptor {
                block_type: tag,
                era: BlockEra::ShelleyOrLater,
                era_name,
                epoch: None,
                slot: Some(uniform.header.slot),
                block_number: Some(uniform.header.block_number),
                hash: uniform.hash,
                issuer_key: Some(uniform.header.issuer_vkey.clone()),
                transactions: views(&uniform.transactions),
            },
            _ => return Err(shape_mismatch(tag, block)),
        };

        trace!(tag, hash = %descriptor.hash, "classified block");
        Ok(descriptor)
    }
}
