//! Chain primitives, era anchors and shared plumbing for the chain-sync client.

pub mod eras;
pub mod error;
pub mod networks;
pub mod types;
pub mod utils;

pub use error::{ConnectionError, ErrorCategory, Result, SyncError};
pub use types::{ChainPoint, Hash, Tip, HASH_LENGTH};
