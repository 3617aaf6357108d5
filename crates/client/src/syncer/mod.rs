//! Syncer module
//!
//! Drives a single chain synchronization session.

pub mod orchestrator;
pub mod state;

pub use orchestrator::SyncOrchestrator;
pub use state::{SyncHandle, SyncOutcome, SyncState, SyncStats};
