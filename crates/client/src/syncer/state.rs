use chainsync_common::ChainPoint;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Orchestrator lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncState {
    /// Not started
    Idle,

    /// Dialing and resolving the start point
    Resolving,

    /// Following the tip through chain-sync
    Streaming,

    /// Asking the peer for the available range (bulk mode)
    RangeComputing,

    /// Bulk range fetch in progress
    Fetching,

    /// Finished without error (range reported, batch fetched or shut down)
    Completed,

    /// Terminal failure
    Error(String),
}

impl Default for SyncState {
    fn default() -> Self {
        SyncState::Idle
    }
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Range-only query answered.
    RangeReported { start: ChainPoint, end: ChainPoint },
    /// Bulk fetch delivered every block of the range.
    RangeFetched { blocks: u64 },
    /// Stopped through the shutdown signal.
    Shutdown,
}

/// Delivery counters.
#[derive(Debug, Clone)]
pub struct SyncStats {
    pub blocks_delivered: u64,
    pub rollbacks: u64,
    pub headers_fetched: u64,
    pub last_point: Option<ChainPoint>,
    pub started_at: Instant,
}

impl Default for SyncStats {
    fn default() -> Self {
        Self {
            blocks_delivered: 0,
            rollbacks: 0,
            headers_fetched: 0,
            last_point: None,
            started_at: Instant::now(),
        }
    }
}

impl SyncStats {
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Read-only view of a running orchestrator, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct SyncHandle {
    pub(crate) state: Arc<RwLock<SyncState>>,
    pub(crate) stats: Arc<RwLock<SyncStats>>,
}

impl SyncHandle {
    pub async fn state(&self) -> SyncState {
        self.state.read().await.clone()
    }

    pub async fn stats(&self) -> SyncStats {
        self.stats.read().await.clone()
    }
}
