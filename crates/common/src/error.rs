use thiserror::Error;

use crate::types::ChainPoint;

/// Errors surfaced by the chain synchronization client.
///
/// Resolution and configuration errors are raised before any subscription
/// starts. Everything raised once streaming or fetching is live ends the run.
#[derive(Error, Debug, PartialEq)]
pub enum SyncError {
    #[error("unknown era '{era}' specified as chain-sync start point for network '{network}'")]
    UnknownEra { network: String, era: String },

    #[error("only 'genesis' is supported as start era for unknown network '{network}' (got '{era}')")]
    UnsupportedNetworkForEra { network: String, era: String },

    #[error("invalid network specified: {0}")]
    UnknownNetwork(String),

    #[error("configuration conflict: {0}")]
    ConfigurationConflict(String),

    #[error("failed to get current tip: {0}")]
    TipQueryFailed(#[source] ConnectionError),

    #[error("failed to get available block range: {0}")]
    RangeQueryFailed(#[source] ConnectionError),

    #[error("none of the candidate points {0:?} are on the peer's chain")]
    NoIntersection(Vec<ChainPoint>),

    #[error("unknown block type {0}")]
    UnknownBlockType(u32),

    #[error("malformed block: {0}")]
    MalformedBlock(String),

    #[error("failed to fetch block at {point}: {source}")]
    BlockFetchFailed {
        point: ChainPoint,
        #[source]
        source: ConnectionError,
    },

    #[error("failed to request block range: {0}")]
    RangeFetchFailed(#[source] ConnectionError),

    #[error("failed to shutdown chain-sync: {0}")]
    SyncStopFailed(#[source] ConnectionError),

    #[error("connection failed: {0}")]
    ConnectionFailed(#[source] ConnectionError),

    #[error("peer closed the {0} subscription")]
    SubscriptionClosed(&'static str),

    #[error("consumer rejected event: {0}")]
    ConsumerFailed(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),
}

/// Errors reported by the underlying connection capability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("dial failed: {0}")]
    Dial(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("intersection not found")]
    IntersectNotFound,

    #[error("block not found: {0}")]
    BlockNotFound(ChainPoint),

    #[error("connection closed")]
    Closed,
}

/// What the operator should do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Fix the configuration and rerun.
    Configuration,
    /// Transient transport trouble, retry the whole process.
    Connectivity,
    /// Pick a different (older) anchor point and retry.
    Intersection,
    /// The peer or the consumer sent something we can't process.
    Protocol,
}

impl SyncError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::UnknownEra { .. }
            | SyncError::UnsupportedNetworkForEra { .. }
            | SyncError::UnknownNetwork(_)
            | SyncError::ConfigurationConflict(_)
            | SyncError::InvalidHash(_) => ErrorCategory::Configuration,
            SyncError::NoIntersection(_) => ErrorCategory::Intersection,
            SyncError::TipQueryFailed(_)
            | SyncError::RangeQueryFailed(_)
            | SyncError::BlockFetchFailed { .. }
            | SyncError::RangeFetchFailed(_)
            | SyncError::SyncStopFailed(_)
            | SyncError::ConnectionFailed(_)
            | SyncError::SubscriptionClosed(_) => ErrorCategory::Connectivity,
            SyncError::UnknownBlockType(_)
            | SyncError::MalformedBlock(_)
            | SyncError::ConsumerFailed(_) => ErrorCategory::Protocol,
        }
    }

    /// Short operator hint printed next to the error.
    pub fn hint(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => "fix the configuration and rerun",
            ErrorCategory::Connectivity => "check connectivity to the node and retry",
            ErrorCategory::Intersection => "choose an older start era and retry",
            ErrorCategory::Protocol => "the run cannot continue from this position",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SyncError>;
