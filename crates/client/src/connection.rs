//! The connection capability the orchestrator drives.
//!
//! Wire encoding, the handshake and the mini-protocol state machines live
//! behind this trait. Push-style streams are handed back as channels so
//! events for one subscription arrive strictly in chain order.

use async_trait::async_trait;
use chainsync_common::{ChainPoint, ConnectionError, Tip};
use chainsync_ledger::RawBlock;
use std::fmt;
use std::path::PathBuf;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Trusted node-to-client channel over a UNIX socket.
    LocalSocket,
    /// Node-to-node over TCP.
    Network,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    LocalSocket(PathBuf),
    Network(String),
}

impl Transport {
    pub fn kind(&self) -> TransportKind {
        match self {
            Transport::LocalSocket(_) => TransportKind::LocalSocket,
            Transport::Network(_) => TransportKind::Network,
        }
    }

    /// Only node-to-node peers stream headers and serve block-fetch.
    pub fn is_node_to_node(&self) -> bool {
        self.kind() == TransportKind::Network
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::LocalSocket(path) => write!(f, "unix:{}", path.display()),
            Transport::Network(address) => write!(f, "tcp:{}", address),
        }
    }
}

/// Handshake and mini-protocol parameters passed at dial time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialOptions {
    pub network_magic: u32,
    pub node_to_node: bool,
    pub keep_alive: bool,
    /// Maximum number of chain-sync requests in flight.
    pub pipeline_limit: usize,
}

/// Payload of a roll-forward.
#[derive(Debug, Clone, PartialEq)]
pub enum RollForward {
    /// Node-to-node chain-sync only streams headers; the body must be fetched.
    HeaderOnly { block_type: u32, point: ChainPoint },
    FullBlock(RawBlock),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    RollForward { payload: RollForward, tip: Tip },
    RollBackward { point: ChainPoint, tip: Tip },
}

#[async_trait]
pub trait Connection: Send {
    async fn dial(&mut self, transport: &Transport, options: &DialOptions) -> Result<(), ConnectionError>;

    /// Asynchronous connection failures. Can be taken once.
    fn take_error_channel(&mut self) -> Option<mpsc::Receiver<ConnectionError>>;

    async fn sync_current_tip(&mut self) -> Result<Tip, ConnectionError>;

    /// Inclusive span of blocks from the first candidate on the peer's chain
    /// through its tip. Fails with `IntersectNotFound` when no candidate is on
    /// the peer's chain.
    async fn sync_available_range(
        &mut self,
        points: &[ChainPoint],
    ) -> Result<(ChainPoint, ChainPoint), ConnectionError>;

    /// Starts the long-lived chain-sync subscription.
    async fn sync_subscribe(&mut self, points: &[ChainPoint]) -> Result<mpsc::Receiver<SyncEvent>, ConnectionError>;

    async fn sync_stop(&mut self) -> Result<(), ConnectionError>;

    async fn fetch_block(&mut self, point: &ChainPoint) -> Result<RawBlock, ConnectionError>;

    /// Requests `[start, end]`; blocks arrive on the returned channel in chain
    /// order and the channel closes once the batch is done.
    async fn fetch_range(
        &mut self,
        start: &ChainPoint,
        end: &ChainPoint,
    ) -> Result<mpsc::Receiver<RawBlock>, ConnectionError>;

    /// Tears down every active mini-protocol and the bearer.
    async fn close(&mut self);
}

/// The part of a connection the resolver needs for `--tip`.
#[async_trait]
pub trait TipProvider: Send {
    async fn current_tip(&mut self) -> Result<Tip, ConnectionError>;
}

/// The part of a connection the resolver needs for range queries.
#[async_trait]
pub trait RangeProvider: Send {
    async fn available_range(&mut self, points: &[ChainPoint]) -> Result<(ChainPoint, ChainPoint), ConnectionError>;
}

#[async_trait]
impl<C: Connection + ?Sized> TipProvider for C {
    async fn current_tip(&mut self) -> Result<Tip, ConnectionError> {
        self.sync_current_tip().await
    }
}

#[async_trait]
impl<C: Connection + ?Sized> RangeProvider for C {
    async fn available_range(&mut self, points: &[ChainPoint]) -> Result<(ChainPoint, ChainPoint), ConnectionError> {
        self.sync_available_range(points).await
    }
}
