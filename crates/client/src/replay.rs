//! In-process peer serving a recorded chain.
//!
//! `ReplayConnection` implements [`Connection`] over a fixed list of blocks.
//! It follows node-to-node semantics when dialed over a network transport
//! (headers only on chain-sync, block-fetch available) and node-to-client
//! semantics over a local socket (full blocks, no block-fetch). Every call is
//! recorded in a journal.

use anyhow::Context;
use async_trait::async_trait;
use chainsync_common::{ChainPoint, ConnectionError, Tip};
use chainsync_ledger::RawBlock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::connection::{Connection, DialOptions, RollForward, SyncEvent, Transport};

/// A recorded chain, oldest block first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayChain {
    /// Handshake is refused when set and the dialed magic differs.
    #[serde(default)]
    pub network_magic: Option<u32>,
    #[serde(default)]
    pub blocks: Vec<RawBlock>,
}

impl ReplayChain {
    pub fn new(blocks: Vec<RawBlock>) -> Self {
        Self { network_magic: None, blocks }
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let chain: Self = serde_json::from_str(json).context("invalid replay chain")?;
        for (index, raw) in chain.blocks.iter().enumerate() {
            raw.block
                .try_slot()
                .with_context(|| format!("invalid replay chain: block {}", index))?;
        }
        Ok(chain)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read replay file {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn tip(&self) -> Tip {
        match self.blocks.last() {
            Some(last) => Tip {
                point: last.point(),
                block_number: self
                    .blocks
                    .iter()
                    .rev()
                    .find_map(|b| b.block.block_number())
                    .unwrap_or(0),
            },
            None => Tip { point: ChainPoint::Origin, block_number: 0 },
        }
    }

    fn position(&self, point: &ChainPoint) -> Option<usize> {
        self.blocks.iter().position(|b| b.point() == *point)
    }

    /// First candidate on this chain, and the index of the block after it.
    fn intersect(&self, points: &[ChainPoint]) -> Option<(ChainPoint, usize)> {
        points.iter().find_map(|point| match point {
            ChainPoint::Origin => Some((ChainPoint::Origin, 0)),
            _ => self.position(point).map(|i| (*point, i + 1)),
        })
    }
}

/// A capability call as observed by the peer.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerCall {
    Dial { transport: Transport, options: DialOptions },
    CurrentTip,
    AvailableRange(Vec<ChainPoint>),
    Subscribe(Vec<ChainPoint>),
    Stop,
    FetchBlock(ChainPoint),
    FetchRange(ChainPoint, ChainPoint),
    Close,
}

type Journal = Arc<Mutex<Vec<PeerCall>>>;

/// Observer side of a [`ReplayConnection`], usable after the connection has
/// been moved into an orchestrator.
#[derive(Debug, Clone)]
pub struct ReplayHandle {
    journal: Journal,
    errors: mpsc::Sender<ConnectionError>,
}

impl ReplayHandle {
    pub async fn calls(&self) -> Vec<PeerCall> {
        self.journal.lock().await.clone()
    }

    /// Pushes an error onto the connection's asynchronous error channel.
    pub async fn inject_error(&self, err: ConnectionError) {
        let _ = self.errors.send(err).await;
    }
}

pub struct ReplayConnection {
    chain: Arc<ReplayChain>,
    journal: Journal,
    options: Option<DialOptions>,
    fail_dial: Option<ConnectionError>,
    fail_fetch: Option<ConnectionError>,
    hold_open: bool,
    error_tx: mpsc::Sender<ConnectionError>,
    error_rx: Option<mpsc::Receiver<ConnectionError>>,
    tasks: Vec<JoinHandle<()>>,
}

impl ReplayConnection {
    pub fn new(chain: ReplayChain) -> Self {
        let (error_tx, error_rx) = mpsc::channel(8);
        Self {
            chain: Arc::new(chain),
            journal: Arc::default(),
            options: None,
            fail_dial: None,
            fail_fetch: None,
            hold_open: false,
            error_tx,
            error_rx: Some(error_rx),
            tasks: Vec::new(),
        }
    }

    pub fn fail_dial(mut self, err: ConnectionError) -> Self {
        self.fail_dial = Some(err);
        self
    }

    /// Every block-fetch request fails with `err`.
    pub fn fail_fetch(mut self, err: ConnectionError) -> Self {
        self.fail_fetch = Some(err);
        self
    }

    /// Keep the chain-sync stream open after the last block, like a peer
    /// sitting at its tip.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn handle(&self) -> ReplayHandle {
        ReplayHandle {
            journal: self.journal.clone(),
            errors: self.error_tx.clone(),
        }
    }

    async fn record(&self, call: PeerCall) {
        self.journal.lock().await.push(call);
    }

    fn dialed(&self) -> Result<DialOptions, ConnectionError> {
        self.options
            .ok_or_else(|| ConnectionError::Protocol("connection is not established".to_string()))
    }

    fn block_fetch(&self) -> Result<DialOptions, ConnectionError> {
        let options = self.dialed()?;
        if !options.node_to_node {
            return Err(ConnectionError::Protocol(
                "block-fetch is not available over node-to-client".to_string(),
            ));
        }
        if let Some(err) = &self.fail_fetch {
            return Err(err.clone());
        }
        Ok(options)
    }

    fn abort_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

#[async_trait]
impl Connection for ReplayConnection {
    async fn dial(&mut self, transport: &Transport, options: &DialOptions) -> Result<(), ConnectionError> {
        self.record(PeerCall::Dial { transport: transport.clone(), options: *options })
            .await;
        if let Some(err) = &self.fail_dial {
            return Err(err.clone());
        }
        if let Some(magic) = self.chain.network_magic {
            if magic != options.network_magic {
                return Err(ConnectionError::Dial(format!(
                    "handshake refused: peer runs network magic {}, requested {}",
                    magic, options.network_magic
                )));
            }
        }
        debug!("Replay peer accepted {} with {} blocks", transport, self.chain.blocks.len());
        self.options = Some(*options);
        Ok(())
    }

    fn take_error_channel(&mut self) -> Option<mpsc::Receiver<ConnectionError>> {
        self.error_rx.take()
    }

    async fn sync_current_tip(&mut self) -> Result<Tip, ConnectionError> {
        self.record(PeerCall::CurrentTip).await;
        self.dialed()?;
        Ok(self.chain.tip())
    }

    async fn sync_available_range(
        &mut self,
        points: &[ChainPoint],
    ) -> Result<(ChainPoint, ChainPoint), ConnectionError> {
        self.record(PeerCall::AvailableRange(points.to_vec())).await;
        self.dialed()?;
        let (_, next) = self.chain.intersect(points).ok_or(ConnectionError::IntersectNotFound)?;
        let first = self
            .chain
            .blocks
            .get(next)
            .ok_or_else(|| ConnectionError::Protocol("no blocks after the intersection".to_string()))?;
        Ok((first.point(), self.chain.tip().point))
    }

    async fn sync_subscribe(&mut self, points: &[ChainPoint]) -> Result<mpsc::Receiver<SyncEvent>, ConnectionError> {
        self.record(PeerCall::Subscribe(points.to_vec())).await;
        let options = self.dialed()?;
        let (intersect, next) = self.chain.intersect(points).ok_or(ConnectionError::IntersectNotFound)?;

        let (tx, rx) = mpsc::channel(options.pipeline_limit.max(1));
        let chain = self.chain.clone();
        let hold_open = self.hold_open;
        let task = tokio::spawn(async move {
            let tip = chain.tip();
            if tx.send(SyncEvent::RollBackward { point: intersect, tip }).await.is_err() {
                return;
            }
            for raw in &chain.blocks[next..] {
                let payload = if options.node_to_node {
                    RollForward::HeaderOnly { block_type: raw.block_type, point: raw.point() }
                } else {
                    RollForward::FullBlock(raw.clone())
                };
                if tx.send(SyncEvent::RollForward { payload, tip }).await.is_err() {
                    return;
                }
            }
            if hold_open {
                // at tip; the sender lives until the subscription is stopped
                tx.closed().await;
            }
        });
        self.tasks.push(task);
        Ok(rx)
    }

    async fn sync_stop(&mut self) -> Result<(), ConnectionError> {
        self.record(PeerCall::Stop).await;
        self.dialed()?;
        self.abort_tasks();
        Ok(())
    }

    async fn fetch_block(&mut self, point: &ChainPoint) -> Result<RawBlock, ConnectionError> {
        self.record(PeerCall::FetchBlock(*point)).await;
        self.block_fetch()?;
        self.chain
            .position(point)
            .map(|i| self.chain.blocks[i].clone())
            .ok_or(ConnectionError::BlockNotFound(*point))
    }

    async fn fetch_range(
        &mut self,
        start: &ChainPoint,
        end: &ChainPoint,
    ) -> Result<mpsc::Receiver<RawBlock>, ConnectionError> {
        self.record(PeerCall::FetchRange(*start, *end)).await;
        let options = self.block_fetch()?;
        let first = self.chain.position(start).ok_or(ConnectionError::BlockNotFound(*start))?;
        let last = self.chain.position(end).ok_or(ConnectionError::BlockNotFound(*end))?;
        if last < first {
            return Err(ConnectionError::Protocol(format!("empty range {} .. {}", start, end)));
        }

        let (tx, rx) = mpsc::channel(options.pipeline_limit.max(1));
        let chain = self.chain.clone();
        let task = tokio::spawn(async move {
            for raw in &chain.blocks[first..=last] {
                if tx.send(raw.clone()).await.is_err() {
                    return;
                }
            }
        });
        self.tasks.push(task);
        Ok(rx)
    }

    async fn close(&mut self) {
        self.record(PeerCall::Close).await;
        self.abort_tasks();
        self.options = None;
    }
}
