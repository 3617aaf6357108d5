use chainsync_common::{ChainPoint, ConnectionError, Result, SyncError};
use chainsync_ledger::{BlockClassifier, RawBlock};
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::config::{SyncConfig, SyncMode};
use crate::connection::{Connection, RollForward, SyncEvent};
use crate::consumer::SyncConsumer;
use crate::resolver::PointResolver;

use super::state::{SyncHandle, SyncOutcome, SyncState};

fn consumer_failed(err: anyhow::Error) -> SyncError {
    SyncError::ConsumerFailed(format!("{:#}", err))
}

/// Next asynchronous connection error. Pends forever once the channel is gone.
async fn next_error(errors: &mut Option<mpsc::Receiver<ConnectionError>>) -> ConnectionError {
    if let Some(rx) = errors.as_mut() {
        if let Some(err) = rx.recv().await {
            return err;
        }
    }
    *errors = None;
    std::future::pending().await
}

/// One sync session over one exclusively owned connection.
///
/// The mode is fixed by the configuration: either follow the chain through
/// the chain-sync subscription, or hand off to a single block-fetch range
/// request. Both never run together on the connection.
pub struct SyncOrchestrator<C, S> {
    config: SyncConfig,
    connection: C,
    consumer: S,
    resolver: PointResolver,
    classifier: BlockClassifier,
    handle: SyncHandle,
    dialed: bool,
}

impl<C: Connection, S: SyncConsumer> SyncOrchestrator<C, S> {
    /// Fails with `ConfigurationConflict` before touching the connection when
    /// the configuration asks for an impossible mode.
    pub fn new(config: SyncConfig, connection: C, consumer: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connection,
            consumer,
            resolver: PointResolver::default(),
            classifier: BlockClassifier::new(),
            handle: SyncHandle::default(),
            dialed: false,
        })
    }

    pub fn with_resolver(mut self, resolver: PointResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn handle(&self) -> SyncHandle {
        self.handle.clone()
    }

    /// Runs until a fatal error; streaming never ends on its own.
    pub async fn run(self) -> Result<SyncOutcome> {
        self.run_until(std::future::pending()).await
    }

    /// Like [`run`](Self::run), but stops the active mini-protocol and returns
    /// `SyncOutcome::Shutdown` once `shutdown` resolves.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<SyncOutcome>
    where
        F: Future<Output = ()>,
    {
        let result = self.drive(shutdown).await;

        match &result {
            Ok(outcome) => {
                info!("Chain sync finished: {:?}", outcome);
                self.set_state(SyncState::Completed).await;
            }
            Err(e) => {
                error!("Chain sync failed: {} ({})", e, e.hint());
                self.set_state(SyncState::Error(e.to_string())).await;
            }
        }

        if self.dialed {
            self.connection.close().await;
        }
        result
    }

    async fn set_state(&self, state: SyncState) {
        debug!("Sync state -> {:?}", state);
        *self.handle.state.write().await = state;
    }

    async fn drive<F>(&mut self, shutdown: F) -> Result<SyncOutcome>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.set_state(SyncState::Resolving).await;

        let network = self.config.network_name();
        let anchor = if self.config.tip {
            None
        } else {
            Some(self.resolver.resolve_anchor(&network, &self.config.start_era)?)
        };

        let transport = self.config.transport();
        let options = self.config.dial_options()?;
        info!(
            "Connecting to {} (magic {}, {})",
            transport,
            options.network_magic,
            if options.node_to_node { "node-to-node" } else { "node-to-client" }
        );
        self.dialed = true;
        self.connection
            .dial(&transport, &options)
            .await
            .map_err(SyncError::ConnectionFailed)?;
        let mut errors = self.connection.take_error_channel();

        let start = match anchor {
            Some(point) => point,
            None => {
                self.resolver
                    .resolve_start(&network, &self.config.start_era, true, &mut self.connection)
                    .await?
            }
        };
        let points = [start];

        if self.config.block_range {
            let (start, end) = self.resolver.resolve_range(&points, &mut self.connection).await?;
            self.consumer.on_range(start, end).await.map_err(consumer_failed)?;
            return Ok(SyncOutcome::RangeReported { start, end });
        }

        match self.config.mode() {
            SyncMode::Streaming => self.stream(&points, &mut errors, shutdown.as_mut()).await,
            SyncMode::Bulk => self.bulk(&points, &mut errors, shutdown.as_mut()).await,
        }
    }

    async fn stream<F>(
        &mut self,
        points: &[ChainPoint],
        errors: &mut Option<mpsc::Receiver<ConnectionError>>,
        mut shutdown: Pin<&mut F>,
    ) -> Result<SyncOutcome>
    where
        F: Future<Output = ()>,
    {
        let mut events = self.connection.sync_subscribe(points).await.map_err(|e| match e {
            ConnectionError::IntersectNotFound => SyncError::NoIntersection(points.to_vec()),
            other => SyncError::ConnectionFailed(other),
        })?;
        self.set_state(SyncState::Streaming).await;
        info!("Chain-sync subscribed from {:?}", points);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping chain-sync");
                    self.connection.sync_stop().await.map_err(SyncError::SyncStopFailed)?;
                    return Ok(SyncOutcome::Shutdown);
                }
                err = next_error(errors) => return Err(SyncError::ConnectionFailed(err)),
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await?,
                    None => return Err(SyncError::SubscriptionClosed("chain-sync")),
                },
            }
        }
    }

    async fn bulk<F>(
        &mut self,
        points: &[ChainPoint],
        errors: &mut Option<mpsc::Receiver<ConnectionError>>,
        mut shutdown: Pin<&mut F>,
    ) -> Result<SyncOutcome>
    where
        F: Future<Output = ()>,
    {
        self.set_state(SyncState::RangeComputing).await;
        let (start, end) = self.resolver.resolve_range(points, &mut self.connection).await?;

        // chain-sync has an idle timeout; it must be stopped before the
        // long-running fetch starts or the peer drops the connection
        self.connection.sync_stop().await.map_err(SyncError::SyncStopFailed)?;

        self.set_state(SyncState::Fetching).await;
        info!("Requesting block range {} .. {}", start, end);
        let mut blocks = self
            .connection
            .fetch_range(&start, &end)
            .await
            .map_err(SyncError::RangeFetchFailed)?;

        let mut delivered = 0u64;
        let mut last = None;
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested during bulk fetch after {} blocks", delivered);
                    // block-fetch has no stop message; dropping the receiver ends
                    // the batch and close() tears down the protocol
                    drop(blocks);
                    debug!("Abandoned range fetch {} .. {}", start, end);
                    return Ok(SyncOutcome::Shutdown);
                }
                err = next_error(errors) => return Err(SyncError::RangeFetchFailed(err)),
                block = blocks.recv() => match block {
                    Some(raw) => {
                        last = Some(raw.point());
                        self.deliver(raw).await?;
                        delivered += 1;
                    }
                    None if last == Some(end) => {
                        info!("Bulk fetch complete: {} blocks", delivered);
                        return Ok(SyncOutcome::RangeFetched { blocks: delivered });
                    }
                    None => {
                        warn!("Range stream ended after {} blocks, before {}", delivered, end);
                        return Err(SyncError::RangeFetchFailed(ConnectionError::Closed));
                    }
                },
            }
        }
    }

    async fn handle_event(&mut self, event: SyncEvent) -> Result<()> {
        match event {
            SyncEvent::RollBackward { point, tip } => {
                debug!("Roll backward to {} (tip {})", point, tip.point);
                self.handle.stats.write().await.rollbacks += 1;
                self.consumer.on_rollback(point, tip).await.map_err(consumer_failed)
            }
            SyncEvent::RollForward { payload, tip } => {
                let raw = match payload {
                    RollForward::FullBlock(raw) => raw,
                    RollForward::HeaderOnly { block_type, point } => self.fetch_body(block_type, point).await?,
                };
                trace!("Roll forward to {} (tip {})", raw.point(), tip.point);
                self.deliver(raw).await
            }
        }
    }

    /// Header-only roll-forward: the body has to be fetched before delivery.
    async fn fetch_body(&mut self, block_type: u32, point: ChainPoint) -> Result<RawBlock> {
        debug!("Fetching block body at {}", point);
        let raw = self
            .connection
            .fetch_block(&point)
            .await
            .map_err(|source| SyncError::BlockFetchFailed { point, source })?;
        self.handle.stats.write().await.headers_fetched += 1;

        if raw.point() != point {
            return Err(SyncError::MalformedBlock(format!(
                "requested block at {} but received {}",
                point,
                raw.point()
            )));
        }
        if raw.block_type != block_type {
            warn!(
                "Header at {} announced block type {} but body has type {}",
                point, block_type, raw.block_type
            );
        }
        Ok(raw)
    }

    async fn deliver(&mut self, raw: RawBlock) -> Result<()> {
        let descriptor = self.classifier.classify(raw.block_type, &raw.block)?;
        self.consumer.on_block(descriptor).await.map_err(consumer_failed)?;

        let mut stats = self.handle.stats.write().await;
        stats.blocks_delivered += 1;
        stats.last_point = Some(raw.point());
        Ok(())
    }
}
