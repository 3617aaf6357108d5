//! Orchestrator runs against the replay peer.

use async_trait::async_trait;
use chainsync_client::{
    Connection, PeerCall, PointResolver, ReplayChain, ReplayConnection, ReplayHandle, SyncConfig, SyncConsumer,
    SyncOrchestrator, SyncOutcome, SyncState,
};
use chainsync_common::eras::EraAnchorTable;
use chainsync_common::utils::logging::init_test_logging;
use chainsync_common::{ChainPoint, ConnectionError, ErrorCategory, Hash, SyncError, Tip};
use chainsync_ledger::block::{ByronBoundaryBlock, UniformBlock, UniformHeader};
use chainsync_ledger::{block_type, BlockDescriptor, BlockEra, DecodedBlock, IssuerKey, RawBlock};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

const PREVIEW_BABBAGE_HASH: &str = "e47ac07272e95d6c3dc8279def7b88ded00e310f99ac3dfbae48ed9ff55e6001";
const MAINNET_SHELLEY_HASH: &str = "f8084c61b6a238acec985b59310b6ecec49c0ab8352249afd7268da5cff2a457";

#[derive(Debug, Clone, PartialEq)]
enum Seen {
    Rollback(ChainPoint),
    Block { descriptor: BlockDescriptor, fetches_before: usize },
    Range(ChainPoint, ChainPoint),
}

#[derive(Clone, Default)]
struct Recorder {
    seen: Arc<Mutex<Vec<Seen>>>,
    peer: Option<ReplayHandle>,
    stop_after: Option<(usize, Arc<Notify>)>,
    fail_blocks: bool,
}

impl Recorder {
    fn watching(peer: &ReplayHandle) -> Self {
        Self { peer: Some(peer.clone()), ..Default::default() }
    }

    fn stop_after(mut self, blocks: usize, notify: &Arc<Notify>) -> Self {
        self.stop_after = Some((blocks, notify.clone()));
        self
    }

    async fn seen(&self) -> Vec<Seen> {
        self.seen.lock().await.clone()
    }

    async fn blocks(&self) -> Vec<BlockDescriptor> {
        self.seen()
            .await
            .into_iter()
            .filter_map(|s| match s {
                Seen::Block { descriptor, .. } => Some(descriptor),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SyncConsumer for Recorder {
    async fn on_block(&mut self, descriptor: BlockDescriptor) -> anyhow::Result<()> {
        if self.fail_blocks {
            anyhow::bail!("indexer unavailable");
        }
        let fetches_before = match &self.peer {
            Some(peer) => fetch_calls(&peer.calls().await),
            None => 0,
        };
        let mut seen = self.seen.lock().await;
        seen.push(Seen::Block { descriptor, fetches_before });

        let delivered = seen.iter().filter(|s| matches!(s, Seen::Block { .. })).count();
        if let Some((limit, notify)) = &self.stop_after {
            if delivered == *limit {
                notify.notify_one();
            }
        }
        Ok(())
    }

    async fn on_rollback(&mut self, point: ChainPoint, _tip: Tip) -> anyhow::Result<()> {
        self.seen.lock().await.push(Seen::Rollback(point));
        Ok(())
    }

    async fn on_range(&mut self, start: ChainPoint, end: ChainPoint) -> anyhow::Result<()> {
        self.seen.lock().await.push(Seen::Range(start, end));
        Ok(())
    }
}

fn fetch_calls(calls: &[PeerCall]) -> usize {
    calls.iter().filter(|c| matches!(c, PeerCall::FetchBlock(_))).count()
}

fn numbered_hash(n: u64) -> Hash {
    let mut bytes = [0xcc; 32];
    bytes[..8].copy_from_slice(&n.to_be_bytes());
    Hash(bytes)
}

fn uniform(tag: u32, slot: u64, block_number: u64, hash: Hash) -> RawBlock {
    RawBlock::new(
        tag,
        DecodedBlock::Uniform(UniformBlock {
            hash,
            header: UniformHeader { slot, block_number, issuer_vkey: IssuerKey(vec![0x5a; 32]) },
            transactions: vec![],
        }),
    )
}

/// `count` consecutive blocks, one slot apart, starting at `first_slot`.
fn linear_chain(first_slot: u64, count: u64) -> Vec<RawBlock> {
    (0..count)
        .map(|i| uniform(block_type::BABBAGE, first_slot + i, 500 + i, numbered_hash(first_slot + i)))
        .collect()
}

fn preview_babbage_chain() -> ReplayChain {
    let anchor = Hash::from_hex(PREVIEW_BABBAGE_HASH).unwrap();
    ReplayChain::new(vec![
        uniform(block_type::ALONZO, 345594, 14000, anchor),
        uniform(block_type::BABBAGE, 345595, 14001, numbered_hash(345595)),
    ])
}

fn socket_config(network: &str, era: &str) -> SyncConfig {
    SyncConfig {
        network: Some(network.to_string()),
        start_era: era.to_string(),
        socket_path: "/tmp/replay.socket".into(),
        ..Default::default()
    }
}

fn network_config(network: &str, era: &str) -> SyncConfig {
    SyncConfig {
        address: Some("relay.example:3001".to_string()),
        ..socket_config(network, era)
    }
}

async fn run_with_shutdown(
    orchestrator: SyncOrchestrator<ReplayConnection, Recorder>,
    notify: Arc<Notify>,
) -> Result<SyncOutcome, SyncError> {
    orchestrator.run_until(async move { notify.notified().await }).await
}

#[tokio::test]
async fn test_preview_babbage_start() {
    let anchor = ChainPoint::new(345594, Hash::from_hex(PREVIEW_BABBAGE_HASH).unwrap());
    let conn = ReplayConnection::new(preview_babbage_chain()).hold_open();
    let peer = conn.handle();
    let notify = Arc::new(Notify::new());
    let recorder = Recorder::default().stop_after(1, &notify);

    let orchestrator = SyncOrchestrator::new(socket_config("preview", "babbage"), conn, recorder.clone()).unwrap();
    let outcome = run_with_shutdown(orchestrator, notify).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Shutdown);

    let seen = recorder.seen().await;
    assert_eq!(seen[0], Seen::Rollback(anchor));
    let blocks = recorder.blocks().await;
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].era, BlockEra::ShelleyOrLater);
    assert_eq!(blocks[0].slot, Some(345595));

    let calls = peer.calls().await;
    assert_eq!(calls[1], PeerCall::Subscribe(vec![anchor]));
    assert_eq!(&calls[2..], &[PeerCall::Stop, PeerCall::Close]);
}

#[tokio::test]
async fn test_mainnet_shelley_round_trip() {
    let anchor = Hash::from_hex(MAINNET_SHELLEY_HASH).unwrap();
    let mut blocks = vec![RawBlock::new(
        block_type::BYRON_EBB,
        DecodedBlock::ByronBoundary(ByronBoundaryBlock { hash: numbered_hash(1), epoch: 207 }),
    )];
    blocks.push(RawBlock::new(
        block_type::BYRON_MAIN,
        serde_json::from_value(serde_json::json!({
            "shape": "byron_main",
            "hash": MAINNET_SHELLEY_HASH,
            "header": {"epoch": 207, "slot_in_epoch": 21599, "block_number": 4490510, "issuer_key": "aa"}
        }))
        .unwrap(),
    ));
    blocks.push(uniform(block_type::SHELLEY, 4492900, 4490511, numbered_hash(2)));

    let conn = ReplayConnection::new(ReplayChain::new(blocks)).hold_open();
    let notify = Arc::new(Notify::new());
    let recorder = Recorder::default().stop_after(1, &notify);
    let orchestrator = SyncOrchestrator::new(network_config("mainnet", "shelley"), conn, recorder.clone()).unwrap();
    run_with_shutdown(orchestrator, notify).await.unwrap();

    assert_eq!(recorder.seen().await[0], Seen::Rollback(ChainPoint::new(4492799, anchor)));
    let blocks = recorder.blocks().await;
    assert_eq!(blocks[0].era, BlockEra::ShelleyOrLater);
    assert!(blocks[0].slot.unwrap() > 4492799);
    assert_eq!(blocks[0].to_string(), format!("era = Shelley, slot = 4492900, block_no = 4490511, id = {}", numbered_hash(2)));
}

#[tokio::test]
async fn test_no_intersection_on_short_chain() {
    let mut conn = ReplayConnection::new(ReplayChain::new(linear_chain(1000, 100)));
    let options = network_config("preview", "genesis").dial_options().unwrap();
    conn.dial(&network_config("preview", "genesis").transport(), &options).await.unwrap();

    let foreign = ChainPoint::new(1050, numbered_hash(7));
    let err = PointResolver::default().resolve_range(&[foreign], &mut conn).await.unwrap_err();
    assert!(matches!(err, SyncError::NoIntersection(ref points) if points == &vec![foreign]));
    assert_eq!(err.category(), ErrorCategory::Intersection);

    let on_chain = ChainPoint::new(1049, numbered_hash(1049));
    let (start, end) = PointResolver::default().resolve_range(&[on_chain], &mut conn).await.unwrap();
    assert_eq!((start.slot(), end.slot()), (1050, 1099));
}

#[tokio::test]
async fn test_no_intersection_closes_connection() {
    let conn = ReplayConnection::new(ReplayChain::new(linear_chain(1000, 100)));
    let peer = conn.handle();
    let config = SyncConfig { block_range: true, ..network_config("mainnet", "shelley") };
    let orchestrator = SyncOrchestrator::new(config, conn, Recorder::default()).unwrap();
    let handle = orchestrator.handle();

    let err = orchestrator.run().await.unwrap_err();
    assert!(matches!(err, SyncError::NoIntersection(_)));
    assert!(matches!(handle.state().await, SyncState::Error(_)));

    let calls = peer.calls().await;
    assert!(!calls.iter().any(|c| matches!(c, PeerCall::Subscribe(_))));
    assert_eq!(calls.last(), Some(&PeerCall::Close));
}

#[tokio::test]
async fn test_header_fetched_before_delivery() {
    let conn = ReplayConnection::new(preview_babbage_chain()).hold_open();
    let peer = conn.handle();
    let notify = Arc::new(Notify::new());
    let recorder = Recorder::watching(&peer).stop_after(1, &notify);

    let orchestrator = SyncOrchestrator::new(network_config("preview", "babbage"), conn, recorder.clone()).unwrap();
    let handle = orchestrator.handle();
    run_with_shutdown(orchestrator, notify).await.unwrap();

    let header_point = ChainPoint::new(345595, numbered_hash(345595));
    let calls = peer.calls().await;
    assert_eq!(fetch_calls(&calls), 1);
    assert!(calls.contains(&PeerCall::FetchBlock(header_point)));

    match &recorder.seen().await[1] {
        Seen::Block { descriptor, fetches_before } => {
            assert_eq!(*fetches_before, 1);
            assert_eq!(descriptor.hash, header_point.hash().copied().unwrap());
        }
        other => panic!("expected a block, got {:?}", other),
    }
    assert_eq!(handle.stats().await.headers_fetched, 1);
}

#[tokio::test]
async fn test_fetch_failure_is_fatal() {
    let conn = ReplayConnection::new(preview_babbage_chain())
        .hold_open()
        .fail_fetch(ConnectionError::Transport("connection reset by peer".into()));
    let peer = conn.handle();
    let recorder = Recorder::default();

    let orchestrator = SyncOrchestrator::new(network_config("preview", "babbage"), conn, recorder.clone()).unwrap();
    let err = orchestrator.run().await.unwrap_err();

    match err {
        SyncError::BlockFetchFailed { point, .. } => assert_eq!(point.slot(), 345595),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(recorder.blocks().await.is_empty());
    assert_eq!(fetch_calls(&peer.calls().await), 1);
}

#[tokio::test]
async fn test_rollback_precedes_blocks() {
    let anchor = ChainPoint::new(4492799, Hash::from_hex(MAINNET_SHELLEY_HASH).unwrap());
    let blocks = vec![
        uniform(block_type::SHELLEY, 4492799, 4490510, Hash::from_hex(MAINNET_SHELLEY_HASH).unwrap()),
        uniform(block_type::SHELLEY, 4492800, 4490511, numbered_hash(1)),
        uniform(block_type::SHELLEY, 4492820, 4490512, numbered_hash(2)),
    ];
    let conn = ReplayConnection::new(ReplayChain::new(blocks));
    let recorder = Recorder::default();

    let orchestrator = SyncOrchestrator::new(socket_config("mainnet", "shelley"), conn, recorder.clone()).unwrap();
    let err = orchestrator.run().await.unwrap_err();
    assert!(matches!(err, SyncError::SubscriptionClosed(_)));

    let seen = recorder.seen().await;
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0], Seen::Rollback(anchor));
    let slots: Vec<_> = recorder.blocks().await.iter().map(|b| b.slot.unwrap()).collect();
    assert_eq!(slots, vec![4492800, 4492820]);
}

#[tokio::test]
async fn test_start_at_tip_ignores_era() {
    let blocks = linear_chain(3000, 4);
    let tip = blocks[3].point();
    let conn = ReplayConnection::new(ReplayChain::new(blocks));
    let peer = conn.handle();
    let recorder = Recorder::default();

    // conway is not registered for preview, but the tip flag bypasses the table
    let config = SyncConfig { tip: true, ..socket_config("preview", "conway") };
    let orchestrator = SyncOrchestrator::new(config, conn, recorder.clone()).unwrap();
    let _ = orchestrator.run().await;

    assert_eq!(recorder.seen().await, vec![Seen::Rollback(tip)]);
    let calls = peer.calls().await;
    assert_eq!(calls[1], PeerCall::CurrentTip);
    assert_eq!(calls[2], PeerCall::Subscribe(vec![tip]));
}

#[tokio::test]
async fn test_bulk_over_socket_never_dials() {
    let conn = ReplayConnection::new(ReplayChain::new(linear_chain(0, 3)));
    let peer = conn.handle();
    let config = SyncConfig { bulk: true, ..socket_config("preview", "genesis") };

    let result = SyncOrchestrator::new(config, conn, Recorder::default());
    assert!(matches!(result, Err(SyncError::ConfigurationConflict(_))));
    assert!(peer.calls().await.is_empty());
}

#[tokio::test]
async fn test_bulk_stops_sync_before_fetch() {
    let blocks = linear_chain(10, 5);
    let (first, last) = (blocks[0].point(), blocks[4].point());
    let conn = ReplayConnection::new(ReplayChain::new(blocks));
    let peer = conn.handle();
    let recorder = Recorder::default();

    let config = SyncConfig { bulk: true, ..network_config("preview", "genesis") };
    let orchestrator = SyncOrchestrator::new(config, conn, recorder.clone()).unwrap();
    let handle = orchestrator.handle();
    let outcome = orchestrator.run().await.unwrap();
    assert_eq!(outcome, SyncOutcome::RangeFetched { blocks: 5 });

    let calls = peer.calls().await;
    assert!(matches!(calls[0], PeerCall::Dial { .. }));
    assert_eq!(
        &calls[1..],
        &[
            PeerCall::AvailableRange(vec![ChainPoint::Origin]),
            PeerCall::Stop,
            PeerCall::FetchRange(first, last),
            PeerCall::Close,
        ]
    );

    let slots: Vec<_> = recorder.blocks().await.iter().map(|b| b.slot.unwrap()).collect();
    assert_eq!(slots, vec![10, 11, 12, 13, 14]);
    assert_eq!(handle.state().await, SyncState::Completed);
    let stats = handle.stats().await;
    assert_eq!(stats.blocks_delivered, 5);
    assert_eq!(stats.last_point, Some(last));
}

#[tokio::test]
async fn test_range_only_reports_and_returns() {
    let blocks = linear_chain(40, 10);
    let (first, last) = (blocks[0].point(), blocks[9].point());
    let conn = ReplayConnection::new(ReplayChain::new(blocks));
    let peer = conn.handle();
    let recorder = Recorder::default();

    let config = SyncConfig { block_range: true, ..socket_config("preview", "genesis") };
    let outcome = SyncOrchestrator::new(config, conn, recorder.clone()).unwrap().run().await.unwrap();

    assert_eq!(outcome, SyncOutcome::RangeReported { start: first, end: last });
    assert_eq!(recorder.seen().await, vec![Seen::Range(first, last)]);
    let calls = peer.calls().await;
    assert_eq!(&calls[1..], &[PeerCall::AvailableRange(vec![ChainPoint::Origin]), PeerCall::Close]);
}

#[tokio::test]
async fn test_async_connection_error_is_fatal() {
    let conn = ReplayConnection::new(ReplayChain::new(linear_chain(0, 2))).hold_open();
    let peer = conn.handle();
    peer.inject_error(ConnectionError::Transport("bearer closed".into())).await;

    let orchestrator = SyncOrchestrator::new(socket_config("preview", "genesis"), conn, Recorder::default()).unwrap();
    let err = orchestrator.run().await.unwrap_err();
    assert_eq!(err, SyncError::ConnectionFailed(ConnectionError::Transport("bearer closed".into())));
    assert_eq!(peer.calls().await.last(), Some(&PeerCall::Close));
}

#[tokio::test]
async fn test_unknown_era_fails_before_dial() {
    let conn = ReplayConnection::new(ReplayChain::new(linear_chain(0, 2)));
    let peer = conn.handle();

    let orchestrator = SyncOrchestrator::new(socket_config("preview", "conway"), conn, Recorder::default()).unwrap();
    let handle = orchestrator.handle();
    let err = orchestrator.run().await.unwrap_err();
    assert!(matches!(err, SyncError::UnknownEra { .. }));
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert!(matches!(handle.state().await, SyncState::Error(_)));

    // nothing was dialed, so there is nothing to close either
    assert!(peer.calls().await.is_empty());
}

#[tokio::test]
async fn test_streaming_without_anchor_reports_no_intersection() {
    let conn = ReplayConnection::new(ReplayChain::new(linear_chain(0, 3)));
    let peer = conn.handle();
    let recorder = Recorder::default();

    let orchestrator = SyncOrchestrator::new(network_config("mainnet", "shelley"), conn, recorder.clone())
        .unwrap()
        .with_resolver(PointResolver::new(EraAnchorTable::new()));
    let err = orchestrator.run().await.unwrap_err();

    let anchor = ChainPoint::new(4492799, Hash::from_hex(MAINNET_SHELLEY_HASH).unwrap());
    assert_eq!(err, SyncError::NoIntersection(vec![anchor]));
    assert_eq!(err.category(), ErrorCategory::Intersection);
    assert!(recorder.seen().await.is_empty());

    let calls = peer.calls().await;
    assert!(matches!(calls[0], PeerCall::Dial { .. }));
    assert_eq!(&calls[1..], &[PeerCall::Subscribe(vec![anchor]), PeerCall::Close]);
}

#[tokio::test]
async fn test_dial_failure() {
    let conn = ReplayConnection::new(ReplayChain::default()).fail_dial(ConnectionError::Dial("no such socket".into()));
    let orchestrator = SyncOrchestrator::new(socket_config("preview", "genesis"), conn, Recorder::default()).unwrap();
    let handle = orchestrator.handle();

    let err = orchestrator.run().await.unwrap_err();
    assert!(matches!(err, SyncError::ConnectionFailed(ConnectionError::Dial(_))));
    assert_eq!(err.category(), ErrorCategory::Connectivity);
    assert!(matches!(handle.state().await, SyncState::Error(_)));
}

#[tokio::test]
async fn test_consumer_error_ends_run() {
    let conn = ReplayConnection::new(ReplayChain::new(linear_chain(0, 3))).hold_open();
    let recorder = Recorder { fail_blocks: true, ..Default::default() };

    let orchestrator = SyncOrchestrator::new(socket_config("preview", "genesis"), conn, recorder.clone()).unwrap();
    let err = orchestrator.run().await.unwrap_err();
    assert!(matches!(err, SyncError::ConsumerFailed(ref msg) if msg.contains("indexer unavailable")));
    assert_eq!(recorder.seen().await, vec![Seen::Rollback(ChainPoint::Origin)]);
}

#[tokio::test]
async fn test_shutdown_stops_streaming() {
    let conn = ReplayConnection::new(ReplayChain::new(linear_chain(0, 10))).hold_open();
    let peer = conn.handle();
    let notify = Arc::new(Notify::new());
    let recorder = Recorder::default().stop_after(2, &notify);

    let orchestrator = SyncOrchestrator::new(network_config("preview", "genesis"), conn, recorder.clone()).unwrap();
    let handle = orchestrator.handle();
    let outcome = run_with_shutdown(orchestrator, notify).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Shutdown);
    assert_eq!(recorder.blocks().await.len(), 2);
    let stats = handle.stats().await;
    assert_eq!(stats.blocks_delivered, 2);
    assert_eq!(stats.rollbacks, 1);
    assert_eq!(stats.headers_fetched, 2);

    let calls = peer.calls().await;
    let n = calls.len();
    assert_eq!(&calls[n - 2..], &[PeerCall::Stop, PeerCall::Close]);
}

#[tokio::test]
async fn test_shutdown_during_bulk_fetch() {
    init_test_logging();
    let blocks = linear_chain(0, 10);
    let (first, last) = (blocks[0].point(), blocks[9].point());
    let conn = ReplayConnection::new(ReplayChain::new(blocks));
    let peer = conn.handle();
    let notify = Arc::new(Notify::new());
    let recorder = Recorder::default().stop_after(2, &notify);

    let config = SyncConfig { bulk: true, ..network_config("preview", "genesis") };
    let orchestrator = SyncOrchestrator::new(config, conn, recorder.clone()).unwrap();
    let handle = orchestrator.handle();
    let outcome = run_with_shutdown(orchestrator, notify).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Shutdown);
    assert_eq!(recorder.blocks().await.len(), 2);
    assert_eq!(handle.stats().await.blocks_delivered, 2);
    assert_eq!(handle.state().await, SyncState::Completed);

    // chain-sync was already stopped before the fetch; the abandoned range
    // only needs the connection closed
    let calls = peer.calls().await;
    assert_eq!(
        &calls[1..],
        &[
            PeerCall::AvailableRange(vec![ChainPoint::Origin]),
            PeerCall::Stop,
            PeerCall::FetchRange(first, last),
            PeerCall::Close,
        ]
    );
}

#[tokio::test]
async fn test_demo_chain_replays() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../demos/preview-babbage.json");
    let chain = ReplayChain::from_file(path).unwrap();
    let recorder = Recorder::default();

    let orchestrator = SyncOrchestrator::new(network_config("preview", "babbage"), ReplayConnection::new(chain), recorder.clone()).unwrap();
    let err = orchestrator.run().await.unwrap_err();
    assert!(matches!(err, SyncError::SubscriptionClosed(_)));

    let blocks = recorder.blocks().await;
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[1].transactions.len(), 1);
    assert!(blocks[1].transactions[0].has_mint());
}
