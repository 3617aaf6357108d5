use async_trait::async_trait;
use chainsync_common::{ChainPoint, Tip};
use chainsync_ledger::BlockDescriptor;

/// Receives classified chain events, strictly in chain order.
///
/// Any error returned here ends the run.
#[async_trait]
pub trait SyncConsumer: Send {
    async fn on_block(&mut self, block: BlockDescriptor) -> anyhow::Result<()>;

    /// Reconciling history after a rollback is up to the consumer.
    async fn on_rollback(&mut self, point: ChainPoint, tip: Tip) -> anyhow::Result<()>;

    /// Result of a range-only query.
    async fn on_range(&mut self, _start: ChainPoint, _end: ChainPoint) -> anyhow::Result<()> {
        Ok(())
    }
}
