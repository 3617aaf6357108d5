use chainsync_common::eras::EraAnchorTable;
use chainsync_common::{ChainPoint, ConnectionError, Result, SyncError};
use tracing::{debug, info};

use crate::connection::{RangeProvider, TipProvider};

/// Turns a start specification into concrete chain points.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointResolver {
    anchors: EraAnchorTable,
}

impl PointResolver {
    pub fn new(anchors: EraAnchorTable) -> Self {
        Self { anchors }
    }

    /// Start point for `(network, era)`, or the peer's tip when `use_tip` is
    /// set. The tip is queried fresh on every call.
    pub async fn resolve_start<T>(&self, network: &str, era: &str, use_tip: bool, tips: &mut T) -> Result<ChainPoint>
    where
        T: TipProvider + ?Sized,
    {
        if use_tip {
            let tip = tips.current_tip().await.map_err(SyncError::TipQueryFailed)?;
            info!("Starting at peer tip: {} (block {})", tip.point, tip.block_number);
            return Ok(tip.point);
        }

        self.resolve_anchor(network, era)
    }

    /// Era anchor alone; needs no peer, so configuration mistakes surface
    /// before anything is dialed.
    pub fn resolve_anchor(&self, network: &str, era: &str) -> Result<ChainPoint> {
        let point = self.anchors.lookup(network, era)?.unwrap_or(ChainPoint::Origin);
        info!("Resolved start era '{}' on {}: {}", era, network, point);
        Ok(point)
    }

    /// Inclusive range of blocks available from `points` through the tip.
    pub async fn resolve_range<R>(&self, points: &[ChainPoint], ranges: &mut R) -> Result<(ChainPoint, ChainPoint)>
    where
        R: RangeProvider + ?Sized,
    {
        debug!("Querying available block range from {:?}", points);
        match ranges.available_range(points).await {
            Ok((start, end)) => {
                debug!("Available range: {} .. {}", start, end);
                Ok((start, end))
            }
            Err(ConnectionError::IntersectNotFound) => Err(SyncError::NoIntersection(points.to_vec())),
            Err(e) => Err(SyncError::RangeQueryFailed(e)),
        }
    }
}
