//! Typed event payloads for the per-pool publish/subscribe channels.

use crate::math::PoolPrice;
use rust_decimal::Decimal;
use tokio::task::JoinHandle;

/// Broadcast on a pool's channel after every processed swap.
#[derive(Debug, Clone)]
pub struct SwapEvent {
    pub pool_id: String,
    pub price: PoolPrice,
    pub tick: i32,
    /// Absolute trade size of the dominant token side.
    pub volume: Decimal,
    /// Symbol of the token the volume is denominated in.
    pub volume_token: String,
}

/// Explicit unsubscribe handle for a position range watch, detachable
/// independently of the pool's own subscription.
pub struct RangeWatchHandle {
    pub position_id: String,
    task: Option<JoinHandle<()>>,
}

impl RangeWatchHandle {
    pub(super) fn new(position_id: String, task: JoinHandle<()>) -> Self {
        Self {
            position_id,
            task: Some(task),
        }
    }

    /// Detach the listener. Idempotent; safe after the pool's own
    /// subscription is already gone.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for RangeWatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
