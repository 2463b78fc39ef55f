//! Live pool monitoring engine
//!
//! One subscription task per monitored pool, driving a typed broadcast
//! channel. Each observed swap recomputes price and tick, updates the
//! pool cache, runs alert crossing detection and fans the event out to
//! any listeners layered on the pool (position range watchers among
//! them). Per-pool state machine: Unmonitored -> Subscribing -> Active
//! -> Unsubscribed.

mod events;

pub use events::{RangeWatchHandle, SwapEvent};

use crate::alerts::{AlertRegistry, PriceAlert};
use crate::chain::{ChainReader, SwapLog, SwapSubscription};
use crate::errors::{CacheError, MathError, MonitorError};
use crate::logger::{self, LogTag};
use crate::math::{self, PoolPrice};
use crate::notify::NotificationSink;
use crate::pools::{Pool, PoolCache, ResolvedPool};
use crate::positions::Position;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Unmonitored,
    Subscribing,
    Active,
    Unsubscribed,
}

struct PoolMonitor {
    state: MonitorState,
    /// Kept alive across stop/start cycles so listeners layered on the
    /// pool survive a re-subscribe untouched.
    events: broadcast::Sender<SwapEvent>,
    task: Option<JoinHandle<()>>,
}

pub struct MonitorEngine {
    chain: Arc<dyn ChainReader>,
    pools: Arc<PoolCache>,
    alerts: Arc<AlertRegistry>,
    sink: Arc<dyn NotificationSink>,
    monitors: Mutex<HashMap<String, PoolMonitor>>,
}

impl MonitorEngine {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        pools: Arc<PoolCache>,
        alerts: Arc<AlertRegistry>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            chain,
            pools,
            alerts,
            sink,
            monitors: Mutex::new(HashMap::new()),
        }
    }

    pub fn state(&self, pool_id: &str) -> MonitorState {
        let monitors = self.monitors.lock().unwrap();
        monitors
            .get(pool_id)
            .map(|monitor| monitor.state)
            .unwrap_or(MonitorState::Unmonitored)
    }

    /// Subscribe to a pool's swap events. Idempotent: calling it while
    /// the pool is already subscribing or active is a no-op, so callers
    /// cannot stack duplicate subscriptions.
    pub async fn start_monitoring(self: &Arc<Self>, pool: &Pool) -> Result<(), MonitorError> {
        {
            let mut monitors = self.monitors.lock().unwrap();
            if let Some(monitor) = monitors.get(&pool.id) {
                if matches!(
                    monitor.state,
                    MonitorState::Subscribing | MonitorState::Active
                ) {
                    logger::debug(
                        LogTag::Monitor,
                        &format!("{} already monitored, ignoring", pool.id),
                    );
                    return Ok(());
                }
            }
            let events = monitors
                .get(&pool.id)
                .map(|monitor| monitor.events.clone())
                .unwrap_or_else(|| broadcast::channel(EVENT_CHANNEL_CAPACITY).0);
            monitors.insert(
                pool.id.clone(),
                PoolMonitor {
                    state: MonitorState::Subscribing,
                    events,
                    task: None,
                },
            );
        }

        let subscription = match self.chain.subscribe_swaps(pool.address).await {
            Ok(subscription) => subscription,
            Err(e) => {
                let mut monitors = self.monitors.lock().unwrap();
                if let Some(monitor) = monitors.get_mut(&pool.id) {
                    monitor.state = MonitorState::Unmonitored;
                }
                return Err(e.into());
            }
        };

        let engine = Arc::clone(self);
        let pool_id = pool.id.clone();
        let task = tokio::spawn(async move {
            run_pool_stream(engine, pool_id, subscription).await;
        });

        let mut monitors = self.monitors.lock().unwrap();
        match monitors.get_mut(&pool.id) {
            Some(monitor) if monitor.state == MonitorState::Subscribing => {
                monitor.state = MonitorState::Active;
                monitor.task = Some(task);
                logger::info(LogTag::Monitor, &format!("monitoring {}", pool.id));
            }
            _ => {
                // Stopped while we were subscribing
                task.abort();
            }
        }
        Ok(())
    }

    /// Release a pool's subscription. Idempotent and safe when the
    /// handle is already gone; other pools and listeners layered on this
    /// pool's channel are left untouched.
    pub fn stop_monitoring(&self, pool_id: &str) {
        let mut monitors = self.monitors.lock().unwrap();
        if let Some(monitor) = monitors.get_mut(pool_id) {
            if let Some(task) = monitor.task.take() {
                task.abort();
            }
            if monitor.state != MonitorState::Unsubscribed {
                monitor.state = MonitorState::Unsubscribed;
                logger::info(LogTag::Monitor, &format!("stopped monitoring {}", pool_id));
            }
        }
    }

    /// Listener access to a pool's typed event channel. The channel
    /// exists independently of the subscription state, so listeners can
    /// attach before monitoring starts.
    pub fn subscribe(&self, pool_id: &str) -> broadcast::Receiver<SwapEvent> {
        let mut monitors = self.monitors.lock().unwrap();
        monitors
            .entry(pool_id.to_string())
            .or_insert_with(|| PoolMonitor {
                state: MonitorState::Unmonitored,
                events: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
                task: None,
            })
            .events
            .subscribe()
    }

    fn event_sender(&self, pool_id: &str) -> Option<broadcast::Sender<SwapEvent>> {
        let monitors = self.monitors.lock().unwrap();
        monitors.get(pool_id).map(|monitor| monitor.events.clone())
    }

    /// Process one decoded swap log end to end.
    async fn handle_swap(&self, pool_id: &str, swap: SwapLog) -> Result<(), MonitorError> {
        let mut pool = self
            .pools
            .get_by_id(pool_id)?
            .ok_or_else(|| MonitorError::UnknownPool(pool_id.to_string()))?;
        let resolved = self.pools.resolve(&pool).await?;

        let price = math::price_from_sqrt_x96(
            swap.sqrt_price_x96,
            resolved.token0.decimals,
            resolved.token1.decimals,
        );
        let (volume, volume_token) = swap_volume(&swap, &resolved).map_err(CacheError::from)?;

        // The price seen before this swap seeds crossing detection; a
        // fresh pool record has none and only establishes the baseline.
        let previous = pool.last_price;
        self.pools.apply_swap(&mut pool, &swap, &price)?;

        if let Some(current) = price.finite() {
            let fired = self.alerts.check_crossings(pool_id, previous, current);
            for alert in fired {
                self.notify_alert(&resolved, &alert, current).await;
            }
        }

        if let Some(sender) = self.event_sender(pool_id) {
            // Send fails only when no listener is attached; that is fine
            let _ = sender.send(SwapEvent {
                pool_id: pool_id.to_string(),
                price,
                tick: swap.tick,
                volume,
                volume_token,
            });
        }
        Ok(())
    }

    async fn notify_alert(&self, resolved: &ResolvedPool, alert: &PriceAlert, current: Decimal) {
        let text = format!(
            "🔔 {} crossed {}: price is now {}",
            resolved.pair_label(),
            alert.target_price,
            current
        );
        let delivery = match &alert.message {
            Some(message) => self.sink.edit(&alert.chat_key, message, &text).await,
            None => self.sink.send(&alert.chat_key, &text).await.map(|_| ()),
        };
        match delivery {
            Ok(()) => logger::info(
                LogTag::Alerts,
                &format!(
                    "alert fired on {} at target {}",
                    resolved.pool.id, alert.target_price
                ),
            ),
            Err(e) => logger::error(
                LogTag::Alerts,
                &format!("failed to deliver alert to {}: {}", alert.chat_key, e),
            ),
        }
    }

    /// Attach a range watcher to the position's pool channel. A pinned
    /// status message is edited on every swap with price, bounds and the
    /// in-range flag; a separate notification goes out whenever the flag
    /// flips relative to the previously emitted value. Returns an
    /// explicit handle, detachable independently of the pool
    /// subscription.
    pub async fn watch_position(
        self: &Arc<Self>,
        position: &Position,
        destination: &str,
    ) -> Result<RangeWatchHandle, MonitorError> {
        let pool = self
            .pools
            .get_by_id(&position.pool_id)?
            .ok_or_else(|| MonitorError::UnknownPool(position.pool_id.clone()))?;
        let resolved = self.pools.resolve(&pool).await?;

        let lower_price = math::price_at_tick(
            position.tick_lower,
            resolved.token0.decimals,
            resolved.token1.decimals,
        )
        .map_err(CacheError::from)?;
        let upper_price = math::price_at_tick(
            position.tick_upper,
            resolved.token0.decimals,
            resolved.token1.decimals,
        )
        .map_err(CacheError::from)?;

        let mut in_range = math::in_range(pool.tick, position.tick_lower, position.tick_upper);
        let pair = resolved.pair_label();
        let status = render_status(&pair, &resolved.price(), pool.tick, &lower_price, &upper_price, in_range);
        let message = self.sink.send(destination, &status).await?;

        let mut events = self.subscribe(&position.pool_id);
        let sink = self.sink.clone();
        let destination = destination.to_string();
        let position_id = position.id.clone();
        let (tick_lower, tick_upper) = (position.tick_lower, position.tick_upper);

        let task = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        logger::warning(
                            LogTag::Monitor,
                            &format!("range watch {} lagged, skipped {} events", position_id, skipped),
                        );
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                let now_in_range = math::in_range(event.tick, tick_lower, tick_upper);
                let status = render_status(
                    &pair,
                    &event.price,
                    event.tick,
                    &lower_price,
                    &upper_price,
                    now_in_range,
                );
                if let Err(e) = sink.edit(&destination, &message, &status).await {
                    logger::warning(
                        LogTag::Monitor,
                        &format!("failed to update status for {}: {}", position_id, e),
                    );
                }

                if now_in_range != in_range {
                    let text = if now_in_range {
                        format!("✅ {} position is back in range at {}", pair, event.price)
                    } else {
                        format!(
                            "⚠️ {} position left its range: price {} outside {} - {}",
                            pair, event.price, lower_price, upper_price
                        )
                    };
                    if let Err(e) = sink.send(&destination, &text).await {
                        logger::warning(
                            LogTag::Monitor,
                            &format!("failed to deliver range alert for {}: {}", position_id, e),
                        );
                    }
                    in_range = now_in_range;
                }
            }
            logger::debug(LogTag::Monitor, &format!("range watch {} detached", position_id));
        });

        Ok(RangeWatchHandle::new(position.id.clone(), task))
    }
}

async fn run_pool_stream(
    engine: Arc<MonitorEngine>,
    pool_id: String,
    mut subscription: SwapSubscription,
) {
    while let Some(swap) = subscription.events.recv().await {
        // One bad event must not tear the stream down
        if let Err(e) = engine.handle_swap(&pool_id, swap).await {
            logger::warning(
                LogTag::Monitor,
                &format!("skipping swap event on {}: {}", pool_id, e),
            );
        }
    }
    logger::info(LogTag::Monitor, &format!("swap stream for {} closed", pool_id));
}

/// Volume of the dominant side of a swap: the leg with a nonzero signed
/// amount, token0 winning when both legs report one. Absolute value.
fn swap_volume(swap: &SwapLog, resolved: &ResolvedPool) -> Result<(Decimal, String), MathError> {
    if !swap.amount0.is_zero() {
        Ok((
            math::signed_amount_to_decimal(swap.amount0, resolved.token0.decimals)?,
            resolved.token0.symbol.clone(),
        ))
    } else {
        Ok((
            math::signed_amount_to_decimal(swap.amount1, resolved.token1.decimals)?,
            resolved.token1.symbol.clone(),
        ))
    }
}

fn render_status(
    pair: &str,
    price: &PoolPrice,
    tick: i32,
    lower: &PoolPrice,
    upper: &PoolPrice,
    in_range: bool,
) -> String {
    format!(
        "{} | price {} | tick {} | range {} - {} | {}",
        pair,
        price,
        tick,
        lower,
        upper,
        if in_range { "in range" } else { "out of range" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::testing::MockChainReader;
    use crate::chain::PoolState;
    use crate::notify::testing::RecordingSink;
    use crate::pools::PoolKey;
    use crate::store::Store;
    use crate::tokens::TokenCache;
    use alloy_primitives::{Address, I256, U256};
    use std::str::FromStr;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn dai() -> Address {
        Address::from_str("0x6b175474e89094c44da98b954eedeac495271d0f").unwrap()
    }

    fn usdc() -> Address {
        Address::from_str("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48").unwrap()
    }

    fn pool_address() -> Address {
        Address::from_str("0x5777d92f208679db4b9778590fa3cab3ac9e2168").unwrap()
    }

    fn other_pool_address() -> Address {
        Address::from_str("0x6c6bc977e13df9b0de53b251522280bb72383700").unwrap()
    }

    fn q96() -> U256 {
        U256::from(1u8) << 96
    }

    /// sqrt price scaled by `numerator / denominator` from parity.
    fn sqrt_scaled(numerator: u64, denominator: u64) -> U256 {
        q96() * U256::from(numerator) / U256::from(denominator)
    }

    fn swap_at(sqrt_price_x96: U256, tick: i32) -> SwapLog {
        SwapLog {
            amount0: I256::try_from(1_000_000i64).unwrap(),
            amount1: I256::try_from(-1_000_000i64).unwrap(),
            sqrt_price_x96,
            liquidity: Some(5_000_000),
            tick,
        }
    }

    struct Harness {
        engine: Arc<MonitorEngine>,
        chain: Arc<MockChainReader>,
        alerts: Arc<AlertRegistry>,
        sink: Arc<RecordingSink>,
        store: Store,
        pools: Arc<PoolCache>,
    }

    async fn setup() -> (Harness, Pool) {
        let chain = Arc::new(MockChainReader::new());
        chain.seed_token(dai(), "DAI", 6, "Dai Stablecoin");
        chain.seed_token(usdc(), "USDC", 6, "USD Coin");
        for address in [pool_address(), other_pool_address()] {
            chain.seed_pool(
                address,
                PoolState {
                    token0: dai(),
                    token1: usdc(),
                    fee: 100,
                    tick_spacing: 1,
                    sqrt_price_x96: q96(),
                    tick: 0,
                    liquidity: 1_000_000,
                },
            );
        }

        let store = Store::open_in_memory().unwrap();
        let tokens = Arc::new(TokenCache::new(store.clone(), chain.clone()));
        let pools = Arc::new(PoolCache::new(store.clone(), chain.clone(), tokens));
        let alerts = Arc::new(AlertRegistry::new());
        let sink = Arc::new(RecordingSink::new());
        let engine = Arc::new(MonitorEngine::new(
            chain.clone(),
            pools.clone(),
            alerts.clone(),
            sink.clone(),
        ));

        let pool = pools
            .fetch_or_create(&PoolKey::new("1", pool_address()))
            .await
            .unwrap();
        let harness = Harness {
            engine,
            chain,
            alerts,
            sink,
            store,
            pools,
        };
        (harness, pool)
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not met within timeout");
    }

    #[tokio::test]
    async fn test_start_monitoring_is_idempotent() {
        let (h, pool) = setup().await;

        h.engine.start_monitoring(&pool).await.unwrap();
        assert_eq!(h.engine.state(&pool.id), MonitorState::Active);

        // Second call must not stack another subscription
        h.engine.start_monitoring(&pool).await.unwrap();
        assert_eq!(h.chain.subscribe_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.engine.state(&pool.id), MonitorState::Active);
    }

    #[tokio::test]
    async fn test_swap_updates_pool_and_broadcasts() {
        let (h, pool) = setup().await;
        h.engine.start_monitoring(&pool).await.unwrap();
        let mut events = h.engine.subscribe(&pool.id);

        h.chain
            .push_swap(pool_address(), swap_at(sqrt_scaled(11, 10), 1906))
            .await;

        wait_for(|| {
            h.store
                .get_pool(&pool.id)
                .unwrap()
                .unwrap()
                .tick == 1906
        })
        .await;

        let updated = h.store.get_pool(&pool.id).unwrap().unwrap();
        assert_eq!(updated.sqrt_price_x96, sqrt_scaled(11, 10));
        assert_eq!(updated.liquidity, 5_000_000);
        // 1.1^2 = 1.21
        assert_eq!(updated.last_price.unwrap().round_dp(8).to_string(), "1.21000000");

        let event = events.recv().await.unwrap();
        assert_eq!(event.pool_id, pool.id);
        assert_eq!(event.tick, 1906);
        assert_eq!(event.volume, Decimal::from(1));
        assert_eq!(event.volume_token, "DAI");
    }

    #[tokio::test]
    async fn test_first_price_seeds_then_crossing_fires_once() {
        let (h, pool) = setup().await;
        h.engine.start_monitoring(&pool).await.unwrap();
        h.alerts.add(
            &pool.id,
            PriceAlert::new(Decimal::from_str("1.1").unwrap(), "chat-1", None),
        );

        // First observation only seeds the baseline (previous price is
        // missing), even though 1.21 is beyond the 1.1 target
        h.chain
            .push_swap(pool_address(), swap_at(sqrt_scaled(11, 10), 1906))
            .await;
        wait_for(|| h.store.get_pool(&pool.id).unwrap().unwrap().tick == 1906).await;
        assert_eq!(h.sink.sent_count(), 0);
        assert_eq!(h.alerts.active_count(&pool.id), 1);

        // 1.21 -> 0.9025 crosses 1.1 downward: exactly one delivery
        h.chain
            .push_swap(pool_address(), swap_at(sqrt_scaled(95, 100), -1026))
            .await;
        wait_for(|| h.sink.sent_count() == 1).await;
        assert_eq!(h.alerts.active_count(&pool.id), 0);

        // Crossing back up again cannot re-fire the consumed alert
        h.chain
            .push_swap(pool_address(), swap_at(sqrt_scaled(11, 10), 1906))
            .await;
        wait_for(|| h.store.get_pool(&pool.id).unwrap().unwrap().tick == 1906).await;
        assert_eq!(h.sink.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_monitoring_is_idempotent_and_isolated() {
        let (h, pool) = setup().await;
        let other = h
            .pools
            .fetch_or_create(&PoolKey::new("1", other_pool_address()))
            .await
            .unwrap();

        h.engine.start_monitoring(&pool).await.unwrap();
        h.engine.start_monitoring(&other).await.unwrap();

        h.engine.stop_monitoring(&pool.id);
        assert_eq!(h.engine.state(&pool.id), MonitorState::Unsubscribed);
        // Stopping twice (handle already gone) is a no-op
        h.engine.stop_monitoring(&pool.id);
        // Stopping a pool that was never monitored is a no-op too
        h.engine.stop_monitoring("1:0x0000000000000000000000000000000000000abc");

        // The other pool's subscription keeps processing
        assert_eq!(h.engine.state(&other.id), MonitorState::Active);
        h.chain
            .push_swap(other_pool_address(), swap_at(sqrt_scaled(11, 10), 1906))
            .await;
        wait_for(|| h.store.get_pool(&other.id).unwrap().unwrap().tick == 1906).await;
    }

    #[tokio::test]
    async fn test_restart_after_stop_resubscribes() {
        let (h, pool) = setup().await;
        h.engine.start_monitoring(&pool).await.unwrap();
        h.engine.stop_monitoring(&pool.id);

        h.engine.start_monitoring(&pool).await.unwrap();
        assert_eq!(h.engine.state(&pool.id), MonitorState::Active);
        assert_eq!(h.chain.subscribe_calls.load(Ordering::SeqCst), 2);

        h.chain
            .push_swap(pool_address(), swap_at(sqrt_scaled(11, 10), 1906))
            .await;
        wait_for(|| h.store.get_pool(&pool.id).unwrap().unwrap().tick == 1906).await;
    }

    #[tokio::test]
    async fn test_malformed_event_is_skipped_stream_survives() {
        let (h, pool) = setup().await;
        h.engine.start_monitoring(&pool).await.unwrap();

        // Volume cannot be rendered (abs value exceeds any token amount);
        // the event is dropped, the stream is not
        let mut broken = swap_at(sqrt_scaled(11, 10), 1906);
        broken.amount0 = I256::MAX;
        h.chain.push_swap(pool_address(), broken).await;

        h.chain
            .push_swap(pool_address(), swap_at(sqrt_scaled(12, 10), 3646))
            .await;
        wait_for(|| h.store.get_pool(&pool.id).unwrap().unwrap().tick == 3646).await;
        assert_eq!(h.engine.state(&pool.id), MonitorState::Active);
    }

    fn watched_position(pool_id: &str) -> Position {
        Position {
            id: format!("{}:7", pool_id),
            chain_id: "1".to_string(),
            manager: Address::from_str("0xc36442b4a4522e871399cd717abdd847ab11fe88")
                .unwrap(),
            token_id: 7,
            owner: Address::from_str("0x1111111111111111111111111111111111111111")
                .unwrap(),
            pool_id: pool_id.to_string(),
            tick_lower: -10,
            tick_upper: 10,
            liquidity: 1_000_000,
            is_staked: false,
        }
    }

    #[tokio::test]
    async fn test_watch_position_emits_range_transitions() {
        let (h, pool) = setup().await;
        h.engine.start_monitoring(&pool).await.unwrap();
        let position = watched_position(&pool.id);

        let _watch = h
            .engine
            .watch_position(&position, "chat-9")
            .await
            .unwrap();
        // Initial pinned status message
        assert_eq!(h.sink.sent_count(), 1);

        // Tick 5 stays inside [-10, 10): status edit, no transition
        h.chain.push_swap(pool_address(), swap_at(q96(), 5)).await;
        wait_for(|| h.sink.edit_count() == 1).await;
        assert_eq!(h.sink.sent_count(), 1);

        // Tick 15 leaves the range: edit plus a transition notification
        h.chain.push_swap(pool_address(), swap_at(q96(), 15)).await;
        wait_for(|| h.sink.sent_count() == 2).await;
        let sent = h.sink.sent.lock().unwrap();
        assert!(sent[1].1.contains("left its range"));
        drop(sent);

        // Still out of range: edited, but no repeated transition
        h.chain.push_swap(pool_address(), swap_at(q96(), 20)).await;
        wait_for(|| h.sink.edit_count() == 3).await;
        assert_eq!(h.sink.sent_count(), 2);

        // Back inside: second transition
        h.chain.push_swap(pool_address(), swap_at(q96(), 0)).await;
        wait_for(|| h.sink.sent_count() == 3).await;
        let sent = h.sink.sent.lock().unwrap();
        assert!(sent[2].1.contains("back in range"));
    }

    #[tokio::test]
    async fn test_watch_position_upper_bound_is_exclusive() {
        let (h, pool) = setup().await;
        h.engine.start_monitoring(&pool).await.unwrap();
        let position = watched_position(&pool.id);

        let _watch = h
            .engine
            .watch_position(&position, "chat-9")
            .await
            .unwrap();

        // Sitting exactly on the upper tick counts as out of range
        h.chain.push_swap(pool_address(), swap_at(q96(), 10)).await;
        wait_for(|| h.sink.sent_count() == 2).await;
        let sent = h.sink.sent.lock().unwrap();
        assert!(sent[1].1.contains("left its range"));
        drop(sent);

        // The lower bound is inclusive: tick -10 is back in range
        h.chain.push_swap(pool_address(), swap_at(q96(), -10)).await;
        wait_for(|| h.sink.sent_count() == 3).await;
    }

    #[tokio::test]
    async fn test_watcher_detaches_independently_of_pool_subscription() {
        let (h, pool) = setup().await;
        h.engine.start_monitoring(&pool).await.unwrap();
        let position = watched_position(&pool.id);

        let mut watch = h
            .engine
            .watch_position(&position, "chat-9")
            .await
            .unwrap();

        // Detaching the watcher leaves the pool subscription running
        watch.stop();
        h.chain
            .push_swap(pool_address(), swap_at(sqrt_scaled(11, 10), 1906))
            .await;
        wait_for(|| h.store.get_pool(&pool.id).unwrap().unwrap().tick == 1906).await;
        assert_eq!(h.engine.state(&pool.id), MonitorState::Active);

        // And stopping the pool after the watcher is gone is still fine
        h.engine.stop_monitoring(&pool.id);
        watch.stop(); // second stop of a dead watcher: no-op
    }
}
