use super::{Position, PositionKey};
use crate::cache::TtlCache;
use crate::chain::ChainReader;
use crate::errors::{CacheError, ChainError, StoreError};
use crate::logger::{self, LogTag};
use crate::pools::{PoolCache, PoolKey, ResolvedPool};
use crate::store::Store;
use alloy_primitives::Address;
use std::sync::Arc;
use std::time::Duration;

/// Raw staking rewards are memoized briefly so repeated fee inspections
/// do not turn into repeated RPC calls.
const REWARD_CACHE_TTL: Duration = Duration::from_secs(60);

/// Lazy, store-backed cache of NFT liquidity positions.
///
/// Positions reference their pool by id; the pool (and its tokens) are
/// hydrated first on a miss so the reference always resolves.
pub struct PositionCache {
    pub(super) store: Store,
    pub(super) chain: Arc<dyn ChainReader>,
    pub(super) pools: Arc<PoolCache>,
    pub(super) rewards: TtlCache<String, u128>,
}

impl PositionCache {
    pub fn new(store: Store, chain: Arc<dyn ChainReader>, pools: Arc<PoolCache>) -> Self {
        Self {
            store,
            chain,
            pools,
            rewards: TtlCache::new(REWARD_CACHE_TTL),
        }
    }

    /// Store lookup only; never calls the chain.
    pub fn get(&self, key: &PositionKey) -> Result<Option<Position>, CacheError> {
        Ok(self.store.get_position(&key.id())?)
    }

    /// Get the position, hydrating it (pool first) on a store miss.
    pub async fn fetch_or_create(&self, key: &PositionKey) -> Result<Position, CacheError> {
        if let Some(position) = self.store.get_position(&key.id())? {
            return Ok(position);
        }

        let info = match self.chain.position_info(key.token_id).await {
            Ok(info) => info,
            Err(ChainError::EmptyResponse(_)) => {
                return Err(CacheError::NotFoundUpstream(key.id()));
            }
            Err(e) => return Err(e.into()),
        };

        if info.tick_lower >= info.tick_upper {
            return Err(CacheError::Invariant(format!(
                "position {} reports bounds [{}, {}]",
                key.id(),
                info.tick_lower,
                info.tick_upper
            )));
        }

        let owner = self.chain.owner_of(key.token_id).await?;
        let is_staked = self.chain.is_staked(key.token_id).await?;

        // Dependency chain: pool (which in turn hydrates its tokens)
        let pool_address = self
            .chain
            .find_pool(info.token0, info.token1, info.fee)
            .await?;
        let pool = self
            .pools
            .fetch_or_create(&PoolKey::new(&key.chain_id, pool_address))
            .await?;

        let position = Position {
            id: key.id(),
            chain_id: key.chain_id.clone(),
            manager: key.manager,
            token_id: key.token_id,
            owner,
            pool_id: pool.id,
            tick_lower: info.tick_lower,
            tick_upper: info.tick_upper,
            liquidity: info.liquidity,
            is_staked,
        };

        match self.store.insert_position(&position) {
            Ok(()) => {
                logger::debug(
                    LogTag::Positions,
                    &format!("hydrated position {} owner {:#x}", position.id, owner),
                );
                Ok(position)
            }
            Err(StoreError::Duplicate(_)) => self
                .store
                .get_position(&key.id())?
                .ok_or_else(|| CacheError::NotFoundUpstream(key.id())),
            Err(e) => Err(e.into()),
        }
    }

    /// Re-read the mutable fields from the chain and persist them.
    /// Boundaries are immutable on-chain, but a stale earlier read gets
    /// corrected here as well.
    pub async fn refresh(&self, position: &Position) -> Result<Position, CacheError> {
        let info = match self.chain.position_info(position.token_id).await {
            Ok(info) => info,
            Err(ChainError::EmptyResponse(_)) => {
                return Err(CacheError::NotFoundUpstream(position.id.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        let owner = self.chain.owner_of(position.token_id).await?;
        let is_staked = self.chain.is_staked(position.token_id).await?;

        let mut updated = position.clone();
        updated.owner = owner;
        updated.tick_lower = info.tick_lower;
        updated.tick_upper = info.tick_upper;
        updated.liquidity = info.liquidity;
        updated.is_staked = is_staked;

        if updated != *position {
            self.store.update_position(&updated)?;
        }
        Ok(updated)
    }

    /// Enumerate a wallet's positions on the manager and hydrate each.
    /// Closed positions (zero liquidity) are kept; listings filter them
    /// with [`PositionCache::is_empty`].
    pub async fn scan_wallet(
        &self,
        chain_id: &str,
        manager: Address,
        owner: Address,
    ) -> Result<Vec<Position>, CacheError> {
        let token_ids = self.chain.positions_of_owner(owner).await?;
        let mut positions = Vec::with_capacity(token_ids.len());
        for token_id in token_ids {
            let key = PositionKey::new(chain_id, manager, token_id);
            positions.push(self.fetch_or_create(&key).await?);
        }
        logger::info(
            LogTag::Positions,
            &format!("wallet {:#x} scan found {} positions", owner, positions.len()),
        );
        Ok(positions)
    }

    /// Resolve the position's pool reference (with its tokens),
    /// re-hydrating from the chain if the record vanished out-of-band.
    pub async fn resolve_pool(&self, position: &Position) -> Result<ResolvedPool, CacheError> {
        let pool = match self.pools.get_by_id(&position.pool_id)? {
            Some(pool) => pool,
            None => {
                logger::warning(
                    LogTag::Positions,
                    &format!(
                        "pool reference {} missing from store, re-hydrating",
                        position.pool_id
                    ),
                );
                let key = PoolKey::parse(&position.pool_id)?;
                self.pools.fetch_or_create(&key).await?
            }
        };
        self.pools.resolve(&pool).await
    }

    pub fn positions_by_owner(
        &self,
        chain_id: &str,
        owner: Address,
    ) -> Result<Vec<Position>, CacheError> {
        Ok(self.store.get_positions_by_owner(chain_id, owner)?)
    }

    pub fn positions_by_pool(&self, pool_id: &str) -> Result<Vec<Position>, CacheError> {
        Ok(self.store.get_positions_by_pool(pool_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::testing::MockChainReader;
    use crate::chain::{PoolState, PositionInfo};
    use crate::tokens::TokenCache;
    use alloy_primitives::U256;
    use std::str::FromStr;
    use std::sync::atomic::Ordering;

    fn weth() -> Address {
        Address::from_str("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2").unwrap()
    }

    fn usdc() -> Address {
        Address::from_str("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48").unwrap()
    }

    fn pool_address() -> Address {
        Address::from_str("0x88e6a0c2ddd26feeb64f039a2c41296fcb3f5640").unwrap()
    }

    fn manager() -> Address {
        Address::from_str("0xc36442b4a4522e871399cd717abdd847ab11fe88").unwrap()
    }

    fn owner() -> Address {
        Address::from_str("0x1111111111111111111111111111111111111111").unwrap()
    }

    fn setup() -> (Arc<PositionCache>, Arc<MockChainReader>, Store) {
        let chain = Arc::new(MockChainReader::new());
        chain.seed_token(weth(), "WETH", 18, "Wrapped Ether");
        chain.seed_token(usdc(), "USDC", 6, "USD Coin");
        chain.seed_pool(
            pool_address(),
            PoolState {
                token0: weth(),
                token1: usdc(),
                fee: 500,
                tick_spacing: 10,
                sqrt_price_x96: U256::from_str_radix("4739784103548144228237312", 10)
                    .unwrap(),
                tick: -194492,
                liquidity: 1_000_000,
            },
        );
        chain.seed_position(
            42,
            owner(),
            PositionInfo {
                token0: weth(),
                token1: usdc(),
                fee: 500,
                tick_lower: -195000,
                tick_upper: -194000,
                liquidity: 50_000,
            },
        );

        let store = Store::open_in_memory().unwrap();
        let tokens = Arc::new(TokenCache::new(store.clone(), chain.clone()));
        let pools = Arc::new(PoolCache::new(store.clone(), chain.clone(), tokens));
        let positions = Arc::new(PositionCache::new(store.clone(), chain.clone(), pools));
        (positions, chain, store)
    }

    #[tokio::test]
    async fn test_fetch_or_create_hydrates_dependency_chain() {
        let (positions, _, store) = setup();
        let key = PositionKey::new("1", manager(), 42);

        let position = positions.fetch_or_create(&key).await.unwrap();
        assert_eq!(position.owner, owner());
        assert_eq!(position.pool_id, format!("1:{:#x}", pool_address()));
        assert_eq!(position.liquidity, 50_000);
        assert!(!position.is_staked);

        // Pool and both tokens were persisted along the way
        assert_eq!(store.count_pools().unwrap(), 1);
        assert_eq!(store.count_tokens().unwrap(), 2);
        assert_eq!(store.count_positions().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_position_surfaces_not_found() {
        let (positions, _, _) = setup();
        let key = PositionKey::new("1", manager(), 999);
        assert!(matches!(
            positions.fetch_or_create(&key).await,
            Err(CacheError::NotFoundUpstream(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_picks_up_liquidity_change() {
        let (positions, chain, _) = setup();
        let key = PositionKey::new("1", manager(), 42);
        let position = positions.fetch_or_create(&key).await.unwrap();

        // Liquidity withdrawn on-chain
        chain.seed_position(
            42,
            owner(),
            PositionInfo {
                token0: weth(),
                token1: usdc(),
                fee: 500,
                tick_lower: -195000,
                tick_upper: -194000,
                liquidity: 0,
            },
        );

        let refreshed = positions.refresh(&position).await.unwrap();
        assert_eq!(refreshed.liquidity, 0);
        assert!(refreshed.is_closed());

        // The record persists for history
        let stored = positions.get(&key).unwrap().unwrap();
        assert_eq!(stored.liquidity, 0);
    }

    #[tokio::test]
    async fn test_scan_wallet_hydrates_each_position() {
        let (positions, chain, _) = setup();
        chain.seed_position(
            43,
            owner(),
            PositionInfo {
                token0: weth(),
                token1: usdc(),
                fee: 500,
                tick_lower: -200000,
                tick_upper: -190000,
                liquidity: 9_000,
            },
        );

        let found = positions.scan_wallet("1", manager(), owner()).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].token_id, 42);
        assert_eq!(found[1].token_id, 43);

        let by_owner = positions.positions_by_owner("1", owner()).unwrap();
        assert_eq!(by_owner.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_fetch_converges_on_one_row() {
        let (positions, _, store) = setup();
        let key = PositionKey::new("1", manager(), 42);

        let mut handles = Vec::new();
        for _ in 0..6 {
            let positions = positions.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                positions.fetch_or_create(&key).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().id, key.id());
        }
        assert_eq!(store.count_positions().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_resolve_pool_rehydrates_missing_reference() {
        let (positions, chain, store) = setup();
        let key = PositionKey::new("1", manager(), 42);
        let position = positions.fetch_or_create(&key).await.unwrap();

        // Drop the pool row out-of-band; resolve_pool must repair it
        store.delete_pool(&position.pool_id).unwrap();
        assert_eq!(store.count_pools().unwrap(), 0);

        let pool_calls_before = chain.pool_state_calls.load(Ordering::SeqCst);
        let resolved = positions.resolve_pool(&position).await.unwrap();
        assert_eq!(resolved.pool.id, position.pool_id);
        assert_eq!(
            chain.pool_state_calls.load(Ordering::SeqCst),
            pool_calls_before + 1
        );
        assert_eq!(store.count_pools().unwrap(), 1);
    }
}
