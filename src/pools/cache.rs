use super::{Pool, PoolKey};
use crate::chain::{ChainReader, SwapLog};
use crate::errors::{CacheError, ChainError, StoreError};
use crate::logger::{self, LogTag};
use crate::math::{self, PoolPrice};
use crate::store::Store;
use crate::tokens::{Token, TokenCache, TokenKey};
use rust_decimal::Decimal;
use std::sync::Arc;

/// A pool together with its resolved token references.
#[derive(Debug, Clone)]
pub struct ResolvedPool {
    pub pool: Pool,
    pub token0: Token,
    pub token1: Token,
}

impl ResolvedPool {
    /// Current price from the cached sqrt price, token1 per token0.
    pub fn price(&self) -> PoolPrice {
        math::price_from_sqrt_x96(
            self.pool.sqrt_price_x96,
            self.token0.decimals,
            self.token1.decimals,
        )
    }

    pub fn pair_label(&self) -> String {
        format!("{}/{}", self.token0.symbol, self.token1.symbol)
    }
}

/// Token balances sitting in the pool contract, in decimal units.
#[derive(Debug, Clone)]
pub struct PoolTvl {
    pub amount0: Decimal,
    pub amount1: Decimal,
    /// Combined value denominated in token1, when the price is finite.
    pub value_in_token1: Option<Decimal>,
}

/// Lazy, store-backed cache of pool state.
///
/// Pools reference their tokens by id rather than embedding them, so a
/// later correction to a token record is visible to every pool using it.
pub struct PoolCache {
    store: Store,
    chain: Arc<dyn ChainReader>,
    tokens: Arc<TokenCache>,
}

impl PoolCache {
    pub fn new(store: Store, chain: Arc<dyn ChainReader>, tokens: Arc<TokenCache>) -> Self {
        Self {
            store,
            chain,
            tokens,
        }
    }

    /// Store lookup only; never calls the chain.
    pub fn get(&self, key: &PoolKey) -> Result<Option<Pool>, CacheError> {
        Ok(self.store.get_pool(&key.id())?)
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<Pool>, CacheError> {
        Ok(self.store.get_pool(id)?)
    }

    /// Get the pool, hydrating it (and its tokens, first) on a store miss.
    /// Racing callers converge on one persisted row via the
    /// insert/duplicate-discard protocol.
    pub async fn fetch_or_create(&self, key: &PoolKey) -> Result<Pool, CacheError> {
        if let Some(pool) = self.store.get_pool(&key.id())? {
            return Ok(pool);
        }

        let state = match self.chain.pool_state(key.address).await {
            Ok(state) => state,
            Err(ChainError::EmptyResponse(_)) => {
                return Err(CacheError::NotFoundUpstream(key.id()));
            }
            Err(e) => return Err(e.into()),
        };

        if state.token0 == state.token1 {
            return Err(CacheError::Invariant(format!(
                "pool {} reports identical tokens {:#x}",
                key.id(),
                state.token0
            )));
        }

        // Dependencies hydrate first and are referenced by id, never
        // copied inline.
        let token0 = self
            .tokens
            .fetch_or_create(&TokenKey::new(&key.chain_id, state.token0))
            .await?;
        let token1 = self
            .tokens
            .fetch_or_create(&TokenKey::new(&key.chain_id, state.token1))
            .await?;

        let pool = Pool {
            id: key.id(),
            chain_id: key.chain_id.clone(),
            address: key.address,
            token0_id: token0.id,
            token1_id: token1.id,
            fee: state.fee,
            tick_spacing: state.tick_spacing,
            sqrt_price_x96: state.sqrt_price_x96,
            tick: state.tick,
            liquidity: state.liquidity,
            last_price: None,
        };

        match self.store.insert_pool(&pool) {
            Ok(()) => {
                logger::debug(
                    LogTag::Pools,
                    &format!("hydrated pool {} fee {}", pool.id, pool.fee),
                );
                Ok(pool)
            }
            Err(StoreError::Duplicate(_)) => self
                .store
                .get_pool(&key.id())?
                .ok_or_else(|| CacheError::NotFoundUpstream(key.id())),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve the pool's token references, transparently re-hydrating a
    /// token that disappeared from the store out-of-band. Callers never
    /// see a broken reference.
    pub async fn resolve(&self, pool: &Pool) -> Result<ResolvedPool, CacheError> {
        let token0 = self.resolve_token(&pool.token0_id).await?;
        let token1 = self.resolve_token(&pool.token1_id).await?;
        Ok(ResolvedPool {
            pool: pool.clone(),
            token0,
            token1,
        })
    }

    async fn resolve_token(&self, token_id: &str) -> Result<Token, CacheError> {
        let key = TokenKey::parse(token_id)?;
        if let Some(token) = self.tokens.get(&key)? {
            return Ok(token);
        }
        logger::warning(
            LogTag::Pools,
            &format!("token reference {} missing from store, re-hydrating", token_id),
        );
        self.tokens.fetch_or_create(&key).await
    }

    /// Current price for a pool, resolving token decimals as needed.
    pub async fn price(&self, pool: &Pool) -> Result<PoolPrice, CacheError> {
        Ok(self.resolve(pool).await?.price())
    }

    /// Token balances held by the pool contract, valued in token1 terms
    /// when the current price allows it.
    pub async fn total_value_locked(&self, pool: &Pool) -> Result<PoolTvl, CacheError> {
        let resolved = self.resolve(pool).await?;
        let raw0 = self
            .chain
            .erc20_balance_of(resolved.token0.address, pool.address)
            .await?;
        let raw1 = self
            .chain
            .erc20_balance_of(resolved.token1.address, pool.address)
            .await?;

        let amount0 = math::amount_to_decimal(raw0, resolved.token0.decimals)?;
        let amount1 = math::amount_to_decimal(raw1, resolved.token1.decimals)?;
        let value_in_token1 = resolved
            .price()
            .finite()
            .and_then(|price| amount0.checked_mul(price))
            .and_then(|value0| value0.checked_add(amount1));

        Ok(PoolTvl {
            amount0,
            amount1,
            value_in_token1,
        })
    }

    /// Apply one observed swap to the cached pool state: sqrt price, tick
    /// and running last price always; liquidity only when the event
    /// reports it.
    pub fn apply_swap(
        &self,
        pool: &mut Pool,
        swap: &SwapLog,
        price: &PoolPrice,
    ) -> Result<(), CacheError> {
        pool.sqrt_price_x96 = swap.sqrt_price_x96;
        pool.tick = swap.tick;
        if let Some(liquidity) = swap.liquidity {
            pool.liquidity = liquidity;
        }
        pool.last_price = price.finite();

        self.store.update_pool_market(
            &pool.id,
            pool.sqrt_price_x96,
            pool.tick,
            swap.liquidity,
            pool.last_price,
        )?;
        Ok(())
    }

    /// All cached fee tiers for a token pair (factory ordering).
    pub fn pools_for_pair(
        &self,
        token0_id: &str,
        token1_id: &str,
    ) -> Result<Vec<Pool>, CacheError> {
        Ok(self.store.get_pools_for_pair(token0_id, token1_id)?)
    }
}
