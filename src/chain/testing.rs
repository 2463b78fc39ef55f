//! In-memory [`ChainReader`] for tests: seeded state, call counters, and
//! hand-fed swap streams.

use super::{ChainReader, CollectedFees, PoolState, PositionInfo, SwapLog, SwapSubscription, TokenMetadata};
use crate::errors::ChainError;
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

#[derive(Default)]
pub struct MockChainReader {
    tokens: Mutex<HashMap<Address, TokenMetadata>>,
    pools: Mutex<HashMap<Address, PoolState>>,
    positions: Mutex<HashMap<u64, PositionInfo>>,
    owners: Mutex<HashMap<u64, Address>>,
    balances: Mutex<HashMap<(Address, Address), U256>>,
    fees: Mutex<HashMap<u64, CollectedFees>>,
    staked: Mutex<HashMap<u64, bool>>,
    rewards: Mutex<HashMap<u64, U256>>,
    swap_feeds: Mutex<HashMap<Address, mpsc::Sender<SwapLog>>>,

    pub token_metadata_calls: AtomicUsize,
    pub pool_state_calls: AtomicUsize,
    pub position_info_calls: AtomicUsize,
    pub collect_calls: AtomicUsize,
    pub reward_calls: AtomicUsize,
    pub subscribe_calls: AtomicUsize,
}

impl MockChainReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_token(&self, address: Address, symbol: &str, decimals: u8, name: &str) {
        self.tokens.lock().unwrap().insert(
            address,
            TokenMetadata {
                symbol: symbol.to_string(),
                decimals,
                name: name.to_string(),
            },
        );
    }

    pub fn seed_pool(&self, address: Address, state: PoolState) {
        self.pools.lock().unwrap().insert(address, state);
    }

    pub fn seed_position(&self, token_id: u64, owner: Address, info: PositionInfo) {
        self.positions.lock().unwrap().insert(token_id, info);
        self.owners.lock().unwrap().insert(token_id, owner);
    }

    pub fn seed_balance(&self, token: Address, holder: Address, balance: U256) {
        self.balances.lock().unwrap().insert((token, holder), balance);
    }

    pub fn seed_fees(&self, token_id: u64, fees: CollectedFees) {
        self.fees.lock().unwrap().insert(token_id, fees);
    }

    pub fn seed_staked(&self, token_id: u64, reward: U256) {
        self.staked.lock().unwrap().insert(token_id, true);
        self.rewards.lock().unwrap().insert(token_id, reward);
    }

    pub fn set_reward(&self, token_id: u64, reward: U256) {
        self.rewards.lock().unwrap().insert(token_id, reward);
    }

    /// Push a swap log into a live subscription created by
    /// [`ChainReader::subscribe_swaps`].
    pub async fn push_swap(&self, pool: Address, swap: SwapLog) {
        let sender = {
            let feeds = self.swap_feeds.lock().unwrap();
            feeds.get(&pool).cloned()
        };
        if let Some(sender) = sender {
            let _ = sender.send(swap).await;
        }
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn token_metadata(&self, token: Address) -> Result<TokenMetadata, ChainError> {
        self.token_metadata_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await; // give racing callers a chance to interleave
        self.tokens
            .lock()
            .unwrap()
            .get(&token)
            .cloned()
            .ok_or_else(|| ChainError::EmptyResponse(format!("{:#x}", token)))
    }

    async fn pool_state(&self, pool: Address) -> Result<PoolState, ChainError> {
        self.pool_state_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.pools
            .lock()
            .unwrap()
            .get(&pool)
            .cloned()
            .ok_or_else(|| ChainError::EmptyResponse(format!("{:#x}", pool)))
    }

    async fn find_pool(
        &self,
        token0: Address,
        token1: Address,
        fee: u32,
    ) -> Result<Address, ChainError> {
        let pools = self.pools.lock().unwrap();
        pools
            .iter()
            .find(|(_, state)| {
                state.token0 == token0 && state.token1 == token1 && state.fee == fee
            })
            .map(|(address, _)| *address)
            .ok_or_else(|| {
                ChainError::EmptyResponse(format!("no pool for ({:#x}, {:#x})", token0, token1))
            })
    }

    async fn position_info(&self, token_id: u64) -> Result<PositionInfo, ChainError> {
        self.position_info_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.positions
            .lock()
            .unwrap()
            .get(&token_id)
            .cloned()
            .ok_or_else(|| ChainError::EmptyResponse(format!("position {}", token_id)))
    }

    async fn owner_of(&self, token_id: u64) -> Result<Address, ChainError> {
        self.owners
            .lock()
            .unwrap()
            .get(&token_id)
            .copied()
            .ok_or_else(|| ChainError::EmptyResponse(format!("position {}", token_id)))
    }

    async fn positions_of_owner(&self, owner: Address) -> Result<Vec<u64>, ChainError> {
        let owners = self.owners.lock().unwrap();
        let mut ids: Vec<u64> = owners
            .iter()
            .filter(|(_, position_owner)| **position_owner == owner)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn erc20_balance_of(
        &self,
        token: Address,
        holder: Address,
    ) -> Result<U256, ChainError> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&(token, holder))
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn simulate_collect(
        &self,
        token_id: u64,
        _recipient: Address,
    ) -> Result<CollectedFees, ChainError> {
        self.collect_calls.fetch_add(1, Ordering::SeqCst);
        self.fees
            .lock()
            .unwrap()
            .get(&token_id)
            .copied()
            .ok_or_else(|| ChainError::EmptyResponse(format!("position {}", token_id)))
    }

    async fn is_staked(&self, token_id: u64) -> Result<bool, ChainError> {
        Ok(self
            .staked
            .lock()
            .unwrap()
            .get(&token_id)
            .copied()
            .unwrap_or(false))
    }

    async fn pending_reward(&self, token_id: u64) -> Result<U256, ChainError> {
        self.reward_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rewards
            .lock()
            .unwrap()
            .get(&token_id)
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn subscribe_swaps(&self, pool: Address) -> Result<SwapSubscription, ChainError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(64);
        self.swap_feeds.lock().unwrap().insert(pool, tx);
        Ok(SwapSubscription::detached(rx))
    }
}
