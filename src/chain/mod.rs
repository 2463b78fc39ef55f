//! Remote chain reader
//!
//! The caches and the monitor consume the chain exclusively through the
//! [`ChainReader`] trait: read-only contract calls, a non-mutating
//! `collect` simulation, and a per-pool swap-log subscription. The
//! JSON-RPC implementation lives in [`rpc`]; tests swap in the mock from
//! [`testing`].

mod abi;
pub mod rpc;
mod types;

#[cfg(test)]
pub mod testing;

pub use types::{CollectedFees, PoolState, PositionInfo, SwapLog, TokenMetadata};

use crate::errors::ChainError;
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Live swap-log stream for one pool.
///
/// Dropping the subscription (or calling [`SwapSubscription::abort`])
/// tears down the underlying websocket task; the receiver then drains and
/// closes. Abort is idempotent.
pub struct SwapSubscription {
    pub events: mpsc::Receiver<SwapLog>,
    task: Option<JoinHandle<()>>,
}

impl SwapSubscription {
    pub fn new(events: mpsc::Receiver<SwapLog>, task: JoinHandle<()>) -> Self {
        Self {
            events,
            task: Some(task),
        }
    }

    /// Subscription without a backing task, used by tests that feed the
    /// channel by hand.
    pub fn detached(events: mpsc::Receiver<SwapLog>) -> Self {
        Self { events, task: None }
    }

    pub fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SwapSubscription {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Read-only view of the authoritative chain state.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// `symbol()` / `decimals()` / `name()` on an ERC-20.
    async fn token_metadata(&self, token: Address) -> Result<TokenMetadata, ChainError>;

    /// Pool immutables plus slot0 and current liquidity.
    async fn pool_state(&self, pool: Address) -> Result<PoolState, ChainError>;

    /// Factory `getPool(token0, token1, fee)` lookup.
    async fn find_pool(
        &self,
        token0: Address,
        token1: Address,
        fee: u32,
    ) -> Result<Address, ChainError>;

    /// `positions(tokenId)` on the NFT position manager.
    async fn position_info(&self, token_id: u64) -> Result<PositionInfo, ChainError>;

    /// `ownerOf(tokenId)` on the NFT position manager.
    async fn owner_of(&self, token_id: u64) -> Result<Address, ChainError>;

    /// Enumerate a wallet's position token ids via `tokenOfOwnerByIndex`.
    async fn positions_of_owner(&self, owner: Address) -> Result<Vec<u64>, ChainError>;

    /// `balanceOf(holder)` on an ERC-20.
    async fn erc20_balance_of(&self, token: Address, holder: Address)
        -> Result<U256, ChainError>;

    /// Simulated (eth_call, non-mutating) `collect` with maximal claim
    /// amounts: reads accrued fees without collecting them.
    async fn simulate_collect(
        &self,
        token_id: u64,
        recipient: Address,
    ) -> Result<CollectedFees, ChainError>;

    /// Whether the position NFT is deposited in the staking contract.
    async fn is_staked(&self, token_id: u64) -> Result<bool, ChainError>;

    /// Pending staking reward for a deposited position, in raw units.
    async fn pending_reward(&self, token_id: u64) -> Result<U256, ChainError>;

    /// Subscribe to decoded `Swap` logs for one pool address.
    async fn subscribe_swaps(&self, pool: Address) -> Result<SwapSubscription, ChainError>;
}
