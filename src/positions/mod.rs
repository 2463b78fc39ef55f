//! NFT liquidity position cache and financial calculations

mod cache;
mod types;
mod value;

pub use cache::PositionCache;
pub use types::{Position, PositionKey};
pub use value::{StakingReward, TokenAmounts, UnclaimedFees, REWARD_TOKEN_DECIMALS};
