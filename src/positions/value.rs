//! Position financial calculations: token amounts, combined value,
//! unclaimed fees (via simulated collect) and staking rewards.

use super::cache::PositionCache;
use super::Position;
use crate::errors::{CacheError, MathError};
use crate::logger::{self, LogTag};
use crate::math;
use alloy_primitives::U256;
use rust_decimal::Decimal;
use uniswap_v3_math::sqrt_price_math::{_get_amount_0_delta, _get_amount_1_delta};
use uniswap_v3_math::tick_math::get_sqrt_ratio_at_tick;

/// Reward token decimal count (fixed; the staker pays a single token).
pub const REWARD_TOKEN_DECIMALS: u8 = 18;

/// Positions whose combined value rounds below this are treated as dust.
fn dust_threshold() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

/// Withdrawable token amounts implied by liquidity and tick bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenAmounts {
    pub amount0: Decimal,
    pub amount1: Decimal,
}

impl TokenAmounts {
    fn zero() -> Self {
        Self {
            amount0: Decimal::ZERO,
            amount1: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StakingReward {
    pub amount: Decimal,
}

impl StakingReward {
    pub fn zero() -> Self {
        Self {
            amount: Decimal::ZERO,
        }
    }
}

/// Accrued-but-uncollected fees plus any staking reward.
#[derive(Debug, Clone, PartialEq)]
pub struct UnclaimedFees {
    pub amount0: Decimal,
    pub amount1: Decimal,
    pub reward: StakingReward,
}

impl UnclaimedFees {
    fn zero() -> Self {
        Self {
            amount0: Decimal::ZERO,
            amount1: Decimal::ZERO,
            reward: StakingReward::zero(),
        }
    }
}

impl PositionCache {
    /// Token amounts the position would pay out if burned now, derived
    /// from liquidity and the pool's current sqrt price.
    pub async fn token_amounts(&self, position: &Position) -> Result<TokenAmounts, CacheError> {
        if position.liquidity == 0 {
            return Ok(TokenAmounts::zero());
        }

        let resolved = self.resolve_pool(position).await?;
        let sqrt_lower =
            get_sqrt_ratio_at_tick(position.tick_lower).map_err(MathError::from)?;
        let sqrt_upper =
            get_sqrt_ratio_at_tick(position.tick_upper).map_err(MathError::from)?;
        let sqrt_current = resolved.pool.sqrt_price_x96;

        // Below range the position is all token0, above range all token1,
        // in range it holds a slice of both.
        let (raw0, raw1) = if sqrt_current <= sqrt_lower {
            let raw0 = _get_amount_0_delta(sqrt_lower, sqrt_upper, position.liquidity, false)
                .map_err(MathError::from)?;
            (raw0, U256::ZERO)
        } else if sqrt_current >= sqrt_upper {
            let raw1 = _get_amount_1_delta(sqrt_lower, sqrt_upper, position.liquidity, false)
                .map_err(MathError::from)?;
            (U256::ZERO, raw1)
        } else {
            let raw0 = _get_amount_0_delta(sqrt_current, sqrt_upper, position.liquidity, false)
                .map_err(MathError::from)?;
            let raw1 = _get_amount_1_delta(sqrt_lower, sqrt_current, position.liquidity, false)
                .map_err(MathError::from)?;
            (raw0, raw1)
        };

        Ok(TokenAmounts {
            amount0: math::amount_to_decimal(raw0, resolved.token0.decimals)?,
            amount1: math::amount_to_decimal(raw1, resolved.token1.decimals)?,
        })
    }

    /// Position value denominated in token1. Token1 is assumed to be the
    /// stable unit of account; this is a deliberate simplification, not a
    /// general multi-asset valuation.
    pub async fn combined_value(&self, position: &Position) -> Result<Decimal, CacheError> {
        let amounts = self.token_amounts(position).await?;
        if amounts.amount0.is_zero() {
            return Ok(amounts.amount1);
        }

        let resolved = self.resolve_pool(position).await?;
        let price = resolved
            .price()
            .finite()
            .ok_or(MathError::PriceUnavailable)?;
        let value0 = amounts
            .amount0
            .checked_mul(price)
            .ok_or_else(|| MathError::AmountOverflow(amounts.amount0.to_string()))?;
        value0
            .checked_add(amounts.amount1)
            .ok_or_else(|| MathError::AmountOverflow(value0.to_string()).into())
    }

    /// Read accrued fees with a simulated (non-mutating) maximal-claim
    /// `collect` call. A zero-liquidity position short-circuits to zero
    /// without touching the chain. Simulation failures surface; the
    /// caller decides whether to degrade to a "fees unknown" display.
    pub async fn unclaimed_fees(&self, position: &Position) -> Result<UnclaimedFees, CacheError> {
        if position.liquidity == 0 {
            return Ok(UnclaimedFees::zero());
        }

        let fees = self
            .chain
            .simulate_collect(position.token_id, position.owner)
            .await?;
        let resolved = self.resolve_pool(position).await?;
        let reward = self.staking_reward(position).await?;

        Ok(UnclaimedFees {
            amount0: math::amount_to_decimal(fees.amount0, resolved.token0.decimals)?,
            amount1: math::amount_to_decimal(fees.amount1, resolved.token1.decimals)?,
            reward,
        })
    }

    /// Pending staking reward. Unstaked positions return zero without a
    /// remote call; staked reads are memoized for the reward-cache TTL to
    /// bound RPC frequency under repeated fee inspections.
    pub async fn staking_reward(&self, position: &Position) -> Result<StakingReward, CacheError> {
        if !position.is_staked {
            return Ok(StakingReward::zero());
        }

        let raw = match self.rewards.get(&position.id) {
            Some(raw) => raw,
            None => {
                let pending = self.chain.pending_reward(position.token_id).await?;
                let raw = u128::try_from(pending)
                    .map_err(|_| MathError::AmountOverflow(pending.to_string()))?;
                self.rewards.insert(position.id.clone(), raw);
                logger::debug(
                    LogTag::Positions,
                    &format!("cached pending reward for {}: {}", position.id, raw),
                );
                raw
            }
        };

        Ok(StakingReward {
            amount: math::amount_to_decimal(U256::from(raw), REWARD_TOKEN_DECIMALS)?,
        })
    }

    /// True for closed positions and for residual dust: nonzero liquidity
    /// whose combined value still rounds below the materiality threshold.
    pub async fn is_empty(&self, position: &Position) -> Result<bool, CacheError> {
        if position.liquidity == 0 {
            return Ok(true);
        }
        let value = self.combined_value(position).await?;
        Ok(value < dust_threshold())
    }
}
