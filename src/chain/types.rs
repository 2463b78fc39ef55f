use alloy_primitives::{Address, I256, U256};

/// ERC-20 metadata read once per token.
#[derive(Debug, Clone)]
pub struct TokenMetadata {
    pub symbol: String,
    pub decimals: u8,
    pub name: String,
}

/// Full pool read: immutables plus the current slot0 view.
#[derive(Debug, Clone)]
pub struct PoolState {
    pub token0: Address,
    pub token1: Address,
    /// Fee in hundredths of a basis point (500 / 3000 / 10000)
    pub fee: u32,
    pub tick_spacing: i32,
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub liquidity: u128,
}

/// `positions(tokenId)` result, reduced to the fields the tracker keeps.
#[derive(Debug, Clone)]
pub struct PositionInfo {
    pub token0: Address,
    pub token1: Address,
    pub fee: u32,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
}

/// One decoded `Swap` log.
#[derive(Debug, Clone)]
pub struct SwapLog {
    pub amount0: I256,
    pub amount1: I256,
    pub sqrt_price_x96: U256,
    /// In-range liquidity after the swap, when the event reports it.
    pub liquidity: Option<u128>,
    pub tick: i32,
}

/// Simulated `collect` output: accrued-but-unclaimed fee amounts.
#[derive(Debug, Clone, Copy)]
pub struct CollectedFees {
    pub amount0: U256,
    pub amount1: U256,
}
