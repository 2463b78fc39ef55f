use crate::errors::CacheError;
use alloy_primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parsed composite pool key: `chainId:poolAddress`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub chain_id: String,
    pub address: Address,
}

impl PoolKey {
    pub fn new(chain_id: &str, address: Address) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            address,
        }
    }

    pub fn id(&self) -> String {
        format!("{}:{:#x}", self.chain_id, self.address)
    }

    pub fn parse(id: &str) -> Result<Self, CacheError> {
        let (chain_id, address) = id
            .split_once(':')
            .ok_or_else(|| CacheError::InvalidKey(id.to_string()))?;
        let address = Address::from_str(address)
            .map_err(|_| CacheError::InvalidKey(id.to_string()))?;
        Ok(Self::new(chain_id, address))
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// A V3 pool. Token ordering is the factory's, never re-sorted: the token
/// pair plus the fee tier identifies one pool instance among its siblings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub id: String,
    pub chain_id: String,
    pub address: Address,
    pub token0_id: String,
    pub token1_id: String,
    /// Hundredths of a basis point
    pub fee: u32,
    pub tick_spacing: i32,
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub liquidity: u128,
    /// Price at the last observed swap; seeds alert crossing detection.
    pub last_price: Option<Decimal>,
}

impl Pool {
    pub fn key(&self) -> PoolKey {
        PoolKey::new(&self.chain_id, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_key_round_trip() {
        let address =
            Address::from_str("0x88e6A0c2dDD26FEEb64F039a2c41296FcB3f5640").unwrap();
        let key = PoolKey::new("1", address);
        assert_eq!(key.id(), "1:0x88e6a0c2ddd26feeb64f039a2c41296fcb3f5640");
        assert_eq!(PoolKey::parse(&key.id()).unwrap(), key);
    }
}
