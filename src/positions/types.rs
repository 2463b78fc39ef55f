use crate::errors::CacheError;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parsed composite position key: `chainId:managerAddress:tokenId`.
/// Owner and token index live on the record itself, not re-parsed out of
/// the id string on access.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionKey {
    pub chain_id: String,
    pub manager: Address,
    pub token_id: u64,
}

impl PositionKey {
    pub fn new(chain_id: &str, manager: Address, token_id: u64) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            manager,
            token_id,
        }
    }

    pub fn id(&self) -> String {
        format!("{}:{:#x}:{}", self.chain_id, self.manager, self.token_id)
    }

    pub fn parse(id: &str) -> Result<Self, CacheError> {
        let mut parts = id.splitn(3, ':');
        let chain_id = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| CacheError::InvalidKey(id.to_string()))?;
        let manager = parts
            .next()
            .and_then(|p| Address::from_str(p).ok())
            .ok_or_else(|| CacheError::InvalidKey(id.to_string()))?;
        let token_id = parts
            .next()
            .and_then(|p| p.parse::<u64>().ok())
            .ok_or_else(|| CacheError::InvalidKey(id.to_string()))?;
        Ok(Self::new(chain_id, manager, token_id))
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// An NFT-represented liquidity position. Zero liquidity marks a closed
/// position; the record persists for historical lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub chain_id: String,
    pub manager: Address,
    pub token_id: u64,
    pub owner: Address,
    pub pool_id: String,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
    pub is_staked: bool,
}

impl Position {
    pub fn key(&self) -> PositionKey {
        PositionKey::new(&self.chain_id, self.manager, self.token_id)
    }

    pub fn is_closed(&self) -> bool {
        self.liquidity == 0
    }
}
