use crate::errors::CacheError;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parsed composite token key: `chainId:address`. Built once at hydration;
/// the id string is derived from the parts, never the other way around in
/// hot paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenKey {
    pub chain_id: String,
    pub address: Address,
}

impl TokenKey {
    pub fn new(chain_id: &str, address: Address) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            address,
        }
    }

    /// Canonical id: address lower-cased as key material.
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

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// ERC-20 token metadata, immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub chain_id: String,
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    pub name: String,
}

impl Token {
    pub fn key(&self) -> TokenKey {
        TokenKey::new(&self.chain_id, self.address)
    }
}
