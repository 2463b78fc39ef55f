//! Pool state cache and queries

mod cache;
mod types;

pub use cache::{PoolCache, PoolTvl, ResolvedPool};
pub use types::{Pool, PoolKey};
