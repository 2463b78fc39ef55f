use super::{Token, TokenKey};
use crate::chain::ChainReader;
use crate::errors::{CacheError, ChainError, StoreError};
use crate::logger::{self, LogTag};
use crate::store::Store;
use std::sync::Arc;

/// Lazy, store-backed cache of token metadata.
///
/// Token records are immutable once hydrated; they only leave the store
/// through an explicit [`TokenCache::clear`].
pub struct TokenCache {
    store: Store,
    chain: Arc<dyn ChainReader>,
}

impl TokenCache {
    pub fn new(store: Store, chain: Arc<dyn ChainReader>) -> Self {
        Self { store, chain }
    }

    /// Store lookup only; never calls the chain.
    pub fn get(&self, key: &TokenKey) -> Result<Option<Token>, CacheError> {
        Ok(self.store.get_token(&key.id())?)
    }

    /// Get the token, hydrating it from the chain on a store miss.
    ///
    /// Concurrent callers race on the insert; losers discard their
    /// hydrated value and re-read the winner's row, so every caller
    /// converges on the same persisted record. More than one remote
    /// hydration may happen for the same key; only one is kept.
    pub async fn fetch_or_create(&self, key: &TokenKey) -> Result<Token, CacheError> {
        if let Some(token) = self.store.get_token(&key.id())? {
            return Ok(token);
        }

        let metadata = match self.chain.token_metadata(key.address).await {
            Ok(metadata) => metadata,
            Err(ChainError::EmptyResponse(_)) => {
                return Err(CacheError::NotFoundUpstream(key.id()));
            }
            Err(e) => return Err(e.into()),
        };

        let token = Token {
            id: key.id(),
            chain_id: key.chain_id.clone(),
            address: key.address,
            symbol: metadata.symbol,
            decimals: metadata.decimals,
            name: metadata.name,
        };

        match self.store.insert_token(&token) {
            Ok(()) => {
                logger::debug(
                    LogTag::Tokens,
                    &format!("hydrated token {} ({})", token.symbol, token.id),
                );
                Ok(token)
            }
            Err(StoreError::Duplicate(_)) => {
                // A concurrent hydration won; its row is authoritative.
                self.store
                    .get_token(&key.id())?
                    .ok_or_else(|| CacheError::NotFoundUpstream(key.id()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Hydrate a batch of tokens (wallet scans touch many at once).
    pub async fn fetch_or_create_many(
        &self,
        keys: &[TokenKey],
    ) -> Result<Vec<Token>, CacheError> {
        let mut tokens = Vec::with_capacity(keys.len());
        for key in keys {
            tokens.push(self.fetch_or_create(key).await?);
        }
        Ok(tokens)
    }

    /// Explicit cache-clear; the only deletion path for token records.
    pub fn clear(&self) -> Result<(), CacheError> {
        self.store.clear_tokens()?;
        logger::info(LogTag::Tokens, "token cache cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::testing::MockChainReader;
    use alloy_primitives::Address;
    use std::str::FromStr;
    use std::sync::atomic::Ordering;

    fn usdc_address() -> Address {
        Address::from_str("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48").unwrap()
    }

    fn setup() -> (TokenCache, Arc<MockChainReader>) {
        let chain = Arc::new(MockChainReader::new());
        chain.seed_token(usdc_address(), "USDC", 6, "USD Coin");
        let cache = TokenCache::new(Store::open_in_memory().unwrap(), chain.clone());
        (cache, chain)
    }

    #[tokio::test]
    async fn test_get_does_not_touch_chain() {
        let (cache, chain) = setup();
        let key = TokenKey::new("1", usdc_address());

        assert!(cache.get(&key).unwrap().is_none());
        assert_eq!(chain.token_metadata_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_or_create_hydrates_once() {
        let (cache, chain) = setup();
        let key = TokenKey::new("1", usdc_address());

        let token = cache.fetch_or_create(&key).await.unwrap();
        assert_eq!(token.symbol, "USDC");
        assert_eq!(token.decimals, 6);

        // Second call is served from the store
        let again = cache.fetch_or_create(&key).await.unwrap();
        assert_eq!(again, token);
        assert_eq!(chain.token_metadata_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_upstream_is_not_cached() {
        let (cache, _) = setup();
        let unknown = TokenKey::new(
            "1",
            Address::from_str("0x00000000000000000000000000000000000000aa").unwrap(),
        );

        match cache.fetch_or_create(&unknown).await {
            Err(CacheError::NotFoundUpstream(id)) => assert_eq!(id, unknown.id()),
            other => panic!("expected NotFoundUpstream, got {:?}", other),
        }
        assert!(cache.get(&unknown).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_or_create_many() {
        let (cache, chain) = setup();
        let weth =
            Address::from_str("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2").unwrap();
        chain.seed_token(weth, "WETH", 18, "Wrapped Ether");

        let keys = vec![TokenKey::new("1", usdc_address()), TokenKey::new("1", weth)];
        let tokens = cache.fetch_or_create_many(&keys).await.unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].symbol, "USDC");
        assert_eq!(tokens[1].symbol, "WETH");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_fetch_or_create_converges() {
        let (cache, _) = setup();
        let cache = Arc::new(cache);
        let key = TokenKey::new("1", usdc_address());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let key = key.clone();
            handles.push(tokio::spawn(
                async move { cache.fetch_or_create(&key).await },
            ));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }

        // Every racer saw the same persisted identity, and exactly one
        // row exists afterward no matter how many hydrations ran.
        assert!(ids.iter().all(|id| *id == key.id()));
        assert_eq!(cache.store.count_tokens().unwrap(), 1);
    }
}
