/// Structured error types for poolwatch
///
/// One enum per domain boundary. Library code returns these with `?`;
/// `anyhow` is reserved for the application edge (config load, main).
use thiserror::Error;

/// Errors from the remote chain reader (JSON-RPC transport and decoding).
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("transport error: {0}")] Transport(String),

    #[error("rpc error {code}: {message}")] Rpc {
        code: i64,
        message: String,
    },

    #[error("empty response from {0}")] EmptyResponse(String),

    #[error("failed to decode call result: {0}")] Decode(String),

    #[error("subscription error: {0}")] Subscription(String),
}

/// Errors from the SQLite document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Primary-key collision on insert. This is the arbitration point for
    /// concurrent cache hydrations and is recovered by re-reading.
    #[error("duplicate key: {0}")] Duplicate(String),

    #[error("sqlite error: {0}")] Sqlite(#[from] rusqlite::Error),

    #[error("corrupt record {id}: {reason}")] Corrupt {
        id: String,
        reason: String,
    },
}

/// Errors surfaced by the entity caches.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The authoritative source has no data for this key. Never cached.
    #[error("entity not found upstream: {0}")] NotFoundUpstream(String),

    #[error(transparent)] Chain(#[from] ChainError),

    #[error(transparent)] Store(#[from] StoreError),

    #[error(transparent)] Math(#[from] MathError),

    #[error("invalid key: {0}")] InvalidKey(String),

    #[error("invariant violation: {0}")] Invariant(String),
}

/// Errors from price and amount computation.
#[derive(Debug, Error)]
pub enum MathError {
    #[error("tick {0} outside supported range")] TickOutOfRange(i32),

    #[error("amount too large to render: {0}")] AmountOverflow(String),

    #[error("price unavailable for this pool state")] PriceUnavailable,

    #[error("v3 math error: {0}")] V3Math(String),
}

impl From<uniswap_v3_math::error::UniswapV3MathError> for MathError {
    fn from(e: uniswap_v3_math::error::UniswapV3MathError) -> Self {
        MathError::V3Math(e.to_string())
    }
}

/// Errors from the monitoring engine.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("pool {0} is not resolved in the cache")] UnknownPool(String),

    #[error(transparent)] Cache(#[from] CacheError),

    #[error(transparent)] Chain(#[from] ChainError),

    #[error(transparent)] Notify(#[from] NotifyError),
}

/// Errors from the notification sink.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to deliver notification: {0}")] Delivery(String),
}
