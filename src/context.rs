//! Application wiring
//!
//! Every service receives its collaborators through this context struct;
//! there is no global mutable state. Tests assemble the same graph with
//! a mock chain reader and an in-memory store.

use crate::alerts::AlertRegistry;
use crate::chain::rpc::JsonRpcChainReader;
use crate::chain::ChainReader;
use crate::config::Config;
use crate::monitor::MonitorEngine;
use crate::notify::{ConsoleSink, NotificationSink};
use crate::pools::PoolCache;
use crate::positions::PositionCache;
use crate::store::Store;
use crate::tokens::TokenCache;
use anyhow::{Context as _, Result};
use std::sync::Arc;

pub struct AppContext {
    pub config: Config,
    pub store: Store,
    pub chain: Arc<dyn ChainReader>,
    pub tokens: Arc<TokenCache>,
    pub pools: Arc<PoolCache>,
    pub positions: Arc<PositionCache>,
    pub alerts: Arc<AlertRegistry>,
    pub sink: Arc<dyn NotificationSink>,
    pub monitor: Arc<MonitorEngine>,
}

impl AppContext {
    /// Assemble the service graph around the given chain reader and
    /// notification sink.
    pub fn new(
        config: Config,
        chain: Arc<dyn ChainReader>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        let store = Store::open(&config.database.path)
            .with_context(|| format!("failed to open database {}", config.database.path))?;

        let tokens = Arc::new(TokenCache::new(store.clone(), chain.clone()));
        let pools = Arc::new(PoolCache::new(store.clone(), chain.clone(), tokens.clone()));
        let positions = Arc::new(PositionCache::new(
            store.clone(),
            chain.clone(),
            pools.clone(),
        ));
        let alerts = Arc::new(AlertRegistry::new());
        let monitor = Arc::new(MonitorEngine::new(
            chain.clone(),
            pools.clone(),
            alerts.clone(),
            sink.clone(),
        ));

        Ok(Self {
            config,
            store,
            chain,
            tokens,
            pools,
            positions,
            alerts,
            sink,
            monitor,
        })
    }

    /// Production wiring: JSON-RPC chain reader and console sink.
    pub fn with_defaults(config: Config) -> Result<Self> {
        let chain = Arc::new(
            JsonRpcChainReader::from_config(&config.chain)
                .context("failed to build chain reader")?,
        );
        let sink = Arc::new(ConsoleSink::new());
        Self::new(config, chain, sink)
    }
}
