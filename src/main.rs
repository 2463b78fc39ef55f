use anyhow::{Context, Result};
use poolwatch::config::Config;
use poolwatch::context::AppContext;
use poolwatch::logger::{self, LogLevel, LogTag};
use poolwatch::pools::PoolKey;
use std::str::FromStr;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "poolwatch.toml".to_string());

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(1);
        }
    };

    logger::init(LogLevel::from_str_or_default(&config.general.log_level));
    logger::info(LogTag::System, "poolwatch starting up");

    if let Err(e) = run(config).await {
        logger::error(LogTag::System, &format!("fatal: {:#}", e));
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    let context = AppContext::with_defaults(config)?;
    let chain_id = context.config.chain.chain_id.clone();

    let mut watched = Vec::new();
    for raw in &context.config.watch.pools {
        let address = alloy_primitives::Address::from_str(raw.trim())
            .with_context(|| format!("bad pool address in watch list: {}", raw))?;
        let key = PoolKey::new(&chain_id, address);

        let pool = context.pools.fetch_or_create(&key).await?;
        let resolved = context.pools.resolve(&pool).await?;
        logger::info(
            LogTag::Pools,
            &format!(
                "watching {} ({}) at {}",
                resolved.pair_label(),
                pool.id,
                resolved.price()
            ),
        );

        context.monitor.start_monitoring(&pool).await?;
        watched.push(pool.id);
    }

    if watched.is_empty() {
        logger::warning(
            LogTag::System,
            "watch list is empty - add pool addresses under [watch] in the config",
        );
    }

    logger::info(
        LogTag::System,
        &format!("monitoring {} pools, ctrl-c to stop", watched.len()),
    );
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    logger::info(LogTag::System, "shutting down");
    for pool_id in &watched {
        context.monitor.stop_monitoring(pool_id);
    }
    Ok(())
}
