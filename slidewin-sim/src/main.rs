use anyhow::Result;
use std::sync::Arc;

use slidewin::{Limiter, LockedStore, ShardedStore, Store, SystemClock};
use slidewin_sim::config::{Config, StoreType};
use slidewin_sim::metrics::Metrics;
use slidewin_sim::simulation::{self, SimulationReport};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from environment variables and CLI arguments
    let config = Config::from_env_and_args()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("slidewin={}", config.log_level).parse()?)
                .add_directive(format!("slidewin_sim={}", config.log_level).parse()?),
        )
        .init();

    tracing::info!(
        "Slidewin simulator starting with store type: {:?}",
        config.store.store_type
    );
    tracing::info!(
        "Store capacity: {}, Cleanup period: {:?}",
        config.store.capacity,
        config.window.cleanup_period
    );

    let metrics = Arc::new(Metrics::new());

    let report = match config.store.store_type {
        StoreType::Locked => {
            let store = LockedStore::with_capacity(config.store.capacity);
            run_with_store(&config, store, metrics.clone()).await?
        }
        StoreType::Sharded => {
            let mut builder = ShardedStore::builder().capacity(config.store.capacity);
            if let Some(shards) = config.store.shards {
                builder = builder.shards(shards);
            }
            run_with_store(&config, builder.build(), metrics.clone()).await?
        }
    };

    tracing::debug!("Final metrics:\n{}", metrics.export_prometheus());

    if config.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }

    Ok(())
}

async fn run_with_store<S: Store + 'static>(
    config: &Config,
    store: S,
    metrics: Arc<Metrics>,
) -> Result<SimulationReport> {
    let limiter: Limiter<S, SystemClock> = Limiter::builder()
        .limit(config.window.limit)
        .window(config.window.window)
        .cleanup_period(config.window.cleanup_period)
        .store(store)
        .build()?;

    simulation::run(&config.workload, limiter, metrics).await
}
