use std::process;
use std::sync::Arc;

use clap::Parser;
use orm::migrations::run_migrations;
use scheduler::app_state::AppState;
use scheduler::config::AppConfig;
use scheduler::crawl::CrawlScheduler;
use scheduler::jobs::{self, JobIntervals};
use scheduler::provider::{ChainHead, HeightSource, JsonRpcProvider, ProviderPool};
use scheduler::services::db::{PgCollectionStore, PgTaskStore};
use scheduler::services::queue::RedisStreamDispatcher;
use shared::crawler::Supervisor;
use shared::error::{AsDbError, AsDispatchError, MainError};
use tokio_retry::strategy::{jitter, FixedInterval};
use tokio_retry::RetryIf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::parse();

    config.log.init();
    config.validate()?;

    tracing::info!(
        network = %config.network,
        source = %config.source,
        vip = config.vip,
        queue = config.queue_name,
        "Starting NFT collection crawl scheduler"
    );

    let app_state =
        AppState::new(config.database_url.clone(), config.queue_url.clone())?;

    let retry_strategy = FixedInterval::from_millis(2000).map(jitter).take(10);
    RetryIf::spawn(
        retry_strategy,
        || prepare_backends(&app_state),
        |e: &MainError| e.eq(&MainError::Database) || e.eq(&MainError::Dispatch),
    )
    .await?;

    let providers = config
        .rpc_providers
        .iter()
        .map(|provider| {
            Arc::new(JsonRpcProvider::new(&provider.name, provider.url.clone()))
                as Arc<dyn HeightSource>
        })
        .collect::<Vec<_>>();

    let mut supervisor = Supervisor::new();

    let chain_head: Arc<dyn ChainHead> = if config.follows_chain_head() {
        let pool =
            Arc::new(ProviderPool::new(providers, config.probe_timeout)?);
        jobs::schedule_provider_reset(
            &mut supervisor,
            Arc::clone(&pool),
            config.provider_reset_interval,
            config.skip_limit,
        );
        pool
    } else {
        Arc::new(StaticHead)
    };

    let scheduler = CrawlScheduler::new(
        Arc::new(PgCollectionStore::new(app_state.db_pool())),
        Arc::new(PgTaskStore::new(app_state.db_pool())),
        Arc::new(RedisStreamDispatcher::new(
            app_state.queue_pool(),
            config.queue_name.clone(),
            config.dedup_window,
        )),
        chain_head,
        config.crawl_settings(),
    );

    jobs::schedule_crawl_jobs(
        &mut supervisor,
        Arc::new(scheduler),
        JobIntervals {
            crawl: config.crawl_interval,
            split: config.split_interval,
            reconcile: config.reconcile_interval,
        },
        config.skip_limit,
    );

    match supervisor.run().await {
        Ok(()) => {
            tracing::info!("Scheduler stopped");
            Ok(())
        }
        Err(fatal) => {
            tracing::error!(reason = %fatal, "Unrecoverable error, exiting");
            process::exit(1);
        }
    }
}

async fn prepare_backends(app_state: &AppState) -> Result<(), MainError> {
    let conn = app_state.get_db_connection().await.into_db_error()?;

    let applied = run_migrations(&conn).await.into_db_error()?;
    tracing::info!(applied, "Database migrations done");

    app_state
        .get_queue_connection()
        .await
        .into_dispatch_error()?;

    Ok(())
}

/// Chain head of instances that never read it: backward crawls and forward
/// crawls bounded by a static end block.
struct StaticHead;

#[async_trait::async_trait]
impl ChainHead for StaticHead {
    async fn block_height(&self) -> Result<shared::block::BlockHeight, MainError> {
        Err(MainError::RpcError)
    }
}
