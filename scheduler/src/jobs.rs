use std::sync::Arc;
use std::time::Duration;

use shared::collection::Direction;
use shared::crawler::{SingleFlight, Supervisor, Ticker};
use shared::error::MainError;

use crate::crawl::CrawlScheduler;
use crate::provider::ProviderPool;

#[derive(Debug, Clone, Copy)]
pub struct JobIntervals {
    pub crawl: Duration,
    pub split: Duration,
    pub reconcile: Duration,
}

/// Schedules the crawl, split and reconciliation jobs. They share a single
/// flight, so at most one of them runs at any time.
pub fn schedule_crawl_jobs(
    supervisor: &mut Supervisor,
    scheduler: Arc<CrawlScheduler>,
    intervals: JobIntervals,
    skip_limit: u32,
) {
    let flight = SingleFlight::new(skip_limit);

    let crawl_job = match scheduler.settings().direction() {
        Direction::Forward => "forward-crawl",
        Direction::Backward => "backward-crawl",
    };

    let crawl = Arc::clone(&scheduler);
    supervisor.every(
        Ticker::new(crawl_job, intervals.crawl, flight.clone()),
        move || {
            let scheduler = Arc::clone(&crawl);
            async move { scheduler.crawl_tick().await }
        },
    );

    let split = Arc::clone(&scheduler);
    supervisor.every(
        Ticker::new("split", intervals.split, flight.clone()),
        move || {
            let scheduler = Arc::clone(&split);
            async move { scheduler.split_tick().await }
        },
    );

    supervisor.every(
        Ticker::new("reconcile", intervals.reconcile, flight),
        move || {
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.reconcile_tick().await }
        },
    );
}

/// Periodically moves the provider pool back to its highest priority
/// healthy provider. The first tick fires right away and performs the
/// initial connection.
pub fn schedule_provider_reset(
    supervisor: &mut Supervisor,
    pool: Arc<ProviderPool>,
    period: Duration,
    skip_limit: u32,
) {
    supervisor.every(
        Ticker::new("provider-reset", period, SingleFlight::new(skip_limit)),
        move || {
            let pool = Arc::clone(&pool);
            async move {
                pool.reset().await?;
                Ok::<(), MainError>(())
            }
        },
    );
}
