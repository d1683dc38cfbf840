mod plan;
mod progress;
mod reconcile;
mod split;

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use shared::block::BlockHeight;
use shared::collection::{CrawlSource, Direction};

pub use plan::{plan_backward, plan_forward, CrawlPlan};

use crate::dispatcher::Dispatcher;
use crate::provider::ChainHead;
use crate::store::{CollectionStore, TaskStore};

#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub source: CrawlSource,
    pub vip: bool,
    pub query_limit: i64,
    /// Blocks covered by one message.
    pub block_interval: u64,
    /// Messages per collection and tick.
    pub messages_per_process: u64,
    /// Static forward ceiling overriding the chain head.
    pub end_block: Option<BlockHeight>,
    /// Lowest block the backward crawl walks down to.
    pub floor_block: BlockHeight,
    pub stale_after: Duration,
}

impl CrawlSettings {
    pub fn direction(&self) -> Direction {
        self.source.direction()
    }

    /// Blocks advanced per collection and tick.
    pub fn span(&self) -> u64 {
        self.block_interval.saturating_mul(self.messages_per_process)
    }

    /// Claims stamped before the returned instant are considered abandoned.
    pub fn stale_cutoff(&self, now: NaiveDateTime) -> NaiveDateTime {
        chrono::Duration::from_std(self.stale_after)
            .ok()
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(NaiveDateTime::MIN)
    }
}

/// Drives the crawl of one instance: moves collections forward or backward,
/// re-splits bounced tasks and releases abandoned claims.
#[derive(Clone)]
pub struct CrawlScheduler {
    collections: Arc<dyn CollectionStore>,
    tasks: Arc<dyn TaskStore>,
    dispatcher: Arc<dyn Dispatcher>,
    chain_head: Arc<dyn ChainHead>,
    settings: CrawlSettings,
}

impl CrawlScheduler {
    pub fn new(
        collections: Arc<dyn CollectionStore>,
        tasks: Arc<dyn TaskStore>,
        dispatcher: Arc<dyn Dispatcher>,
        chain_head: Arc<dyn ChainHead>,
        settings: CrawlSettings,
    ) -> Self {
        Self {
            collections,
            tasks,
            dispatcher,
            chain_head,
            settings,
        }
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }
}
