use shared::block::{BlockHeight, BlockRange};
use shared::collection::{Collection, CollectionCommit};
use shared::queue::{partition_by_step, QueueMessageBody};

use super::CrawlSettings;

/// What one tick does for one claimed collection: the message bodies to
/// dispatch, in dispatch order, and the progress to commit afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlPlan {
    pub bodies: Vec<QueueMessageBody>,
    pub commit: CollectionCommit,
}

impl CrawlPlan {
    /// Releases the claim without moving progress.
    fn idle(collection: &Collection, clear_target: bool) -> Self {
        Self {
            bodies: vec![],
            commit: CollectionCommit {
                contract_address: collection.contract_address.clone(),
                processed_block: None,
                clear_target,
                claimed_at: collection.sent_at,
            },
        }
    }

    pub fn range(&self) -> Option<BlockRange> {
        let start = self.bodies.iter().map(|body| body.start_block).min()?;
        let end = self.bodies.iter().map(|body| body.end_block).max()?;
        Some(BlockRange::new(start, end))
    }
}

/// Plans the next forward step of `collection` towards `ceiling`, or
/// towards its target block when it has one.
pub fn plan_forward(
    collection: &Collection,
    ceiling: BlockHeight,
    settings: &CrawlSettings,
) -> CrawlPlan {
    let has_target = collection.target_block.is_some();
    let ceiling = collection.target_block.unwrap_or(ceiling);

    let start = match (
        collection.last_processed_block,
        collection.created_at_block,
    ) {
        (Some(last), _) => last.saturating_add(1),
        (None, Some(origin)) => origin,
        (None, None) => return CrawlPlan::idle(collection, false),
    };

    if start > ceiling {
        return CrawlPlan::idle(collection, has_target);
    }

    let end = start.saturating_add(settings.span()).min(ceiling);
    let bodies = partition_by_step(
        &collection.contract_address,
        collection.token_type,
        BlockRange::new(start, end),
        settings.block_interval,
    );

    CrawlPlan {
        bodies,
        commit: CollectionCommit {
            contract_address: collection.contract_address.clone(),
            processed_block: Some(end),
            clear_target: has_target && end == ceiling,
            claimed_at: collection.sent_at,
        },
    }
}

/// Plans the next backward step of `collection` down to the configured
/// floor, or to its target block when it has one. Newer ranges are
/// dispatched first.
pub fn plan_backward(
    collection: &Collection,
    settings: &CrawlSettings,
) -> CrawlPlan {
    let has_target = collection.target_block.is_some();
    let floor = collection.target_block.unwrap_or(settings.floor_block);

    let high = match (
        collection.first_processed_block,
        collection.created_at_block,
    ) {
        (Some(0), _) => return CrawlPlan::idle(collection, has_target),
        (Some(first), _) => first - 1,
        (None, Some(origin)) => origin,
        (None, None) => return CrawlPlan::idle(collection, false),
    };

    if high < floor {
        return CrawlPlan::idle(collection, has_target);
    }

    let low = high.saturating_sub(settings.span()).max(floor);
    let mut bodies = partition_by_step(
        &collection.contract_address,
        collection.token_type,
        BlockRange::new(low, high),
        settings.block_interval,
    );
    bodies.reverse();

    CrawlPlan {
        bodies,
        commit: CollectionCommit {
            contract_address: collection.contract_address.clone(),
            processed_block: Some(low),
            clear_target: has_target && low == floor,
            claimed_at: collection.sent_at,
        },
    }
}
