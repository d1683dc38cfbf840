use shared::block::BlockHeight;
use shared::collection::{Collection, Direction};
use shared::error::{AsDbError, AsDispatchError, MainError};
use shared::queue::QueueMessage;

use super::plan::{plan_backward, plan_forward, CrawlPlan};
use super::CrawlScheduler;

impl CrawlScheduler {
    /// One crawl step in the direction of the configured source.
    pub async fn crawl_tick(&self) -> Result<(), MainError> {
        match self.settings.direction() {
            Direction::Forward => self.forward_tick().await,
            Direction::Backward => self.backward_tick().await,
        }
    }

    pub async fn forward_tick(&self) -> Result<(), MainError> {
        let ceiling = self.ceiling().await?;

        let eligible = self
            .collections
            .find_eligible_forward(
                ceiling,
                self.settings.vip,
                self.settings.source,
                self.settings.query_limit,
            )
            .await
            .into_db_error()?;

        let claimed = self.claim(eligible, Direction::Forward).await?;
        let plans = claimed
            .iter()
            .map(|collection| plan_forward(collection, ceiling, &self.settings))
            .collect();

        self.execute(claimed, plans, Direction::Forward).await
    }

    pub async fn backward_tick(&self) -> Result<(), MainError> {
        let eligible = self
            .collections
            .find_eligible_backward(
                self.settings.floor_block,
                self.settings.vip,
                self.settings.source,
                self.settings.query_limit,
            )
            .await
            .into_db_error()?;

        let claimed = self.claim(eligible, Direction::Backward).await?;
        let plans = claimed
            .iter()
            .map(|collection| plan_backward(collection, &self.settings))
            .collect();

        self.execute(claimed, plans, Direction::Backward).await
    }

    async fn ceiling(&self) -> Result<BlockHeight, MainError> {
        match self.settings.end_block {
            Some(end_block) => Ok(end_block),
            None => self.chain_head.block_height().await,
        }
    }

    async fn claim(
        &self,
        eligible: Vec<Collection>,
        direction: Direction,
    ) -> Result<Vec<Collection>, MainError> {
        if eligible.is_empty() {
            tracing::debug!(%direction, "No collection to crawl");
            return Ok(vec![]);
        }

        let addresses = eligible
            .iter()
            .map(|collection| collection.contract_address.clone())
            .collect::<Vec<_>>();

        let claimed = self
            .collections
            .claim_batch(addresses, direction)
            .await
            .into_db_error()?;

        if claimed.len() < eligible.len() {
            tracing::debug!(
                %direction,
                eligible = eligible.len(),
                claimed = claimed.len(),
                "Some collections were claimed by another worker"
            );
        }

        Ok(claimed)
    }

    /// Dispatches each plan and commits all of them at once. A dispatch
    /// failure aborts the tick with every claim still held, so that the
    /// collections are picked up again only once the claims go stale.
    async fn execute(
        &self,
        claimed: Vec<Collection>,
        plans: Vec<CrawlPlan>,
        direction: Direction,
    ) -> Result<(), MainError> {
        if claimed.is_empty() {
            return Ok(());
        }

        let mut commits = Vec::with_capacity(plans.len());
        for (collection, plan) in claimed.iter().zip(plans) {
            match plan.range() {
                Some(range) => {
                    let messages = plan
                        .bodies
                        .into_iter()
                        .map(QueueMessage::new)
                        .collect::<Vec<_>>();

                    let sent = self
                        .dispatcher
                        .send(messages)
                        .await
                        .into_dispatch_error()?;

                    tracing::info!(
                        contract_address = collection.contract_address,
                        %direction,
                        %range,
                        messages = sent.len(),
                        "Dispatched block ranges"
                    );
                }
                None => tracing::debug!(
                    contract_address = collection.contract_address,
                    %direction,
                    "Nothing to dispatch"
                ),
            }
            commits.push(plan.commit);
        }

        let expected = commits.len();
        let applied = self
            .collections
            .commit_batch(commits, direction)
            .await
            .into_db_error()?;

        if applied < expected {
            tracing::warn!(
                %direction,
                expected,
                applied,
                "Claims were lost before commit, their progress is dropped"
            );
        }

        tracing::info!(%direction, collections = applied, "Crawl tick done");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use shared::collection::{CrawlSource, TokenType};
    use shared::error::Fatal;

    use super::*;
    use crate::store::CollectionStore;
    use crate::testing::{settings, FixedHead, Harness};

    fn monitored(address: &str, created_at: u64) -> Collection {
        Collection::new(address, TokenType::Erc721, created_at, CrawlSource::Monitor)
    }

    fn archived(address: &str, created_at: u64) -> Collection {
        Collection::new(address, TokenType::Erc721, created_at, CrawlSource::Archive)
    }

    #[tokio::test]
    async fn test_forward_tick_dispatches_and_commits() {
        let harness = Harness::new(
            vec![monitored("0xabc", 100)],
            vec![],
            FixedHead::at(300),
            settings(CrawlSource::Monitor),
        );

        harness.scheduler.forward_tick().await.unwrap();

        assert_eq!(harness.dispatcher.sent_ranges(), vec![(100, 150), (151, 200)]);
        let sent = harness.dispatcher.sent();
        assert_eq!(sent[0].deduplication_id, "0xabc-100-150");
        assert_eq!(sent[0].id, sent[0].deduplication_id);
        assert_ne!(sent[0].group_id, sent[1].group_id);

        let collection = harness.collections.get("0xabc");
        assert_eq!(collection.last_processed_block, Some(200));
        assert!(!collection.is_processing);
        assert!(collection.sent_at.is_some());
        assert_eq!(harness.head.calls(), 1);
    }

    #[tokio::test]
    async fn test_forward_progress_is_contiguous_up_to_ceiling() {
        let harness = Harness::new(
            vec![monitored("0xabc", 100)],
            vec![],
            FixedHead::at(420),
            settings(CrawlSource::Monitor),
        );

        for _ in 0..5 {
            harness.scheduler.forward_tick().await.unwrap();
        }

        let ranges = harness.dispatcher.sent_ranges();
        assert_eq!(ranges.first(), Some(&(100, 150)));
        assert_eq!(ranges.last().map(|r| r.1), Some(420));
        for pair in ranges.windows(2) {
            assert_eq!(pair[1].0, pair[0].1 + 1);
        }
        assert_eq!(
            harness.collections.get("0xabc").last_processed_block,
            Some(420)
        );

        harness.head.set(500);
        harness.scheduler.forward_tick().await.unwrap();
        assert_eq!(
            harness.dispatcher.sent_ranges().last(),
            Some(&(472, 500))
        );
    }

    #[tokio::test]
    async fn test_static_end_block_skips_chain_head() {
        let mut settings = settings(CrawlSource::Monitor);
        settings.end_block = Some(120);
        let harness = Harness::new(
            vec![monitored("0xabc", 100)],
            vec![],
            FixedHead::at(10_000),
            settings,
        );

        harness.scheduler.crawl_tick().await.unwrap();

        assert_eq!(harness.dispatcher.sent_ranges(), vec![(100, 120)]);
        assert_eq!(harness.head.calls(), 0);
    }

    #[tokio::test]
    async fn test_claimed_collection_is_left_alone() {
        let mut busy = monitored("0xabc", 100);
        busy.is_processing = true;
        let harness = Harness::new(
            vec![busy, monitored("0xdef", 100)],
            vec![],
            FixedHead::at(300),
            settings(CrawlSource::Monitor),
        );

        harness.scheduler.forward_tick().await.unwrap();

        assert!(harness
            .dispatcher
            .sent()
            .iter()
            .all(|m| m.body.contract_address == "0xdef"));
        assert_eq!(harness.collections.get("0xabc").last_processed_block, None);
    }

    #[tokio::test]
    async fn test_forward_tick_only_sees_its_lane() {
        let mut vip = monitored("0x01", 100);
        vip.vip = true;
        let harness = Harness::new(
            vec![vip, archived("0x02", 100), monitored("0x03", 100)],
            vec![],
            FixedHead::at(300),
            settings(CrawlSource::Monitor),
        );

        harness.scheduler.forward_tick().await.unwrap();

        assert_eq!(harness.collections.get("0x01").last_processed_block, None);
        assert_eq!(harness.collections.get("0x02").last_processed_block, None);
        assert_eq!(
            harness.collections.get("0x03").last_processed_block,
            Some(200)
        );
    }

    #[tokio::test]
    async fn test_query_limit_bounds_a_tick() {
        let mut settings = settings(CrawlSource::Monitor);
        settings.query_limit = 2;
        let harness = Harness::new(
            vec![
                monitored("0x01", 100),
                monitored("0x02", 100),
                monitored("0x03", 100),
            ],
            vec![],
            FixedHead::at(300),
            settings,
        );

        harness.scheduler.forward_tick().await.unwrap();

        assert_eq!(harness.dispatcher.sent().len(), 4);
    }

    #[tokio::test]
    async fn test_target_reached_is_cleared() {
        let mut collection = monitored("0xabc", 100);
        collection.last_processed_block = Some(150);
        collection.target_block = Some(180);
        let harness = Harness::new(
            vec![collection],
            vec![],
            FixedHead::at(10_000),
            settings(CrawlSource::Monitor),
        );

        harness.scheduler.forward_tick().await.unwrap();

        let collection = harness.collections.get("0xabc");
        assert_eq!(harness.dispatcher.sent_ranges(), vec![(151, 180)]);
        assert_eq!(collection.last_processed_block, Some(180));
        assert_eq!(collection.target_block, None);
    }

    #[tokio::test]
    async fn test_dispatch_failure_keeps_claim() {
        let mut collection = monitored("0xabc", 100);
        collection.last_processed_block = Some(99);
        let harness = Harness::new(
            vec![collection],
            vec![],
            FixedHead::at(300),
            settings(CrawlSource::Monitor),
        );
        harness.dispatcher.set_failing(true);

        assert_eq!(
            harness.scheduler.forward_tick().await,
            Err(MainError::Dispatch)
        );

        let collection = harness.collections.get("0xabc");
        assert_eq!(collection.last_processed_block, Some(99));
        assert!(collection.is_processing);
    }

    #[tokio::test]
    async fn test_store_failure_is_a_database_error() {
        let harness = Harness::new(
            vec![monitored("0xabc", 100)],
            vec![],
            FixedHead::at(300),
            settings(CrawlSource::Monitor),
        );
        harness.collections.set_failing(true);

        assert_eq!(
            harness.scheduler.forward_tick().await,
            Err(MainError::Database)
        );
        assert!(harness.dispatcher.sent().is_empty());
    }

    #[tokio::test]
    async fn test_fatal_chain_head_propagates() {
        let harness = Harness::new(
            vec![monitored("0xabc", 100)],
            vec![],
            FixedHead::fatal(Fatal::NoHealthyProvider { providers: 2 }),
            settings(CrawlSource::Monitor),
        );

        assert_eq!(
            harness.scheduler.forward_tick().await,
            Err(MainError::Fatal(Fatal::NoHealthyProvider { providers: 2 }))
        );
        assert!(!harness.collections.get("0xabc").is_processing);
    }

    #[tokio::test]
    async fn test_backward_tick_walks_down_to_floor() {
        let harness = Harness::new(
            vec![archived("0xabc", 1000)],
            vec![],
            FixedHead::fatal(Fatal::NoHealthyProvider { providers: 0 }),
            settings(CrawlSource::Archive),
        );

        for _ in 0..3 {
            harness.scheduler.crawl_tick().await.unwrap();
        }

        assert_eq!(
            harness.dispatcher.sent_ranges(),
            vec![(951, 1000), (900, 950), (851, 899), (800, 850)]
        );
        let collection = harness.collections.get("0xabc");
        assert_eq!(collection.first_processed_block, Some(800));
        assert!(!collection.is_processing_backward);
        assert_eq!(collection.last_processed_block, None);
        assert_eq!(harness.head.calls(), 0);
    }

    /// A worker that stalls past the staleness window and commits late must
    /// not roll back progress made after its claim was released.
    #[tokio::test]
    async fn test_late_commit_of_released_claim_is_dropped() {
        let mut collection = monitored("0xabc", 1);
        collection.last_processed_block = Some(100);
        let harness = Harness::new(
            vec![collection],
            vec![],
            FixedHead::at(1000),
            settings(CrawlSource::Monitor),
        );
        let address = vec!["0xabc".to_string()];

        let stalled = harness
            .collections
            .claim_batch(address.clone(), Direction::Forward)
            .await
            .unwrap();
        let stalled = plan_forward(&stalled[0], 1000, harness.scheduler.settings());
        assert_eq!(stalled.commit.processed_block, Some(201));

        let after_window = Utc::now().naive_utc() + chrono::Duration::minutes(5);
        let released = harness
            .collections
            .reset_processing(address.clone(), Direction::Forward, after_window)
            .await
            .unwrap();
        assert_eq!(released, 1);

        harness.scheduler.forward_tick().await.unwrap();
        harness.scheduler.forward_tick().await.unwrap();
        assert_eq!(
            harness.collections.get("0xabc").last_processed_block,
            Some(302)
        );

        let applied = harness
            .collections
            .commit_batch(vec![stalled.commit.clone()], Direction::Forward)
            .await
            .unwrap();
        assert_eq!(applied, 0);
        assert_eq!(
            harness.collections.get("0xabc").last_processed_block,
            Some(302)
        );

        harness
            .collections
            .claim_batch(address, Direction::Forward)
            .await
            .unwrap();
        let applied = harness
            .collections
            .commit_batch(vec![stalled.commit], Direction::Forward)
            .await
            .unwrap();
        assert_eq!(applied, 0);
        let collection = harness.collections.get("0xabc");
        assert_eq!(collection.last_processed_block, Some(302));
        assert!(collection.is_processing);
    }

    #[tokio::test]
    async fn test_late_backward_commit_keeps_lower_progress() {
        let harness = Harness::new(
            vec![archived("0xabc", 1000)],
            vec![],
            FixedHead::at(0),
            settings(CrawlSource::Archive),
        );
        let address = vec!["0xabc".to_string()];

        let stalled = harness
            .collections
            .claim_batch(address.clone(), Direction::Backward)
            .await
            .unwrap();
        let stalled = plan_backward(&stalled[0], harness.scheduler.settings());
        assert_eq!(stalled.commit.processed_block, Some(900));

        let after_window = Utc::now().naive_utc() + chrono::Duration::minutes(5);
        harness
            .collections
            .reset_processing(address, Direction::Backward, after_window)
            .await
            .unwrap();
        harness.scheduler.backward_tick().await.unwrap();
        harness.scheduler.backward_tick().await.unwrap();

        let applied = harness
            .collections
            .commit_batch(vec![stalled.commit], Direction::Backward)
            .await
            .unwrap();
        assert_eq!(applied, 0);
        assert_eq!(
            harness.collections.get("0xabc").first_processed_block,
            Some(800)
        );
    }
}
