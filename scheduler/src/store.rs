use async_trait::async_trait;
use chrono::NaiveDateTime;
use shared::block::BlockHeight;
use shared::collection::{
    Collection, CollectionCommit, CrawlSource, Direction,
};
use shared::task::Task;

/// Persistent crawl progress of every tracked collection.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Unclaimed collections of `source` whose forward progress is behind
    /// `ceiling`, or that carry a target block. Collections never crawled
    /// come first, then by ascending progress.
    async fn find_eligible_forward(
        &self,
        ceiling: BlockHeight,
        vip: bool,
        source: CrawlSource,
        limit: i64,
    ) -> anyhow::Result<Vec<Collection>>;

    /// Unclaimed collections of `source` whose backward progress is above
    /// `floor`, or that carry a target block. Collections never crawled
    /// come first, then by descending progress.
    async fn find_eligible_backward(
        &self,
        floor: BlockHeight,
        vip: bool,
        source: CrawlSource,
        limit: i64,
    ) -> anyhow::Result<Vec<Collection>>;

    /// Atomically sets the processing flag of `direction` on the addresses
    /// where it is still clear and stamps them as sent. Returns the claimed
    /// rows as they are after the claim.
    async fn claim_batch(
        &self,
        addresses: Vec<String>,
        direction: Direction,
    ) -> anyhow::Result<Vec<Collection>>;

    /// Applies every commit in one transaction and releases the claims. A
    /// commit whose claim was released or re-taken in the meantime is
    /// skipped. Returns how many commits were applied.
    async fn commit_batch(
        &self,
        commits: Vec<CollectionCommit>,
        direction: Direction,
    ) -> anyhow::Result<usize>;

    /// Addresses claimed for `direction` before `older_than`, or claimed
    /// without a dispatch timestamp.
    async fn find_stale(
        &self,
        direction: Direction,
        older_than: NaiveDateTime,
    ) -> anyhow::Result<Vec<String>>;

    /// Clears the processing flag of the addresses whose claim is still
    /// older than `older_than`.
    async fn reset_processing(
        &self,
        addresses: Vec<String>,
        direction: Direction,
        older_than: NaiveDateTime,
    ) -> anyhow::Result<usize>;
}

/// Ranges bounced back by the consumer for re-splitting.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn pop_one_split_task(
        &self,
        source: CrawlSource,
    ) -> anyhow::Result<Option<Task>>;

    async fn delete(&self, message_id: String) -> anyhow::Result<()>;
}
