use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use shared::block::BlockHeight;
use shared::collection::{
    Collection, CollectionCommit, CrawlSource, Direction,
};
use shared::error::{Fatal, MainError};
use shared::queue::{QueueMessage, SentMessage};
use shared::task::{Task, TaskStatus};

use crate::crawl::{CrawlScheduler, CrawlSettings};
use crate::dispatcher::Dispatcher;
use crate::provider::{ChainHead, HeightSource};
use crate::store::{CollectionStore, TaskStore};

pub fn settings(source: CrawlSource) -> CrawlSettings {
    CrawlSettings {
        source,
        vip: false,
        query_limit: 10,
        block_interval: 50,
        messages_per_process: 2,
        end_block: None,
        floor_block: 800,
        stale_after: Duration::from_secs(60),
    }
}

pub struct Harness {
    pub collections: Arc<MemoryCollectionStore>,
    pub tasks: Arc<MemoryTaskStore>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub head: Arc<FixedHead>,
    pub scheduler: CrawlScheduler,
}

impl Harness {
    pub fn new(
        collections: Vec<Collection>,
        tasks: Vec<Task>,
        head: Arc<FixedHead>,
        settings: CrawlSettings,
    ) -> Self {
        let collections = MemoryCollectionStore::new(collections);
        let tasks = MemoryTaskStore::new(tasks);
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let scheduler = CrawlScheduler::new(
            collections.clone(),
            tasks.clone(),
            dispatcher.clone(),
            head.clone(),
            settings,
        );

        Self {
            collections,
            tasks,
            dispatcher,
            head,
            scheduler,
        }
    }
}

#[derive(Default)]
pub struct MemoryCollectionStore {
    rows: Mutex<BTreeMap<String, Collection>>,
    failing: AtomicBool,
}

impl MemoryCollectionStore {
    pub fn new(collections: Vec<Collection>) -> Arc<Self> {
        let rows = collections
            .into_iter()
            .map(|collection| (collection.contract_address.clone(), collection))
            .collect();
        Arc::new(Self {
            rows: Mutex::new(rows),
            failing: AtomicBool::new(false),
        })
    }

    pub fn get(&self, address: &str) -> Collection {
        self.rows.lock().unwrap()[address].clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("connection refused"));
        }
        Ok(())
    }

    fn eligible(
        &self,
        source: CrawlSource,
        vip: bool,
        direction: Direction,
        limit: i64,
        behind: impl Fn(&Collection) -> bool,
    ) -> Vec<Collection> {
        let rows = self.rows.lock().unwrap();
        let mut eligible = rows
            .values()
            .filter(|c| c.source == source && c.vip == vip)
            .filter(|c| !c.is_processing(direction))
            .filter(|c| c.created_at_block.is_some())
            .filter(|c| c.target_block.is_some() || behind(*c))
            .cloned()
            .collect::<Vec<_>>();
        match direction {
            Direction::Forward => {
                eligible.sort_by_key(|c| c.last_processed_block)
            }
            Direction::Backward => eligible.sort_by_key(|c| {
                c.first_processed_block.map(std::cmp::Reverse)
            }),
        }
        eligible.truncate(limit as usize);
        eligible
    }
}

#[async_trait]
impl CollectionStore for MemoryCollectionStore {
    async fn find_eligible_forward(
        &self,
        ceiling: BlockHeight,
        vip: bool,
        source: CrawlSource,
        limit: i64,
    ) -> anyhow::Result<Vec<Collection>> {
        self.check()?;
        Ok(self.eligible(source, vip, Direction::Forward, limit, |c| {
            c.last_processed_block.map_or(true, |last| last < ceiling)
        }))
    }

    async fn find_eligible_backward(
        &self,
        floor: BlockHeight,
        vip: bool,
        source: CrawlSource,
        limit: i64,
    ) -> anyhow::Result<Vec<Collection>> {
        self.check()?;
        Ok(self.eligible(source, vip, Direction::Backward, limit, |c| {
            c.first_processed_block.map_or(true, |first| first > floor)
        }))
    }

    async fn claim_batch(
        &self,
        addresses: Vec<String>,
        direction: Direction,
    ) -> anyhow::Result<Vec<Collection>> {
        self.check()?;
        let now = Utc::now().naive_utc();
        let mut rows = self.rows.lock().unwrap();
        let mut claimed = vec![];
        for address in addresses {
            if let Some(row) = rows.get_mut(&address) {
                if !row.is_processing(direction) {
                    row.set_processing(direction, true);
                    row.sent_at = Some(now);
                    claimed.push(row.clone());
                }
            }
        }
        Ok(claimed)
    }

    async fn commit_batch(
        &self,
        commits: Vec<CollectionCommit>,
        direction: Direction,
    ) -> anyhow::Result<usize> {
        self.check()?;
        let now = Utc::now().naive_utc();
        let mut rows = self.rows.lock().unwrap();
        let mut applied = 0;
        for commit in commits {
            let Some(row) = rows.get_mut(&commit.contract_address) else {
                continue;
            };
            if !row.is_processing(direction) || row.sent_at != commit.claimed_at {
                continue;
            }
            if let Some(block) = commit.processed_block {
                match direction {
                    Direction::Forward => row.last_processed_block = Some(block),
                    Direction::Backward => {
                        row.first_processed_block = Some(block)
                    }
                }
            }
            if commit.clear_target {
                row.target_block = None;
            }
            row.set_processing(direction, false);
            row.sent_at = Some(now);
            applied += 1;
        }
        Ok(applied)
    }

    async fn find_stale(
        &self,
        direction: Direction,
        older_than: NaiveDateTime,
    ) -> anyhow::Result<Vec<String>> {
        self.check()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .filter(|c| c.is_processing(direction))
            .filter(|c| c.sent_at.map_or(true, |sent_at| sent_at < older_than))
            .map(|c| c.contract_address.clone())
            .collect())
    }

    async fn reset_processing(
        &self,
        addresses: Vec<String>,
        direction: Direction,
        older_than: NaiveDateTime,
    ) -> anyhow::Result<usize> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        let mut reset = 0;
        for address in addresses {
            let Some(row) = rows.get_mut(&address) else {
                continue;
            };
            let stale = row.sent_at.map_or(true, |sent_at| sent_at < older_than);
            if row.is_processing(direction) && stale {
                row.set_processing(direction, false);
                reset += 1;
            }
        }
        Ok(reset)
    }
}

#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
}

impl MemoryTaskStore {
    pub fn new(tasks: Vec<Task>) -> Arc<Self> {
        Arc::new(Self {
            tasks: Mutex::new(tasks),
        })
    }

    pub fn remaining(&self) -> Vec<Task> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn pop_one_split_task(
        &self,
        source: CrawlSource,
    ) -> anyhow::Result<Option<Task>> {
        let tasks = self.tasks.lock().unwrap();
        Ok(tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Split && t.source == source)
            .min_by_key(|t| t.created_at)
            .cloned())
    }

    async fn delete(&self, message_id: String) -> anyhow::Result<()> {
        self.tasks
            .lock()
            .unwrap()
            .retain(|task| task.message_id != message_id);
        Ok(())
    }
}

/// Keeps every message it enqueued and honours deduplication ids forever.
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<QueueMessage>>,
    seen: Mutex<HashMap<String, String>>,
    failing: AtomicBool,
}

impl RecordingDispatcher {
    pub fn sent(&self) -> Vec<QueueMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_ranges(&self) -> Vec<(u64, u64)> {
        self.sent()
            .iter()
            .map(|m| (m.body.start_block, m.body.end_block))
            .collect()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn send(
        &self,
        messages: Vec<QueueMessage>,
    ) -> anyhow::Result<Vec<SentMessage>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("queue unavailable"));
        }

        let mut sent = self.sent.lock().unwrap();
        let mut seen = self.seen.lock().unwrap();
        Ok(messages
            .into_iter()
            .map(|message| {
                let next = format!("{}-0", seen.len() + 1);
                let queue_id = seen
                    .entry(message.deduplication_id.clone())
                    .or_insert_with(|| {
                        sent.push(message.clone());
                        next
                    })
                    .clone();
                SentMessage {
                    id: message.id,
                    queue_id,
                }
            })
            .collect())
    }
}

pub struct FixedHead {
    height: AtomicU64,
    fatal: Mutex<Option<Fatal>>,
    calls: AtomicUsize,
}

impl FixedHead {
    pub fn at(height: BlockHeight) -> Arc<Self> {
        Arc::new(Self {
            height: AtomicU64::new(height),
            fatal: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn fatal(fatal: Fatal) -> Arc<Self> {
        let head = Self::at(0);
        *head.fatal.lock().unwrap() = Some(fatal);
        head
    }

    pub fn set(&self, height: BlockHeight) {
        self.height.store(height, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainHead for FixedHead {
    async fn block_height(&self) -> Result<BlockHeight, MainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(fatal) = self.fatal.lock().unwrap().clone() {
            return Err(MainError::Fatal(fatal));
        }
        Ok(self.height.load(Ordering::SeqCst))
    }
}

pub struct FakeSource {
    name: String,
    height: BlockHeight,
    healthy: AtomicBool,
    hanging: bool,
    calls: AtomicUsize,
}

impl FakeSource {
    fn build(name: &str, height: BlockHeight, healthy: bool, hanging: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            height,
            healthy: AtomicBool::new(healthy),
            hanging,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn healthy(name: &str, height: BlockHeight) -> Arc<Self> {
        Self::build(name, height, true, false)
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Self::build(name, 0, false, false)
    }

    pub fn hanging(name: &str) -> Arc<Self> {
        Self::build(name, 0, true, true)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HeightSource for FakeSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn block_number(&self) -> anyhow::Result<BlockHeight> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hanging {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.healthy.load(Ordering::SeqCst) {
            Ok(self.height)
        } else {
            Err(anyhow!("{} is down", self.name))
        }
    }
}
