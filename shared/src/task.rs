use chrono::NaiveDateTime;
use rand::Rng;

use crate::block::BlockRange;
use crate::collection::{Collection, CrawlSource, TokenType};
use crate::queue::deduplication_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TaskStatus {
    Sent,
    Split,
}

/// A dispatched range that the consumer bounced back for re-splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub message_id: String,
    pub contract_address: String,
    pub token_type: TokenType,
    pub source: CrawlSource,
    pub range: BlockRange,
    pub status: TaskStatus,
    pub created_at: NaiveDateTime,
}

impl Task {
    /// Ranges at most one block wide cannot be bisected any further.
    pub fn is_minimal(&self) -> bool {
        self.range.width() <= 1
    }

    pub fn split(&self) -> Vec<BlockRange> {
        if self.is_minimal() {
            self.range.split_by_count(1)
        } else {
            self.range.split_by_count(2)
        }
    }

    /// A bounced range somewhere past the origin of `collection`.
    pub fn fake(collection: &Collection) -> Self {
        let mut rng = rand::thread_rng();
        let origin = collection.created_at_block.unwrap_or_default();
        let start = origin + rng.gen_range(0..100_000);
        let end = start + rng.gen_range(1..1_000);
        let age = rng.gen_range(0..3_600);

        Self {
            message_id: deduplication_id(&collection.contract_address, start, end),
            contract_address: collection.contract_address.clone(),
            token_type: collection.token_type,
            source: collection.source,
            range: BlockRange::new(start, end),
            status: TaskStatus::Split,
            created_at: chrono::Utc::now().naive_utc()
                - chrono::Duration::seconds(age),
        }
    }
}
