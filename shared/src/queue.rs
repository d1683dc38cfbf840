use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::block::{BlockHeight, BlockRange};
use crate::collection::TokenType;

/// Payload consumed downstream: one block range of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessageBody {
    pub contract_address: String,
    pub token_type: TokenType,
    pub start_block: BlockHeight,
    pub end_block: BlockHeight,
}

impl QueueMessageBody {
    pub fn range(&self) -> BlockRange {
        BlockRange::new(self.start_block, self.end_block)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub id: String,
    pub body: QueueMessageBody,
    pub group_id: String,
    pub deduplication_id: String,
}

impl QueueMessage {
    /// Each message gets its own random group so that consumers can work on
    /// the ranges of one collection in parallel.
    pub fn new(body: QueueMessageBody) -> Self {
        let deduplication_id = deduplication_id(
            &body.contract_address,
            body.start_block,
            body.end_block,
        );

        Self {
            id: deduplication_id.clone(),
            body,
            group_id: Uuid::new_v4().to_string(),
            deduplication_id,
        }
    }

    pub fn serialized_body(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.body)
    }
}

/// Transport receipt for one message, in the order the messages were sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub id: String,
    pub queue_id: String,
}

pub fn deduplication_id(
    contract_address: &str,
    start_block: BlockHeight,
    end_block: BlockHeight,
) -> String {
    format!("{}-{}-{}", contract_address, start_block, end_block)
}

pub fn partition_by_step(
    contract_address: &str,
    token_type: TokenType,
    range: BlockRange,
    step: u64,
) -> Vec<QueueMessageBody> {
    bodies_for_ranges(contract_address, token_type, range.split_by_step(step))
}

pub fn partition_by_count(
    contract_address: &str,
    token_type: TokenType,
    range: BlockRange,
    count: u64,
) -> Vec<QueueMessageBody> {
    bodies_for_ranges(contract_address, token_type, range.split_by_count(count))
}

pub fn bodies_for_ranges(
    contract_address: &str,
    token_type: TokenType,
    ranges: Vec<BlockRange>,
) -> Vec<QueueMessageBody> {
    ranges
        .into_iter()
        .map(|range| QueueMessageBody {
            contract_address: contract_address.to_string(),
            token_type,
            start_block: range.start,
            end_block: range.end,
        })
        .collect()
}
