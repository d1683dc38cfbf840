use chrono::NaiveDateTime;
use fake::Fake;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::block::BlockHeight;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum TokenType {
    #[serde(rename = "ERC721")]
    #[strum(serialize = "ERC721")]
    Erc721,
    #[serde(rename = "ERC1155")]
    #[strum(serialize = "ERC1155")]
    Erc1155,
}

/// Which crawler lane owns a collection.
#[derive(
    clap::ValueEnum,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[strum(serialize_all = "lowercase")]
pub enum CrawlSource {
    /// Follows the chain head.
    Monitor,
    /// Backfills history below the origin block.
    Archive,
}

impl CrawlSource {
    pub fn direction(&self) -> Direction {
        match self {
            CrawlSource::Monitor => Direction::Forward,
            CrawlSource::Archive => Direction::Backward,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub contract_address: String,
    pub token_type: TokenType,
    pub created_at_block: Option<BlockHeight>,
    pub source: CrawlSource,
    pub vip: bool,
    pub last_processed_block: Option<BlockHeight>,
    pub first_processed_block: Option<BlockHeight>,
    pub target_block: Option<BlockHeight>,
    pub is_processing: bool,
    pub is_processing_backward: bool,
    pub sent_at: Option<NaiveDateTime>,
}

impl Collection {
    /// A collection as it looks right after it has been registered.
    pub fn new(
        contract_address: impl Into<String>,
        token_type: TokenType,
        created_at_block: BlockHeight,
        source: CrawlSource,
    ) -> Self {
        Self {
            contract_address: contract_address.into().to_lowercase(),
            token_type,
            created_at_block: Some(created_at_block),
            source,
            vip: false,
            last_processed_block: None,
            first_processed_block: None,
            target_block: None,
            is_processing: false,
            is_processing_backward: false,
            sent_at: None,
        }
    }

    pub fn is_processing(&self, direction: Direction) -> bool {
        match direction {
            Direction::Forward => self.is_processing,
            Direction::Backward => self.is_processing_backward,
        }
    }

    pub fn set_processing(&mut self, direction: Direction, value: bool) {
        match direction {
            Direction::Forward => self.is_processing = value,
            Direction::Backward => self.is_processing_backward = value,
        }
    }

    pub fn fake(source: CrawlSource) -> Self {
        let mut rng = rand::thread_rng();
        let address: [u8; 20] = rng.gen();
        let token_type = if rng.gen_bool(0.5) {
            TokenType::Erc721
        } else {
            TokenType::Erc1155
        };
        let created_at_block = (12_000_000..19_000_000).fake::<u64>();

        let mut collection = Self::new(
            format!("0x{}", encode_hex(&address)),
            token_type,
            created_at_block,
            source,
        );
        collection.vip = rng.gen_bool(0.1);
        collection
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Progress written back once a collection's ranges were dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionCommit {
    pub contract_address: String,
    /// New high-water (forward) or low-water (backward) mark. `None` keeps
    /// the stored value.
    pub processed_block: Option<BlockHeight>,
    pub clear_target: bool,
    /// `sent_at` stamp of the claim being released. The commit only lands
    /// while the row still carries this claim.
    pub claimed_at: Option<NaiveDateTime>,
}
