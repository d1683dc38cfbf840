use diesel::{AsChangeset, Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};
use shared::collection::{Collection, CrawlSource, TokenType};

use crate::height::{from_db_opt, to_db_opt};
use crate::schema::collections;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    diesel_derive_enum::DbEnum,
)]
#[ExistingTypePath = "crate::schema::sql_types::TokenType"]
pub enum TokenTypeDb {
    Erc721,
    Erc1155,
}

impl From<TokenType> for TokenTypeDb {
    fn from(value: TokenType) -> Self {
        match value {
            TokenType::Erc721 => Self::Erc721,
            TokenType::Erc1155 => Self::Erc1155,
        }
    }
}

impl From<TokenTypeDb> for TokenType {
    fn from(value: TokenTypeDb) -> Self {
        match value {
            TokenTypeDb::Erc721 => Self::Erc721,
            TokenTypeDb::Erc1155 => Self::Erc1155,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    diesel_derive_enum::DbEnum,
)]
#[ExistingTypePath = "crate::schema::sql_types::CrawlSource"]
pub enum CrawlSourceDb {
    Monitor,
    Archive,
}

impl From<CrawlSource> for CrawlSourceDb {
    fn from(value: CrawlSource) -> Self {
        match value {
            CrawlSource::Monitor => Self::Monitor,
            CrawlSource::Archive => Self::Archive,
        }
    }
}

impl From<CrawlSourceDb> for CrawlSource {
    fn from(value: CrawlSourceDb) -> Self {
        match value {
            CrawlSourceDb::Monitor => Self::Monitor,
            CrawlSourceDb::Archive => Self::Archive,
        }
    }
}

#[derive(Serialize, Queryable, Selectable, Insertable, Clone, Debug)]
#[diesel(table_name = collections)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CollectionDb {
    pub contract_address: String,
    pub token_type: TokenTypeDb,
    pub created_at_block: Option<i64>,
    pub source: CrawlSourceDb,
    pub vip: bool,
    pub last_processed_block: Option<i64>,
    pub first_processed_block: Option<i64>,
    pub target_block: Option<i64>,
    pub is_processing: bool,
    pub is_processing_backward: bool,
    pub sent_at: Option<chrono::NaiveDateTime>,
}

pub type CollectionInsertDb = CollectionDb;

impl CollectionDb {
    pub fn from_collection(collection: Collection) -> anyhow::Result<Self> {
        Ok(Self {
            contract_address: collection.contract_address,
            token_type: collection.token_type.into(),
            created_at_block: to_db_opt(collection.created_at_block)?,
            source: collection.source.into(),
            vip: collection.vip,
            last_processed_block: to_db_opt(collection.last_processed_block)?,
            first_processed_block: to_db_opt(
                collection.first_processed_block,
            )?,
            target_block: to_db_opt(collection.target_block)?,
            is_processing: collection.is_processing,
            is_processing_backward: collection.is_processing_backward,
            sent_at: collection.sent_at,
        })
    }
}

impl TryFrom<CollectionDb> for Collection {
    type Error = anyhow::Error;

    fn try_from(value: CollectionDb) -> Result<Self, Self::Error> {
        Ok(Self {
            created_at_block: from_db_opt(value.created_at_block)?,
            last_processed_block: from_db_opt(value.last_processed_block)?,
            first_processed_block: from_db_opt(value.first_processed_block)?,
            target_block: from_db_opt(value.target_block)?,
            contract_address: value.contract_address,
            token_type: value.token_type.into(),
            source: value.source.into(),
            vip: value.vip,
            is_processing: value.is_processing,
            is_processing_backward: value.is_processing_backward,
            sent_at: value.sent_at,
        })
    }
}

/// Forward progress written when a claim is released. `None` fields are left
/// untouched; `target_block: Some(None)` clears the target.
#[derive(AsChangeset, Clone, Debug)]
#[diesel(table_name = collections)]
pub struct ForwardProgressDb {
    pub last_processed_block: Option<i64>,
    pub target_block: Option<Option<i64>>,
    pub is_processing: bool,
    pub sent_at: chrono::NaiveDateTime,
}

#[derive(AsChangeset, Clone, Debug)]
#[diesel(table_name = collections)]
pub struct BackwardProgressDb {
    pub first_processed_block: Option<i64>,
    pub target_block: Option<Option<i64>>,
    pub is_processing_backward: bool,
    pub sent_at: chrono::NaiveDateTime,
}
