use diesel::{Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};
use shared::block::BlockRange;
use shared::task::{Task, TaskStatus};

use crate::collections::{CrawlSourceDb, TokenTypeDb};
use crate::height::{from_db, to_db};
use crate::schema::collection_tasks;

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
#[ExistingTypePath = "crate::schema::sql_types::TaskStatus"]
pub enum TaskStatusDb {
    Sent,
    Split,
}

impl From<TaskStatus> for TaskStatusDb {
    fn from(value: TaskStatus) -> Self {
        match value {
            TaskStatus::Sent => Self::Sent,
            TaskStatus::Split => Self::Split,
        }
    }
}

impl From<TaskStatusDb> for TaskStatus {
    fn from(value: TaskStatusDb) -> Self {
        match value {
            TaskStatusDb::Sent => Self::Sent,
            TaskStatusDb::Split => Self::Split,
        }
    }
}

#[derive(Serialize, Queryable, Selectable, Insertable, Clone, Debug)]
#[diesel(table_name = collection_tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CollectionTaskDb {
    pub message_id: String,
    pub contract_address: String,
    pub token_type: TokenTypeDb,
    pub source: CrawlSourceDb,
    pub start_block: i64,
    pub end_block: i64,
    pub status: TaskStatusDb,
    pub created_at: chrono::NaiveDateTime,
}

impl CollectionTaskDb {
    pub fn from_task(task: Task) -> anyhow::Result<Self> {
        Ok(Self {
            start_block: to_db(task.range.start)?,
            end_block: to_db(task.range.end)?,
            message_id: task.message_id,
            contract_address: task.contract_address,
            token_type: task.token_type.into(),
            source: task.source.into(),
            status: task.status.into(),
            created_at: task.created_at,
        })
    }
}

impl TryFrom<CollectionTaskDb> for Task {
    type Error = anyhow::Error;

    fn try_from(value: CollectionTaskDb) -> Result<Self, Self::Error> {
        Ok(Self {
            range: BlockRange::new(
                from_db(value.start_block)?,
                from_db(value.end_block)?,
            ),
            message_id: value.message_id,
            contract_address: value.contract_address,
            token_type: value.token_type.into(),
            source: value.source.into(),
            status: value.status.into(),
            created_at: value.created_at,
        })
    }
}
