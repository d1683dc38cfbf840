use diesel::prelude::*;
use orm::collection_tasks::{CollectionTaskDb, TaskStatusDb};
use orm::collections::CrawlSourceDb;
use orm::schema::collection_tasks;

/// Oldest task of `source` waiting to be split.
pub fn first_split_task(
    conn: &mut PgConnection,
    source: CrawlSourceDb,
) -> anyhow::Result<Option<CollectionTaskDb>> {
    let task = collection_tasks::table
        .filter(collection_tasks::status.eq(TaskStatusDb::Split))
        .filter(collection_tasks::source.eq(source))
        .order((
            collection_tasks::created_at.asc(),
            collection_tasks::message_id.asc(),
        ))
        .select(CollectionTaskDb::as_select())
        .first(conn)
        .optional()?;

    anyhow::Ok(task)
}

pub fn delete_task(
    transaction_conn: &mut PgConnection,
    message_id: String,
) -> anyhow::Result<usize> {
    let deleted =
        diesel::delete(collection_tasks::table.find(message_id))
            .execute(transaction_conn)?;

    anyhow::Ok(deleted)
}
