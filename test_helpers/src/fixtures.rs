use diesel::{PgConnection, RunQueryDsl};
use orm::collection_tasks::CollectionTaskDb;
use orm::collections::CollectionInsertDb;
use orm::schema::{collection_tasks, collections};
use shared::collection::Collection;
use shared::task::Task;

pub fn seed_collections(
    conn: &mut PgConnection,
    rows: Vec<Collection>,
) -> anyhow::Result<()> {
    let rows = rows
        .into_iter()
        .map(CollectionInsertDb::from_collection)
        .collect::<anyhow::Result<Vec<_>>>()?;

    diesel::insert_into(collections::table)
        .values(&rows)
        .execute(conn)?;

    Ok(())
}

pub fn seed_tasks(conn: &mut PgConnection, rows: Vec<Task>) -> anyhow::Result<()> {
    let rows = rows
        .into_iter()
        .map(CollectionTaskDb::from_task)
        .collect::<anyhow::Result<Vec<_>>>()?;

    diesel::insert_into(collection_tasks::table)
        .values(&rows)
        .execute(conn)?;

    Ok(())
}
