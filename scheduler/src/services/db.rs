use std::convert::identity;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use deadpool_diesel::postgres::{Object, Pool as DbPool};
use shared::block::BlockHeight;
use shared::collection::{
    Collection, CollectionCommit, CrawlSource, Direction,
};
use shared::error::ContextDbInteractError;
use shared::task::Task;

use crate::repository;
use crate::store::{CollectionStore, TaskStore};

async fn get_connection(pool: &DbPool) -> anyhow::Result<Object> {
    pool.get()
        .await
        .context("Failed to get db connection handle from deadpool")
}

#[derive(Clone)]
pub struct PgCollectionStore {
    pool: DbPool,
}

impl PgCollectionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CollectionStore for PgCollectionStore {
    async fn find_eligible_forward(
        &self,
        ceiling: BlockHeight,
        vip: bool,
        source: CrawlSource,
        limit: i64,
    ) -> anyhow::Result<Vec<Collection>> {
        let conn = get_connection(&self.pool).await?;

        let rows = conn
            .interact(move |conn| {
                repository::collections::find_eligible_forward(
                    conn,
                    ceiling,
                    vip,
                    source.into(),
                    limit,
                )
            })
            .await
            .context_db_interact_error()
            .and_then(identity)
            .context("Failed to query forward eligible collections")?;

        rows.into_iter().map(Collection::try_from).collect()
    }

    async fn find_eligible_backward(
        &self,
        floor: BlockHeight,
        vip: bool,
        source: CrawlSource,
        limit: i64,
    ) -> anyhow::Result<Vec<Collection>> {
        let conn = get_connection(&self.pool).await?;

        let rows = conn
            .interact(move |conn| {
                repository::collections::find_eligible_backward(
                    conn,
                    floor,
                    vip,
                    source.into(),
                    limit,
                )
            })
            .await
            .context_db_interact_error()
            .and_then(identity)
            .context("Failed to query backward eligible collections")?;

        rows.into_iter().map(Collection::try_from).collect()
    }

    async fn claim_batch(
        &self,
        addresses: Vec<String>,
        direction: Direction,
    ) -> anyhow::Result<Vec<Collection>> {
        let conn = get_connection(&self.pool).await?;
        let now = Utc::now().naive_utc();

        let rows = conn
            .interact(move |conn| {
                repository::collections::claim(conn, addresses, direction, now)
            })
            .await
            .context_db_interact_error()
            .and_then(identity)
            .context("Failed to claim collections")?;

        rows.into_iter().map(Collection::try_from).collect()
    }

    async fn commit_batch(
        &self,
        commits: Vec<CollectionCommit>,
        direction: Direction,
    ) -> anyhow::Result<usize> {
        let conn = get_connection(&self.pool).await?;
        let now = Utc::now().naive_utc();

        conn.interact(move |conn| {
            conn.build_transaction().read_write().run(
                |transaction_conn: &mut diesel::prelude::PgConnection| {
                    let mut applied = 0;
                    for commit in commits {
                        applied += repository::collections::commit_progress(
                            transaction_conn,
                            commit,
                            direction,
                            now,
                        )?;
                    }

                    anyhow::Ok(applied)
                },
            )
        })
        .await
        .context_db_interact_error()
        .and_then(identity)
        .context("Failed to commit crawl progress")
    }

    async fn find_stale(
        &self,
        direction: Direction,
        older_than: NaiveDateTime,
    ) -> anyhow::Result<Vec<String>> {
        let conn = get_connection(&self.pool).await?;

        conn.interact(move |conn| {
            repository::collections::find_stale(conn, direction, older_than)
        })
        .await
        .context_db_interact_error()
        .and_then(identity)
        .context("Failed to query stale claims")
    }

    async fn reset_processing(
        &self,
        addresses: Vec<String>,
        direction: Direction,
        older_than: NaiveDateTime,
    ) -> anyhow::Result<usize> {
        let conn = get_connection(&self.pool).await?;

        conn.interact(move |conn| {
            repository::collections::reset_processing(
                conn, addresses, direction, older_than,
            )
        })
        .await
        .context_db_interact_error()
        .and_then(identity)
        .context("Failed to release stale claims")
    }
}

#[derive(Clone)]
pub struct PgTaskStore {
    pool: DbPool,
}

impl PgTaskStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn pop_one_split_task(
        &self,
        source: CrawlSource,
    ) -> anyhow::Result<Option<Task>> {
        let conn = get_connection(&self.pool).await?;

        let task = conn
            .interact(move |conn| {
                repository::tasks::first_split_task(conn, source.into())
            })
            .await
            .context_db_interact_error()
            .and_then(identity)
            .context("Failed to query split tasks")?;

        task.map(Task::try_from).transpose()
    }

    async fn delete(&self, message_id: String) -> anyhow::Result<()> {
        let conn = get_connection(&self.pool).await?;

        let deleted = conn
            .interact(move |conn| {
                repository::tasks::delete_task(conn, message_id)
            })
            .await
            .context_db_interact_error()
            .and_then(identity)
            .context("Failed to delete split task")?;

        if deleted == 0 {
            tracing::warn!("Split task was already gone");
        }

        Ok(())
    }
}
