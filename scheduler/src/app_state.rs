use std::env;

use anyhow::Context;
use deadpool_diesel::postgres::{Object, Pool as DbPool};
use deadpool_redis::{Config, Connection, Pool as QueuePool};

#[derive(Clone)]
pub struct AppState {
    db: DbPool,
    queue: QueuePool,
}

impl AppState {
    pub fn new(db_url: String, queue_url: String) -> anyhow::Result<Self> {
        let max_pool_size = env::var("DATABASE_POOL_SIZE")
            .unwrap_or_else(|_| 8.to_string())
            .parse::<usize>()
            .unwrap_or(8_usize);
        let pool_manager = deadpool_diesel::Manager::new(
            db_url,
            deadpool_diesel::Runtime::Tokio1,
        );
        let db = DbPool::builder(pool_manager)
            .max_size(max_pool_size)
            .build()
            .context("Failed to build Postgres db pool")?;

        let queue = Config::from_url(queue_url)
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .context("Failed to build Redis queue pool")?;

        Ok(Self { db, queue })
    }

    pub fn db_pool(&self) -> DbPool {
        self.db.clone()
    }

    pub fn queue_pool(&self) -> QueuePool {
        self.queue.clone()
    }

    pub async fn get_db_connection(&self) -> anyhow::Result<Object> {
        self.db
            .get()
            .await
            .context("Failed to get db connection handle from deadpool")
    }

    pub async fn get_queue_connection(&self) -> anyhow::Result<Connection> {
        self.queue
            .get()
            .await
            .context("Failed to get queue connection handle from deadpool")
    }
}
