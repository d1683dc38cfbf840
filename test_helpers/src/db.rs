use std::convert::identity;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::{env, process, thread};

use deadpool_diesel::postgres::{Manager, Pool};
use deadpool_diesel::Runtime;
use diesel::{sql_query, Connection, PgConnection, RunQueryDsl};
use orm::migrations::run_migrations;
use shared::error::{AsDbError, ContextDbInteractError};

static DATABASE_SEQUENCE: AtomicU32 = AtomicU32::new(0);

const POOL_SIZE: usize = 4;

fn admin_connection(server_url: &str) -> PgConnection {
    PgConnection::establish(server_url)
        .expect("DATABASE_URL_TEST should point to a reachable server")
}

/// Scratch crawl database on the server of `DATABASE_URL_TEST`. It is
/// migrated on first use and dropped with the value.
pub struct TestDb {
    server_url: String,
    name: String,
    pool: Pool,
    migrated: AtomicBool,
}

impl TestDb {
    pub fn new() -> Self {
        let server_url =
            env::var("DATABASE_URL_TEST").expect("DATABASE_URL_TEST not set");
        let name = format!(
            "crawl_test_{}_{}",
            process::id(),
            DATABASE_SEQUENCE.fetch_add(1, Ordering::SeqCst)
        );

        sql_query(format!("CREATE DATABASE {name}"))
            .execute(&mut admin_connection(&server_url))
            .expect("Failed to create test db");

        let manager =
            Manager::new(format!("{server_url}/{name}"), Runtime::Tokio1);
        let pool = Pool::builder(manager)
            .max_size(POOL_SIZE)
            .build()
            .expect("Failed to build test db pool");

        Self {
            server_url,
            name,
            pool,
            migrated: AtomicBool::new(false),
        }
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        if self.migrated.load(Ordering::SeqCst) {
            return Ok(());
        }

        let conn = self.pool.get().await?;
        run_migrations(&conn).await?;
        self.migrated.store(true, Ordering::SeqCst);

        Ok(())
    }

    /// Pool on the migrated database, for code that manages its own
    /// connections.
    pub async fn pool(&self) -> anyhow::Result<Pool> {
        self.migrate().await?;

        Ok(self.pool.clone())
    }

    /// Runs `test` in a read-write transaction on the migrated database.
    pub async fn run_test(
        &self,
        test: impl Fn(&mut PgConnection) -> anyhow::Result<()> + Send + 'static,
    ) -> anyhow::Result<()> {
        self.migrate().await?;
        let conn = self.pool.get().await?;

        conn.interact(move |conn| {
            conn.build_transaction().read_write().run(test)
        })
        .await
        .context_db_interact_error()
        .and_then(identity)
        .into_db_error()?;

        anyhow::Ok(())
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        if thread::panicking() {
            eprintln!("Keeping test db {} of a failed test", self.name);
            return;
        }

        let mut conn = admin_connection(&self.server_url);
        sql_query(format!("DROP DATABASE {} WITH (FORCE)", self.name))
            .execute(&mut conn)
            .expect("Failed to drop test db");
    }
}

impl Default for TestDb {
    fn default() -> Self {
        Self::new()
    }
}
