use anyhow::Context;
use deadpool_diesel::postgres::Object;
use diesel_migrations::{
    embed_migrations, EmbeddedMigrations, MigrationHarness,
};
use shared::error::ContextDbInteractError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Applies pending migrations and returns how many were applied.
pub async fn run_migrations(conn: &Object) -> anyhow::Result<usize> {
    conn.interact(|transaction_conn| {
        transaction_conn
            .run_pending_migrations(MIGRATIONS)
            .map(|applied| applied.len())
            .map_err(|e| anyhow::anyhow!("{}", e))
    })
    .await
    .context_db_interact_error()?
    .context("Failed to run pending migrations")
}
