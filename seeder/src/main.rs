use anyhow::Context;
use clap::Parser;
use diesel::RunQueryDsl;
use orm::collection_tasks::CollectionTaskDb;
use orm::collections::CollectionInsertDb;
use orm::migrations::run_migrations;
use orm::schema::{collection_tasks, collections};
use rand::seq::SliceRandom;
use seeder::config::AppConfig;
use seeder::state::AppState;
use shared::collection::Collection;
use shared::error::{AsDbError, ContextDbInteractError, MainError};
use shared::task::Task;

#[tokio::main]
async fn main() -> anyhow::Result<(), MainError> {
    let config = AppConfig::parse();

    config.log.init();

    let collections = (0..config.total_collections)
        .map(|_| Collection::fake(config.source))
        .collect::<Vec<Collection>>();

    let tasks = (0..config.total_tasks)
        .filter_map(|_| {
            collections
                .choose(&mut rand::thread_rng())
                .map(Task::fake)
        })
        .collect::<Vec<Task>>();

    tracing::info!(
        collections = collections.len(),
        tasks = tasks.len(),
        source = %config.source,
        "Seeding database"
    );

    let collections = collections
        .into_iter()
        .map(CollectionInsertDb::from_collection)
        .collect::<anyhow::Result<Vec<_>>>()
        .into_db_error()?;
    let tasks = tasks
        .into_iter()
        .map(CollectionTaskDb::from_task)
        .collect::<anyhow::Result<Vec<_>>>()
        .into_db_error()?;

    let app_state = AppState::new(config.database_url).into_db_error()?;
    let conn = app_state.get_db_connection().await.into_db_error()?;

    run_migrations(&conn).await.into_db_error()?;

    let keep_existing = config.keep_existing;
    conn.interact(move |conn| {
        conn.build_transaction()
            .read_write()
            .run(|transaction_conn| {
                if !keep_existing {
                    diesel::delete(collection_tasks::table)
                        .execute(transaction_conn)
                        .context("Failed to remove all collection tasks")?;

                    diesel::delete(collections::table)
                        .execute(transaction_conn)
                        .context("Failed to remove all collections")?;
                }

                diesel::insert_into(collections::table)
                    .values::<&Vec<CollectionInsertDb>>(&collections)
                    .on_conflict_do_nothing()
                    .execute(transaction_conn)
                    .context("Failed to insert collections in db")?;

                diesel::insert_into(collection_tasks::table)
                    .values::<&Vec<CollectionTaskDb>>(&tasks)
                    .on_conflict_do_nothing()
                    .execute(transaction_conn)
                    .context("Failed to insert collection tasks in db")?;

                anyhow::Ok(())
            })
    })
    .await
    .context_db_interact_error()
    .into_db_error()?
    .context("Seed db transaction error")
    .into_db_error()
}
