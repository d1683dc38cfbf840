use chrono::NaiveDateTime;
use diesel::prelude::*;
use orm::collections::{
    BackwardProgressDb, CollectionDb, CrawlSourceDb,
    ForwardProgressDb,
};
use orm::height;
use orm::schema::collections;
use shared::block::BlockHeight;
use shared::collection::{CollectionCommit, Direction};

pub fn find_eligible_forward(
    conn: &mut PgConnection,
    ceiling: BlockHeight,
    vip: bool,
    source: CrawlSourceDb,
    limit: i64,
) -> anyhow::Result<Vec<CollectionDb>> {
    let ceiling = height::to_db(ceiling)?;

    let rows = collections::table
        .filter(collections::source.eq(source))
        .filter(collections::vip.eq(vip))
        .filter(collections::is_processing.eq(false))
        .filter(collections::created_at_block.is_not_null())
        .filter(
            collections::last_processed_block
                .is_null()
                .or(collections::last_processed_block.lt(ceiling))
                .or(collections::target_block.is_not_null()),
        )
        .order(collections::last_processed_block.asc().nulls_first())
        .limit(limit)
        .select(CollectionDb::as_select())
        .load(conn)?;

    anyhow::Ok(rows)
}

pub fn find_eligible_backward(
    conn: &mut PgConnection,
    floor: BlockHeight,
    vip: bool,
    source: CrawlSourceDb,
    limit: i64,
) -> anyhow::Result<Vec<CollectionDb>> {
    let floor = height::to_db(floor)?;

    let rows = collections::table
        .filter(collections::source.eq(source))
        .filter(collections::vip.eq(vip))
        .filter(collections::is_processing_backward.eq(false))
        .filter(collections::created_at_block.is_not_null())
        .filter(
            collections::first_processed_block
                .is_null()
                .or(collections::first_processed_block.gt(floor))
                .or(collections::target_block.is_not_null()),
        )
        .order(collections::first_processed_block.desc().nulls_first())
        .limit(limit)
        .select(CollectionDb::as_select())
        .load(conn)?;

    anyhow::Ok(rows)
}

/// Flags the still unclaimed rows among `addresses` as processing for
/// `direction` and returns them. Rows claimed concurrently by another worker
/// are left out.
pub fn claim(
    transaction_conn: &mut PgConnection,
    addresses: Vec<String>,
    direction: Direction,
    now: NaiveDateTime,
) -> anyhow::Result<Vec<CollectionDb>> {
    let targets = collections::table
        .filter(collections::contract_address.eq_any(addresses));

    let rows = match direction {
        Direction::Forward => diesel::update(
            targets.filter(collections::is_processing.eq(false)),
        )
        .set((
            collections::is_processing.eq(true),
            collections::sent_at.eq(now),
        ))
        .returning(CollectionDb::as_returning())
        .get_results(transaction_conn)?,
        Direction::Backward => diesel::update(
            targets.filter(collections::is_processing_backward.eq(false)),
        )
        .set((
            collections::is_processing_backward.eq(true),
            collections::sent_at.eq(now),
        ))
        .returning(CollectionDb::as_returning())
        .get_results(transaction_conn)?,
    };

    anyhow::Ok(rows)
}

/// Writes the progress of `commit` and releases its claim. Nothing is
/// written when the row is no longer held by that claim, i.e. it was
/// released as stale or re-claimed since. Returns the number of rows updated.
pub fn commit_progress(
    transaction_conn: &mut PgConnection,
    commit: CollectionCommit,
    direction: Direction,
    now: NaiveDateTime,
) -> anyhow::Result<usize> {
    let processed_block = height::to_db_opt(commit.processed_block)?;
    let target_block = commit.clear_target.then_some(None);
    let target = collections::table
        .find(commit.contract_address)
        .filter(collections::sent_at.is_not_distinct_from(commit.claimed_at));

    let updated = match direction {
        Direction::Forward => {
            diesel::update(target.filter(collections::is_processing.eq(true)))
                .set(ForwardProgressDb {
                    last_processed_block: processed_block,
                    target_block,
                    is_processing: false,
                    sent_at: now,
                })
                .execute(transaction_conn)?
        }
        Direction::Backward => diesel::update(
            target.filter(collections::is_processing_backward.eq(true)),
        )
        .set(BackwardProgressDb {
            first_processed_block: processed_block,
            target_block,
            is_processing_backward: false,
            sent_at: now,
        })
        .execute(transaction_conn)?,
    };

    anyhow::Ok(updated)
}

pub fn find_stale(
    conn: &mut PgConnection,
    direction: Direction,
    older_than: NaiveDateTime,
) -> anyhow::Result<Vec<String>> {
    let stale = collections::sent_at
        .lt(older_than)
        .or(collections::sent_at.is_null());

    let addresses = match direction {
        Direction::Forward => collections::table
            .filter(collections::is_processing.eq(true))
            .filter(stale)
            .select(collections::contract_address)
            .load(conn)?,
        Direction::Backward => collections::table
            .filter(collections::is_processing_backward.eq(true))
            .filter(stale)
            .select(collections::contract_address)
            .load(conn)?,
    };

    anyhow::Ok(addresses)
}

/// Releases the claims of `addresses` that are still stale as of
/// `older_than`. A row committed or re-claimed after it was found stale is
/// left alone.
pub fn reset_processing(
    transaction_conn: &mut PgConnection,
    addresses: Vec<String>,
    direction: Direction,
    older_than: NaiveDateTime,
) -> anyhow::Result<usize> {
    let targets = collections::table
        .filter(collections::contract_address.eq_any(addresses))
        .filter(
            collections::sent_at
                .lt(older_than)
                .or(collections::sent_at.is_null()),
        );

    let updated = match direction {
        Direction::Forward => diesel::update(
            targets.filter(collections::is_processing.eq(true)),
        )
        .set(collections::is_processing.eq(false))
        .execute(transaction_conn)?,
        Direction::Backward => diesel::update(
            targets.filter(collections::is_processing_backward.eq(true)),
        )
        .set(collections::is_processing_backward.eq(false))
        .execute(transaction_conn)?,
    };

    anyhow::Ok(updated)
}
