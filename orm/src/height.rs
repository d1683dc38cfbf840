use anyhow::Context;
use shared::block::BlockHeight;

/// Block heights are stored as `bigint`.
pub fn to_db(height: BlockHeight) -> anyhow::Result<i64> {
    i64::try_from(height)
        .with_context(|| format!("Block height {height} does not fit a bigint"))
}

pub fn from_db(height: i64) -> anyhow::Result<BlockHeight> {
    BlockHeight::try_from(height)
        .with_context(|| format!("Invalid block height {height} in database"))
}

pub fn to_db_opt(height: Option<BlockHeight>) -> anyhow::Result<Option<i64>> {
    height.map(to_db).transpose()
}

pub fn from_db_opt(height: Option<i64>) -> anyhow::Result<Option<BlockHeight>> {
    height.map(from_db).transpose()
}
