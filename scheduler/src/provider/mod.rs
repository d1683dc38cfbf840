pub mod json_rpc;
pub mod pool;

use async_trait::async_trait;
use shared::block::BlockHeight;
use shared::error::MainError;

pub use json_rpc::JsonRpcProvider;
pub use pool::{PoolState, ProviderPool};

/// A single upstream able to report the latest block number.
#[async_trait]
pub trait HeightSource: Send + Sync {
    fn name(&self) -> &str;

    async fn block_number(&self) -> anyhow::Result<BlockHeight>;
}

/// Where the forward crawl reads its ceiling from.
#[async_trait]
pub trait ChainHead: Send + Sync {
    async fn block_height(&self) -> Result<BlockHeight, MainError>;
}
