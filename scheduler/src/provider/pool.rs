use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use shared::block::BlockHeight;
use shared::error::{AsRpcError, Fatal, MainError};
use tokio::sync::Mutex;

use super::{ChainHead, HeightSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Disconnected,
    Connected(usize),
}

/// Ordered set of block height providers with a single active one.
///
/// Providers are probed in configuration order, starting right after a given
/// position and wrapping around, and the first one answering within the probe
/// timeout becomes active. When the active provider fails a query the pool
/// rotates to the next healthy one and retries the query once. Running out of
/// healthy providers is [`Fatal::NoHealthyProvider`].
pub struct ProviderPool {
    providers: Vec<Arc<dyn HeightSource>>,
    probe_timeout: Duration,
    state: Mutex<PoolState>,
}

impl ProviderPool {
    pub fn new(
        providers: Vec<Arc<dyn HeightSource>>,
        probe_timeout: Duration,
    ) -> anyhow::Result<Self> {
        if providers.is_empty() {
            return Err(anyhow!("At least one RPC provider is required"));
        }

        Ok(Self {
            providers,
            probe_timeout,
            state: Mutex::new(PoolState::Disconnected),
        })
    }

    pub async fn state(&self) -> PoolState {
        *self.state.lock().await
    }

    /// Scans for a healthy provider starting right after `start_after`, or
    /// from the first one when `None`.
    pub async fn connect(
        &self,
        start_after: Option<usize>,
    ) -> Result<usize, Fatal> {
        let mut state = self.state.lock().await;
        self.scan(&mut state, start_after).await
    }

    /// Scans again starting after the currently active provider.
    pub async fn reconnect(&self) -> Result<usize, Fatal> {
        let mut state = self.state.lock().await;
        let start_after = match *state {
            PoolState::Connected(index) => Some(index),
            PoolState::Disconnected => None,
        };
        self.scan(&mut state, start_after).await
    }

    /// Goes back to the highest priority provider that is healthy.
    pub async fn reset(&self) -> Result<usize, Fatal> {
        tracing::info!("Resetting RPC provider selection");
        self.connect(None).await
    }

    pub async fn block_height(&self) -> Result<BlockHeight, MainError> {
        let mut state = self.state.lock().await;

        let index = match *state {
            PoolState::Connected(index) => index,
            PoolState::Disconnected => self.scan(&mut state, None).await?,
        };

        match self.probe(index).await {
            Ok(height) => return Ok(height),
            Err(reason) => tracing::warn!(
                provider = self.providers[index].name(),
                %reason,
                "Active RPC provider failed, rotating"
            ),
        }

        let index = self.scan(&mut state, Some(index)).await?;
        self.probe(index).await.into_rpc_error()
    }

    async fn scan(
        &self,
        state: &mut PoolState,
        start_after: Option<usize>,
    ) -> Result<usize, Fatal> {
        let total = self.providers.len();
        let first = start_after.map(|index| index + 1).unwrap_or(0);

        for offset in 0..total {
            let index = (first + offset) % total;
            let provider = &self.providers[index];

            match self.probe(index).await {
                Ok(height) => {
                    tracing::info!(
                        provider = provider.name(),
                        height,
                        "Connected to RPC provider"
                    );
                    *state = PoolState::Connected(index);
                    return Ok(index);
                }
                Err(reason) => tracing::warn!(
                    provider = provider.name(),
                    %reason,
                    "RPC provider is unhealthy"
                ),
            }
        }

        tracing::error!(providers = total, "No healthy RPC provider left");
        *state = PoolState::Disconnected;
        Err(Fatal::NoHealthyProvider { providers: total })
    }

    async fn probe(&self, index: usize) -> anyhow::Result<BlockHeight> {
        tokio::time::timeout(
            self.probe_timeout,
            self.providers[index].block_number(),
        )
        .await
        .map_err(|_| anyhow!("timed out after {:?}", self.probe_timeout))?
    }
}

#[async_trait]
impl ChainHead for ProviderPool {
    async fn block_height(&self) -> Result<BlockHeight, MainError> {
        ProviderPool::block_height(self).await
    }
}
