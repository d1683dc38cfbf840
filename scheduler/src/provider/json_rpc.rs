use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use shared::block::BlockHeight;

use super::HeightSource;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Clone, Debug)]
pub struct JsonRpcProvider {
    name: String,
    url: Url,
    client: reqwest::Client,
}

impl JsonRpcProvider {
    pub fn new(name: impl Into<String>, url: Url) -> Self {
        Self {
            name: name.into(),
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl HeightSource for JsonRpcProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn block_number(&self) -> anyhow::Result<BlockHeight> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_blockNumber",
            "params": [],
        });

        let response: RpcResponse = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to reach provider {}", self.name))?
            .error_for_status()
            .with_context(|| format!("Provider {} rejected the call", self.name))?
            .json()
            .await
            .with_context(|| {
                format!("Invalid JSON-RPC response from {}", self.name)
            })?;

        if let Some(error) = response.error {
            return Err(anyhow!(
                "Provider {} answered with error {}: {}",
                self.name,
                error.code,
                error.message
            ));
        }

        let result = response
            .result
            .ok_or_else(|| anyhow!("Provider {} returned no block", self.name))?;

        parse_quantity(&result)
    }
}

fn parse_quantity(quantity: &str) -> anyhow::Result<BlockHeight> {
    let digits = quantity
        .strip_prefix("0x")
        .ok_or_else(|| anyhow!("Block number {} is not hex encoded", quantity))?;

    BlockHeight::from_str_radix(digits, 16)
        .with_context(|| format!("Invalid block number {}", quantity))
}
