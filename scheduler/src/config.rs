use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use reqwest::Url;
use shared::block::BlockHeight;
use shared::collection::CrawlSource;
use shared::log_config::LogConfig;

use crate::crawl::CrawlSettings;

#[derive(clap::ValueEnum, Clone, Debug, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Sepolia,
    Holesky,
}

impl Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format!("{:?}", self).to_lowercase())
    }
}

/// One JSON-RPC endpoint, written either as `name=url` or as a bare url, in
/// which case the host doubles as the name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderConfig {
    pub name: String,
    pub url: Url,
}

impl FromStr for ProviderConfig {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, url) = match s.split_once('=') {
            Some((name, url)) if !name.contains("://") => {
                (Some(name.trim().to_string()), url.trim())
            }
            _ => (None, s),
        };

        let url = Url::parse(url)
            .with_context(|| format!("Invalid RPC provider url: {}", url))?;
        let name = match name {
            Some(name) if !name.is_empty() => name,
            _ => url
                .host_str()
                .map(str::to_string)
                .unwrap_or_else(|| url.to_string()),
        };

        Ok(Self { name, url })
    }
}

pub fn parse_duration(s: &str) -> Result<Duration, String> {
    duration_str::parse(s).map_err(|e| e.to_string())
}

fn parse_provider(s: &str) -> Result<ProviderConfig, String> {
    s.parse::<ProviderConfig>().map_err(|e| format!("{:#}", e))
}

#[derive(clap::Parser, Clone)]
pub struct AppConfig {
    #[clap(long, env)]
    pub database_url: String,

    #[clap(long, env, help = "Redis url of the dispatch queue")]
    pub queue_url: String,

    #[clap(long, env, default_value = "nft-collection-tasks")]
    pub queue_name: String,

    #[clap(
        long,
        env,
        default_value = "5m",
        value_parser = parse_duration,
        help = "How long a deduplication id suppresses repeated sends"
    )]
    pub dedup_window: Duration,

    #[clap(
        long,
        env,
        value_delimiter = ',',
        value_parser = parse_provider,
        help = "Comma separated RPC providers in priority order, `name=url` or `url`"
    )]
    pub rpc_providers: Vec<ProviderConfig>,

    #[clap(long, env, value_enum, default_value_t = Network::Mainnet)]
    pub network: Network,

    #[clap(long, env, default_value = "3s", value_parser = parse_duration)]
    pub probe_timeout: Duration,

    #[clap(long, env, default_value = "24h", value_parser = parse_duration)]
    pub provider_reset_interval: Duration,

    #[clap(long, env, value_enum, default_value_t = CrawlSource::Monitor)]
    pub source: CrawlSource,

    #[clap(long, env, default_value_t = false)]
    pub vip: bool,

    #[clap(long, env, default_value_t = 10)]
    pub query_limit: i64,

    #[clap(
        long,
        env = "BLOCKS_INTERVAL",
        help = "Blocks covered by one dispatched message"
    )]
    pub block_interval: u64,

    #[clap(
        long,
        env = "MESSAGES_PER_PROCESS",
        help = "Messages dispatched per collection and tick"
    )]
    pub messages_per_process: u64,

    #[clap(
        long,
        env = "END_BLOCK",
        help = "Static forward ceiling, the chain head is used when unset"
    )]
    pub end_block: Option<BlockHeight>,

    #[clap(long, env, default_value_t = 0)]
    pub floor_block: BlockHeight,

    #[clap(long, env, default_value = "5s", value_parser = parse_duration)]
    pub crawl_interval: Duration,

    #[clap(long, env, default_value = "5s", value_parser = parse_duration)]
    pub split_interval: Duration,

    #[clap(long, env, default_value = "30s", value_parser = parse_duration)]
    pub reconcile_interval: Duration,

    #[clap(
        long,
        env,
        value_parser = parse_duration,
        help = "Age after which a claimed collection is released"
    )]
    pub stale_after: Duration,

    #[clap(
        long,
        env,
        help = "Consecutive skipped ticks tolerated before giving up"
    )]
    pub skip_limit: u32,

    #[clap(flatten)]
    pub log: LogConfig,
}

impl AppConfig {
    /// Only a forward crawl without a static ceiling asks the chain for its
    /// head.
    pub fn follows_chain_head(&self) -> bool {
        self.source == CrawlSource::Monitor && self.end_block.is_none()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.block_interval == 0 {
            anyhow::bail!("BLOCKS_INTERVAL must be greater than zero");
        }
        if self.messages_per_process == 0 {
            anyhow::bail!("MESSAGES_PER_PROCESS must be greater than zero");
        }
        if self.query_limit <= 0 {
            anyhow::bail!("QUERY_LIMIT must be greater than zero");
        }
        if self.follows_chain_head() && self.rpc_providers.is_empty() {
            anyhow::bail!(
                "RPC_PROVIDERS is required for a monitor crawl without \
                 END_BLOCK"
            );
        }
        Ok(())
    }

    pub fn crawl_settings(&self) -> CrawlSettings {
        CrawlSettings {
            source: self.source,
            vip: self.vip,
            query_limit: self.query_limit,
            block_interval: self.block_interval,
            messages_per_process: self.messages_per_process,
            end_block: self.end_block,
            floor_block: self.floor_block,
            stale_after: self.stale_after,
        }
    }
}
