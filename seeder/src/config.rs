use shared::collection::CrawlSource;
use shared::log_config::LogConfig;

#[derive(clap::Parser)]
pub struct AppConfig {
    #[clap(long, env)]
    pub database_url: String,

    #[clap(long, env, default_value_t = 50)]
    pub total_collections: u64,

    #[clap(long, env, default_value_t = 10)]
    pub total_tasks: u64,

    #[clap(long, env, value_enum, default_value_t = CrawlSource::Monitor)]
    pub source: CrawlSource,

    #[clap(
        long,
        env,
        default_value_t = false,
        help = "Keep existing rows instead of wiping both tables first"
    )]
    pub keep_existing: bool,

    #[clap(flatten)]
    pub log: LogConfig,
}
