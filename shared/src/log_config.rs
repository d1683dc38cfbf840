use core::fmt;
use std::fmt::Display;

use clap_verbosity_flag::{InfoLevel, LevelFilter, Verbosity};
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(clap::ValueEnum, Clone, Debug, Copy)]
pub enum LogFormat {
    Json,
    Text,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", format!("{:?}", self).to_lowercase())
    }
}

#[derive(clap::Parser, Clone)]
pub struct LogConfig {
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    #[clap(long, env, default_value_t = LogFormat::Text, help = "Logging format")]
    pub log_format: LogFormat,

    #[clap(
        long,
        env,
        help = "Extra tracing directives, e.g. `scheduler=debug,diesel=warn`"
    )]
    pub log_directives: Option<String>,
}

impl LogConfig {
    pub fn level(&self) -> Option<Level> {
        match self.verbosity.log_level_filter() {
            LevelFilter::Off => None,
            LevelFilter::Error => Some(Level::ERROR),
            LevelFilter::Warn => Some(Level::WARN),
            LevelFilter::Info => Some(Level::INFO),
            LevelFilter::Debug => Some(Level::DEBUG),
            LevelFilter::Trace => Some(Level::TRACE),
        }
    }

    /// Filter for `log_level` plus the extra directives. Directives that do
    /// not parse are returned alongside.
    fn env_filter(&self, log_level: Level) -> (EnvFilter, Vec<String>) {
        let mut filter = EnvFilter::new(log_level.to_string());
        let mut rejected = vec![];
        for directive in self
            .log_directives
            .iter()
            .flat_map(|directives| directives.split(','))
            .map(str::trim)
            .filter(|directive| !directive.is_empty())
        {
            match directive.parse() {
                Ok(parsed) => filter = filter.add_directive(parsed),
                Err(_) => rejected.push(directive.to_string()),
            }
        }

        (filter, rejected)
    }

    pub fn init(&self) {
        let Some(log_level) = self.level() else {
            return;
        };

        let (filter, rejected) = self.env_filter(log_level);

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true);

        match self.log_format {
            LogFormat::Text => subscriber.init(),
            LogFormat::Json => subscriber.json().flatten_event(true).init(),
        };

        for directive in rejected {
            tracing::warn!(directive, "Ignoring invalid log directive");
        }
    }
}
