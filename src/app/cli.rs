use crate::client::{DEFAULT_API_ENDPOINT, SearchParams, SortOrder};
use crate::config::{ConfigError, LoggerConfig};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "gt8004", author, version, about, long_about = None)]
pub struct Cli {
    /// Log level for the CLI itself
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read NDJSON log entries and deliver them to the ingest endpoint
    Ship(ShipArgs),
    /// Search the agent marketplace
    Search(SearchArgs),
    /// Snapshot statistics for an agent
    Stats {
        agent_id: String,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Performance report for an agent
    Performance {
        agent_id: String,
        /// Report window, e.g. 1h, 24h, 7d
        #[arg(long, default_value = crate::client::DEFAULT_PERFORMANCE_WINDOW)]
        window: String,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Recent request logs for an agent
    Logs {
        agent_id: String,
        #[arg(long, default_value_t = crate::client::DEFAULT_LOG_LIMIT)]
        limit: u32,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Benchmark rankings for a category
    Benchmark {
        category: String,
        #[command(flatten)]
        api: ApiArgs,
    },
}

/// Connection settings for the platform API.
#[derive(Args, Debug, Clone)]
pub struct ApiArgs {
    /// Platform API base URL
    #[arg(long, env = "GT8004_API_ENDPOINT", default_value = DEFAULT_API_ENDPOINT)]
    pub api_endpoint: String,

    /// Bearer credential
    #[arg(long, env = "GT8004_API_KEY", default_value = "", hide_env_values = true)]
    pub api_key: String,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub protocol: Option<String>,
    #[arg(long)]
    pub min_reputation: Option<f64>,
    #[arg(long, value_enum)]
    pub sort: Option<SortArg>,
    #[command(flatten)]
    pub api: ApiArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    Reputation,
    Requests,
    Revenue,
    ResponseTime,
    Newest,
}

impl From<SortArg> for SortOrder {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::Reputation => SortOrder::Reputation,
            SortArg::Requests => SortOrder::Requests,
            SortArg::Revenue => SortOrder::Revenue,
            SortArg::ResponseTime => SortOrder::ResponseTime,
            SortArg::Newest => SortOrder::Newest,
        }
    }
}

impl SearchArgs {
    pub fn params(&self) -> SearchParams {
        SearchParams {
            category: self.category.clone(),
            protocol: self.protocol.clone(),
            min_reputation: self.min_reputation,
            sort: self.sort.map(SortOrder::from),
        }
    }
}

/// Settings for `ship`. Flags win over the environment, which wins over the
/// config file.
#[derive(Args, Debug, Clone, Default)]
pub struct ShipArgs {
    /// TOML file with logger settings
    #[arg(long, env = "GT8004_CONFIG")]
    pub config: Option<PathBuf>,

    /// NDJSON input file; stdin when omitted
    #[arg(long)]
    pub input: Option<PathBuf>,

    #[arg(long)]
    pub agent_id: Option<String>,

    #[arg(long)]
    pub api_key: Option<String>,

    /// Ingest endpoint URL
    #[arg(long)]
    pub endpoint: Option<String>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    #[arg(long)]
    pub flush_interval_ms: Option<u64>,

    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Log every delivery, retry and drop
    #[arg(long)]
    pub debug: bool,
}

impl ShipArgs {
    /// Resolves the logger configuration from file, `lookup` and flags.
    pub fn logger_config<F>(&self, lookup: F) -> Result<LoggerConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = match &self.config {
            Some(path) => LoggerConfig::from_file(path)?,
            None => LoggerConfig::default(),
        };
        let mut config = base.merge_env_with(lookup)?;

        if let Some(agent_id) = &self.agent_id {
            config.agent_id = agent_id.clone();
        }
        if let Some(api_key) = &self.api_key {
            config.api_key = api_key.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(ms) = self.flush_interval_ms {
            config.flush_interval = Duration::from_millis(ms);
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if self.debug {
            config.debug = true;
        }

        config.validate()?;
        Ok(config)
    }
}
