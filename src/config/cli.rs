//! Command-line flags.
//!
//! Flags override the config file; the file overrides built-in defaults.
//! Flag names follow the query node's own `-search.*` conventions.

use std::path::PathBuf;
use std::time::Duration;
use clap::Parser;

use crate::admission::duration::parse_duration;
use crate::config::loader::{read_config, ConfigError};
use crate::config::schema::{AppConfig, LogFormat};
use crate::config::validation::validate_config;

#[derive(Debug, Parser)]
#[command(name = "query-gate")]
#[command(about = "Admission gate for log query requests", long_about = None)]
pub struct CliArgs {
    /// Path to a TOML config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to accept query requests on.
    #[arg(long = "httpListenAddr")]
    pub http_listen_addr: Option<String>,

    /// Maximum number of concurrently executing queries.
    #[arg(long = "search.maxConcurrentRequests")]
    pub max_concurrent_requests: Option<usize>,

    /// Longest a request waits for execution once the concurrency limit is reached.
    #[arg(long = "search.maxQueueDuration", value_parser = parse_duration_flag)]
    pub max_queue_duration: Option<Duration>,

    /// Ceiling for query execution time.
    #[arg(long = "search.maxQueryDuration", value_parser = parse_duration_flag)]
    pub max_query_duration: Option<Duration>,

    /// Query node host:port.
    #[arg(long = "upstream")]
    pub upstream: Option<String>,

    /// Log level or filter directive.
    #[arg(long = "loggerLevel")]
    pub logger_level: Option<String>,

    /// Log output format.
    #[arg(long = "loggerFormat", value_enum)]
    pub logger_format: Option<LogFormat>,

    /// Address for the Prometheus metrics endpoint.
    #[arg(long = "metricsListenAddr")]
    pub metrics_listen_addr: Option<String>,
}

impl CliArgs {
    /// Read the config file (if any), apply flag overrides and validate.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => AppConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    /// Overwrite config values with any flags that were given.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(addr) = &self.http_listen_addr {
            config.listener.bind_address = addr.clone();
        }
        if let Some(n) = self.max_concurrent_requests {
            config.search.max_concurrent_requests = Some(n);
        }
        if let Some(d) = self.max_queue_duration {
            config.search.max_queue_duration_ms = duration_ms(d);
        }
        if let Some(d) = self.max_query_duration {
            config.search.max_query_duration_ms = duration_ms(d);
        }
        if let Some(upstream) = &self.upstream {
            config.upstream.address = upstream.clone();
        }
        if let Some(level) = &self.logger_level {
            config.observability.log_level = level.clone();
        }
        if let Some(format) = self.logger_format {
            config.observability.log_format = format;
        }
        if let Some(addr) = &self.metrics_listen_addr {
            config.observability.metrics_address = addr.clone();
        }
    }
}

fn parse_duration_flag(raw: &str) -> Result<Duration, String> {
    parse_duration(raw).ok_or_else(|| format!("invalid duration {raw:?}; use e.g. 500ms, 10s, 1m"))
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
