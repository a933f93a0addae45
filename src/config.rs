use crate::dates;
use anyhow::{anyhow, bail};
use chrono::NaiveDate;
use clap::Parser;
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080/api";

/// rollcalld: attendance draft sidecar speaking line-delimited JSON on stdin/stdout
#[derive(Debug, Clone, Parser)]
#[command(name = "rollcalld")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Base URL of the attendance REST API
    #[arg(long, env = "ROLLCALL_BACKEND_URL", default_value = DEFAULT_BACKEND_URL)]
    pub backend_url: String,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "ROLLCALL_TIMEOUT_MS", default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// How long a settled save keeps suppressing repeat saves, in milliseconds
    #[arg(long, env = "ROLLCALL_SUBMIT_GRACE_MS", default_value_t = 500)]
    pub submit_grace_ms: u64,

    /// Log filter used when RUST_LOG is unset (logs go to stderr)
    #[arg(long, env = "ROLLCALL_LOG", default_value = "info")]
    pub log_level: String,

    /// Date treated as "today" (YYYY-MM-DD); defaults to the local date
    #[arg(long, value_parser = dates::parse_date)]
    pub today: Option<NaiveDate>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            timeout_ms: 10_000,
            submit_grace_ms: 500,
            log_level: "info".to_string(),
            today: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = self.backend_url.trim();
        if url.is_empty() {
            bail!("backend URL must not be empty");
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(anyhow!(
                "backend URL must start with http:// or https://, got {}",
                url
            ));
        }
        if self.timeout_ms == 0 {
            bail!("timeout must be greater than zero");
        }
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.backend_url.trim().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn submit_grace(&self) -> Duration {
        Duration::from_millis(self.submit_grace_ms)
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(dates::today)
    }
}
