use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize as _, Deserializer};
use serde_derive::Deserialize;
use simplelog::LevelFilter;

use crate::error::Result;
use crate::utils::millis;


fn default_log_type() -> String { "console".to_string() }
fn default_log_level() -> LevelFilter { LevelFilter::Info }
fn default_log_file() -> String { "services-http.log".to_string() }
fn default_workers() -> usize { 4 }
fn default_connect_timeout_ms() -> u64 { 10_000 }
fn default_read_timeout_ms() -> u64 { 300_000 }

/// Level names as `log` spells them, in any case: `off`, `Info`, `DEBUG`...
fn deserialize_level<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<LevelFilter, D::Error> {
    let name = String::deserialize(deserializer)?;
    LevelFilter::from_str(name.trim()).map_err(serde::de::Error::custom)
}


#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// `console` or `file`
    #[serde(default = "default_log_type")]
    pub log_type: String,

    #[serde(default = "default_log_level", deserialize_with = "deserialize_level")]
    pub log_level: LevelFilter,

    /// Used only when `log_type` is `file`
    #[serde(default = "default_log_file")]
    pub log_file: String,

    #[serde(default)]
    pub executor: ExecutorConfig,
}

/// Worker pool size and transport settings for an `Executor`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Upper bound for the whole exchange, body included.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Config> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?
            .try_deserialize::<Config>()?;
        Ok(cfg)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_type: default_log_type(),
            log_level: default_log_level(),
            log_file: default_log_file(),
            executor: ExecutorConfig::default(),
        }
    }
}

impl ExecutorConfig {
    pub fn connect_timeout(&self) -> Duration { millis(self.connect_timeout_ms) }
    pub fn read_timeout(&self) -> Duration { millis(self.read_timeout_ms) }

    /// Number of pool threads, never zero.
    pub fn worker_count(&self) -> usize { self.workers.max(1) }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            workers: default_workers(),
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            user_agent: None,
        }
    }
}
