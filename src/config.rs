//! Configuration for the boost-pow binary
//!
//! Supports configuration via command line arguments, environment variables,
//! and configuration files (YAML/JSON). The library itself only consumes
//! [`BackendSettings`], built by [`Config::backend_settings`].

use crate::backend::BackendSettings;
use crate::crypto::Sha256dHasher;
use crate::{Address, Error, Result, Target};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
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

/// Log output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line human readable output
    Compact,
    /// Multi-line human readable output
    Pretty,
    /// Newline-delimited JSON
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Compact => write!(f, "compact"),
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Complete configuration for the boost-pow binary
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(
    name = "boost-pow",
    version = env!("CARGO_PKG_VERSION"),
    about = "Boost proof of work tools",
    long_about = "Decode Boost scripts, compute target difficulty and solve Boost puzzles on the CPU"
)]
pub struct Config {
    /// Print program info and exit
    #[arg(long)]
    #[serde(skip)]
    pub info: bool,

    /// Print the parsed configuration and exit
    #[arg(long)]
    #[serde(skip)]
    pub print_config: bool,

    /// Configuration file path (YAML or JSON)
    #[arg(long, value_name = "FILE", env = "BOOST_POW_CONFIG")]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    /// Log level
    #[arg(short = 'l', long, default_value = "info", env = "BOOST_POW_LOG_LEVEL")]
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long, default_value = "compact", env = "BOOST_POW_LOG_FORMAT")]
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    /// How long the contract queue should take to drain
    #[arg(long, default_value = "10m")]
    #[serde(default = "default_contract_queue_time")]
    pub contract_queue_time: String,

    /// Most jobs worked at once
    #[arg(long, default_value = "64")]
    #[serde(default = "default_max_in_progress")]
    pub max_in_progress: usize,

    /// Most total difficulty worked at once
    #[arg(long, default_value = "1000000")]
    #[serde(default = "default_max_in_progress_difficulty")]
    pub max_in_progress_difficulty: f64,

    /// Jobs expected to be solved faster than this are not split across workers
    #[arg(long, default_value = "30s")]
    #[serde(default = "default_min_solve_time")]
    pub min_solve_time: String,

    /// Cost in satoshis of mining one unit of difficulty
    #[arg(long, default_value = "0")]
    #[serde(default)]
    pub cost_per_difficulty: f64,

    /// Fixed cost in satoshis of redeeming a bounty
    #[arg(long, default_value = "1")]
    #[serde(default = "default_constant_cost")]
    pub constant_cost: f64,

    /// Decode a hex Boost output script and exit
    #[arg(long, value_name = "HEX")]
    #[serde(skip)]
    pub decode_output: Option<String>,

    /// Decode a hex Boost input script and exit
    #[arg(long, value_name = "HEX")]
    #[serde(skip)]
    pub decode_input: Option<String>,

    /// Print the difficulty of a compact target and exit
    #[arg(long, value_name = "TARGET_HEX")]
    #[serde(skip)]
    pub difficulty: Option<String>,

    /// Solve a hex Boost output script on the CPU and exit
    #[arg(long, value_name = "HEX", requires = "miner_address")]
    #[serde(skip)]
    pub solve: Option<String>,

    /// Miner address (hex hash160) to solve for
    #[arg(long, value_name = "HEX")]
    pub miner_address: Option<String>,

    /// Nonces to try per extra nonce when solving
    #[arg(long, default_value = "4294967296")]
    #[serde(default = "default_solve_nonces")]
    pub solve_nonces: u64,
}

impl Config {
    /// Parse the command line, then merge the config file if one is given
    pub async fn load() -> Result<Self> {
        let mut config = Self::parse();

        if let Some(config_file) = &config.config_file {
            let file_config = Self::load_from_file(config_file).await?;
            config = config.merge_with_file(file_config)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;

        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&content).map_err(Error::from)
        } else {
            serde_yaml::from_str(&content).map_err(Error::from)
        }
    }

    /// Merge CLI config with file config
    ///
    /// A value given on the command line wins; where the command line left
    /// the default in place, the file's value is used.
    pub fn merge_with_file(mut self, file: Self) -> Result<Self> {
        if self.log_level == default_log_level() {
            self.log_level = file.log_level;
        }
        if self.log_format == default_log_format() {
            self.log_format = file.log_format;
        }
        if self.contract_queue_time == default_contract_queue_time() {
            self.contract_queue_time = file.contract_queue_time;
        }
        if self.max_in_progress == default_max_in_progress() {
            self.max_in_progress = file.max_in_progress;
        }
        if self.max_in_progress_difficulty == default_max_in_progress_difficulty() {
            self.max_in_progress_difficulty = file.max_in_progress_difficulty;
        }
        if self.min_solve_time == default_min_solve_time() {
            self.min_solve_time = file.min_solve_time;
        }
        if self.cost_per_difficulty == 0.0 {
            self.cost_per_difficulty = file.cost_per_difficulty;
        }
        if self.constant_cost == default_constant_cost() {
            self.constant_cost = file.constant_cost;
        }
        if self.miner_address.is_none() {
            self.miner_address = file.miner_address;
        }
        if self.solve_nonces == default_solve_nonces() {
            self.solve_nonces = file.solve_nonces;
        }
        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.contract_queue_time()?;
        self.min_solve_time()?;

        if self.max_in_progress == 0 {
            return Err(Error::config("max_in_progress must be greater than 0"));
        }

        if self.max_in_progress_difficulty.is_nan() || self.max_in_progress_difficulty <= 0.0 {
            return Err(Error::config("max_in_progress_difficulty must be positive"));
        }

        let negative = |cost: f64| cost.is_nan() || cost < 0.0;
        if negative(self.cost_per_difficulty) || negative(self.constant_cost) {
            return Err(Error::config("Costs must not be negative"));
        }

        if self.cost_per_difficulty == 0.0 && self.constant_cost == 0.0 {
            return Err(Error::config(
                "At least one of cost_per_difficulty and constant_cost must be positive",
            ));
        }

        if self.solve_nonces == 0 || self.solve_nonces > Sha256dHasher::NONCE_SPACE {
            return Err(Error::config(format!(
                "solve_nonces must be between 1 and {}",
                Sha256dHasher::NONCE_SPACE
            )));
        }

        if let Some(target) = &self.difficulty {
            Target::from_str(target)?;
        }

        self.miner_address()?;

        Ok(())
    }

    pub fn contract_queue_time(&self) -> Result<Duration> {
        parse_duration("contract_queue_time", &self.contract_queue_time)
    }

    pub fn min_solve_time(&self) -> Result<Duration> {
        parse_duration("min_solve_time", &self.min_solve_time)
    }

    /// Parsed miner address, if one was given
    pub fn miner_address(&self) -> Result<Option<Address>> {
        self.miner_address
            .as_deref()
            .map(|s| Address::from_str(s.trim_start_matches("0x")))
            .transpose()
            .map_err(|e| Error::config(format!("Invalid miner address: {}", e)))
    }

    /// Settings for the economic backend
    pub fn backend_settings(&self) -> Result<BackendSettings> {
        Ok(BackendSettings {
            contract_queue_time: self.contract_queue_time()?,
            max_in_progress: self.max_in_progress,
            max_in_progress_difficulty: self.max_in_progress_difficulty,
            min_solve_time: self.min_solve_time()?,
            cost_per_difficulty: self.cost_per_difficulty,
            constant_cost: self.constant_cost,
        })
    }
}

fn parse_duration(name: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value)
        .map_err(|e| Error::config(format!("Invalid {} '{}': {}", name, value, e)))
}

// Default value functions for serde
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_log_format() -> LogFormat { LogFormat::Compact }
fn default_contract_queue_time() -> String { "10m".to_string() }
fn default_max_in_progress() -> usize { 64 }
fn default_max_in_progress_difficulty() -> f64 { 1_000_000.0 }
fn default_min_solve_time() -> String { "30s".to_string() }
fn default_constant_cost() -> f64 { 1.0 }
fn default_solve_nonces() -> u64 { Sha256dHasher::NONCE_SPACE }
