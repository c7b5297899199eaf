//! Configuration management with TOML, environment variables, and CLI overrides.

use crate::marketplace::regions::RegionKey;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Interface the HTTP server binds to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the HTTP server listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seller id used for listing-restriction lookups
    #[serde(default)]
    pub seller_id: Option<String>,

    /// Default number of remote calls in flight per batch (clamped to 1..=20)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Maximum number of ASINs accepted per batch
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,

    /// Attempts per remote call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff delay in milliseconds, doubled per attempt
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Default listing condition for restriction lookups
    #[serde(default = "default_condition_type")]
    pub condition_type: String,

    /// Default item condition for offer lookups
    #[serde(default = "default_item_condition")]
    pub item_condition: String,

    /// Output format for CLI scans
    #[serde(default)]
    pub format: OutputFormat,

    /// Base URL overrides keyed by region key (`na`, `eu`, `fe-jp`, ...)
    #[serde(default)]
    pub endpoints: HashMap<String, String>,

    /// Static access tokens keyed by region key
    #[serde(default)]
    pub access_tokens: HashMap<String, String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_concurrency() -> usize {
    10
}

fn default_max_batch() -> usize {
    100
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    300
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_condition_type() -> String {
    "new_new".to_string()
}

fn default_item_condition() -> String {
    "New".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            seller_id: None,
            concurrency: default_concurrency(),
            max_batch: default_max_batch(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            timeout_secs: default_timeout_secs(),
            condition_type: default_condition_type(),
            item_condition: default_item_condition(),
            format: OutputFormat::Json,
            endpoints: HashMap::new(),
            access_tokens: HashMap::new(),
        }
    }
}

impl Config {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads configuration with fallback to default locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        let local_config = Path::new("config.toml");
        if local_config.exists() {
            debug!("Found config.toml in current directory");
            return Self::from_file(local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("catalog-fanout").join("config.toml");
            if xdg_config.exists() {
                debug!("Found config in XDG config directory");
                return Self::from_file(xdg_config);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Applies environment variable overrides. Unparseable values are ignored.
    pub fn with_env(mut self) -> Self {
        if let Ok(host) = std::env::var("FANOUT_HOST") {
            self.host = host;
        }

        if let Ok(port) = std::env::var("PORT") {
            if let Ok(p) = port.parse() {
                self.port = p;
            }
        }

        if let Ok(seller) = std::env::var("FANOUT_SELLER_ID") {
            self.seller_id = Some(seller);
        }

        if let Ok(conc) = std::env::var("FANOUT_CONCURRENCY") {
            if let Ok(c) = conc.parse() {
                self.concurrency = c;
            }
        }

        if let Ok(attempts) = std::env::var("FANOUT_MAX_ATTEMPTS") {
            if let Ok(a) = attempts.parse() {
                self.max_attempts = a;
            }
        }

        if let Ok(delay) = std::env::var("FANOUT_BASE_DELAY_MS") {
            if let Ok(d) = delay.parse() {
                self.base_delay_ms = d;
            }
        }

        self
    }

    /// Address string for the HTTP listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL override for a region, if configured.
    pub fn endpoint_for(&self, key: RegionKey) -> Option<String> {
        self.endpoints.get(&key.to_string()).cloned()
    }

    /// Access token for a region. A profile-specific entry (`fe-jp`) wins over
    /// the region-wide one (`fe`).
    pub fn access_token_for(&self, key: RegionKey) -> Option<String> {
        self.access_tokens
            .get(&key.to_string())
            .or_else(|| self.access_tokens.get(&key.region.to_string()))
            .cloned()
    }
}

/// Output format for CLI scan results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Table,
    #[default]
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use: table, json, csv", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}
