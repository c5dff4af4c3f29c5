//! CLI configuration management.

use clap::ValueEnum;
use gwcache_aws::BridgeConfig;
use gwcache_aws::invoker::DEFAULT_BRIDGE_URL;
use gwcache_stage::RetryPolicy;
use gwcache_stage::batch::MAX_OPERATIONS_PER_BATCH;
use gwcache_stage::retry::{DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Provider SDK bridge URL.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,
    /// Region used when neither the command line nor the manifest names one.
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub output_format: OutputFormat,
}

fn default_bridge_url() -> String {
    DEFAULT_BRIDGE_URL.to_string()
}

fn default_retry_base_delay_ms() -> u64 {
    u64::try_from(DEFAULT_BASE_DELAY.as_millis()).unwrap_or(500)
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_batch_size() -> usize {
    MAX_OPERATIONS_PER_BATCH
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            region: None,
            retry_base_delay_ms: default_retry_base_delay_ms(),
            max_attempts: default_max_attempts(),
            batch_size: default_batch_size(),
            output_format: OutputFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl CliConfig {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(serde_yaml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let dirs = directories::ProjectDirs::from("dev", "gwcache", "gwcache")
            .ok_or("Could not determine config directory")?;
        Ok(dirs.config_dir().join("config.yaml"))
    }

    /// Set a configuration value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "bridge_url" => self.bridge_url = value.to_string(),
            "region" => self.region = Some(value.to_string()),
            "retry_base_delay_ms" => self.retry_base_delay_ms = parse_number(key, value)?,
            "max_attempts" => {
                let attempts: u32 = parse_number(key, value)?;
                if attempts == 0 {
                    return Err("max_attempts must be at least 1".to_string());
                }
                self.max_attempts = attempts;
            }
            "batch_size" => {
                let size: usize = parse_number(key, value)?;
                if size == 0 || size > MAX_OPERATIONS_PER_BATCH {
                    return Err(format!("batch_size must be between 1 and {MAX_OPERATIONS_PER_BATCH}"));
                }
                self.batch_size = size;
            }
            "output_format" => {
                self.output_format = match value {
                    "json" => OutputFormat::Json,
                    "yaml" => OutputFormat::Yaml,
                    _ => return Err(format!("Invalid output format: {}", value)),
                };
            }
            _ => return Err(format!("Unknown config key: {}", key)),
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts).with_base_delay(Duration::from_millis(self.retry_base_delay_ms))
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig::new(self.bridge_url.clone())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid value for {}: {}", key, value))
}
