//! Store configuration via `runstore.toml`
//!
//! A missing file means defaults. To change settings, edit the file and
//! reopen the store.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use runstore_core::{Error, Result};

use super::transactions::RetryConfig;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "runstore.toml";

/// Store configuration loaded from `runstore.toml`
///
/// # Example
///
/// ```toml
/// transaction_timeout_secs = 30
/// scan_budget_divisor = 2
///
/// [retry]
/// max_retries = 3
/// base_delay_ms = 10
/// max_delay_ms = 100
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Transactions running longer than this are aborted at commit
    #[serde(default = "default_transaction_timeout_secs")]
    pub transaction_timeout_secs: u64,
    /// Each range-scan batch may use `timeout / divisor` of wall-clock time
    #[serde(default = "default_scan_budget_divisor")]
    pub scan_budget_divisor: u32,
    /// Retry policy for operations that retry on conflict
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_transaction_timeout_secs() -> u64 {
    30
}

fn default_scan_budget_divisor() -> u32 {
    2
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            transaction_timeout_secs: default_transaction_timeout_secs(),
            scan_budget_divisor: default_scan_budget_divisor(),
            retry: RetryConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Transaction timeout as a `Duration`
    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_secs(self.transaction_timeout_secs)
    }

    /// Wall-clock budget for one range-scan batch
    pub fn scan_budget(&self) -> Duration {
        self.transaction_timeout() / self.scan_budget_divisor.max(1)
    }

    /// Reject values that would make every transaction or scan fail
    pub fn validate(&self) -> Result<()> {
        if self.transaction_timeout_secs == 0 {
            return Err(Error::invalid_input(
                "transaction_timeout_secs must be greater than 0",
            ));
        }
        if self.scan_budget_divisor == 0 {
            return Err(Error::invalid_input("scan_budget_divisor must be greater than 0"));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# runstore configuration
#
# Transactions running longer than this many seconds are aborted at commit.
transaction_timeout_secs = 30

# Range scans over run records are split into batches; each batch may use
# transaction_timeout / scan_budget_divisor of wall-clock time.
scan_budget_divisor = 2

# Retry policy for lifecycle transitions that lose an optimistic race.
[retry]
max_retries = 3
base_delay_ms = 10
max_delay_ms = 100
"#
    }

    /// Parse config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
