//! Registry configuration (flags or environment)

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use log::LevelFilter;

use crate::error::{RegistryError, Result};

pub const DEFAULT_RECONCILIATION_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_PUSH_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8090";

/// Central DLP policy registry
#[derive(Debug, Clone, Parser)]
#[command(name = "dlp-policy-registry", version, about)]
pub struct RegistryConfig {
    /// How often the scheduler sweeps all agents, in milliseconds
    #[arg(
        long,
        env = "DLP_RECONCILIATION_INTERVAL_MS",
        default_value_t = DEFAULT_RECONCILIATION_INTERVAL_MS
    )]
    pub reconciliation_interval_ms: u64,

    /// Per-push network timeout, in milliseconds
    #[arg(long, env = "DLP_PUSH_TIMEOUT_MS", default_value_t = DEFAULT_PUSH_TIMEOUT_MS)]
    pub push_timeout_ms: u64,

    /// Keep path case when normalizing (for case-sensitive filesystems)
    #[arg(long, env = "DLP_CASE_SENSITIVE_PATHS")]
    pub case_sensitive_paths: bool,

    /// Address the admin API listens on
    #[arg(long = "bind", env = "DLP_BIND_ADDRESS", default_value = DEFAULT_BIND_ADDRESS)]
    pub bind_address: SocketAddr,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "DLP_LOG_LEVEL", default_value = "info")]
    pub log_level: LevelFilter,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            reconciliation_interval_ms: DEFAULT_RECONCILIATION_INTERVAL_MS,
            push_timeout_ms: DEFAULT_PUSH_TIMEOUT_MS,
            case_sensitive_paths: false,
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8090)),
            log_level: LevelFilter::Info,
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.reconciliation_interval_ms == 0 {
            return Err(RegistryError::InvalidArgument(
                "reconciliation interval must be greater than zero".to_string(),
            ));
        }
        if self.push_timeout_ms == 0 {
            return Err(RegistryError::InvalidArgument(
                "push timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn reconciliation_interval(&self) -> Duration {
        Duration::from_millis(self.reconciliation_interval_ms)
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_millis(self.push_timeout_ms)
    }
}
