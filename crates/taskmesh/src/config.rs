// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Manager configuration.
//!
//! Supports both programmatic and file-based (TOML) configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default mailbox and argument queue size for new interfaces.
pub const DEFAULT_MAILBOX_SIZE: usize = 64;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings shared by interfaces and the global registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Capacity of each binding's mailbox.
    #[serde(default = "default_mailbox_size")]
    pub mailbox_size: usize,

    /// Maximum pending invocations carrying an argument per mailbox.
    #[serde(default = "default_mailbox_size")]
    pub argument_queue_size: usize,

    /// Delay after a local teardown before connection ids are released
    /// (milliseconds).
    #[serde(default = "default_disconnect_grace")]
    pub disconnect_grace_ms: u64,

    /// Pending connections older than this are disconnected (seconds, 0 = never).
    #[serde(default)]
    pub connect_confirm_timeout_secs: u64,

    /// How often the disconnect worker checks for confirm timeouts
    /// (milliseconds).
    #[serde(default = "default_timeout_check_interval")]
    pub timeout_check_interval_ms: u64,
}

fn default_mailbox_size() -> usize {
    DEFAULT_MAILBOX_SIZE
}

fn default_disconnect_grace() -> u64 {
    100
}

fn default_timeout_check_interval() -> u64 {
    1000
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            mailbox_size: DEFAULT_MAILBOX_SIZE,
            argument_queue_size: DEFAULT_MAILBOX_SIZE,
            disconnect_grace_ms: default_disconnect_grace(),
            connect_confirm_timeout_secs: 0,
            timeout_check_interval_ms: default_timeout_check_interval(),
        }
    }
}

impl ManagerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mailbox_size == 0 {
            return Err(ConfigError::Invalid("mailbox_size must be at least 1".into()));
        }
        if self.argument_queue_size == 0 {
            return Err(ConfigError::Invalid(
                "argument_queue_size must be at least 1".into(),
            ));
        }
        if self.timeout_check_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "timeout_check_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn disconnect_grace(&self) -> Duration {
        Duration::from_millis(self.disconnect_grace_ms)
    }

    pub fn connect_confirm_timeout(&self) -> Option<Duration> {
        (self.connect_confirm_timeout_secs > 0)
            .then(|| Duration::from_secs(self.connect_confirm_timeout_secs))
    }

    pub fn timeout_check_interval(&self) -> Duration {
        Duration::from_millis(self.timeout_check_interval_ms)
    }
}
