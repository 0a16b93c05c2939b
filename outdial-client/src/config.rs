//! Configuration loading for outdial clients.
//!
//! All fields are required unless explicitly marked optional. No defaults
//! are invented at load time; `recommended()` exists for tests and tools
//! that want the documented timings.

use outdial_core::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub auth: CredentialConfig,
    pub request_timeout_ms: u64,
    pub page_size: u32,
    pub cache: CacheTtlConfig,
    pub session: SessionTimingConfig,
    pub poll: PollTimingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialConfig {
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
}

/// Time-to-live settings for the in-memory cache, in milliseconds.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheTtlConfig {
    pub overview_ttl_ms: u64,
    pub page_ttl_ms: u64,
    pub default_ttl_ms: u64,
}

/// Session credential and idle-tracking timings, in milliseconds.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionTimingConfig {
    /// How long a verification verdict stays trusted without re-checking.
    pub token_ttl_ms: u64,
    /// Inactivity span after which the credential is force-verified.
    pub idle_threshold_ms: u64,
    /// Cadence of the recurring idle check.
    pub idle_poll_interval_ms: u64,
}

/// Background run launch and polling timings.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollTimingConfig {
    pub base_interval_ms: u64,
    pub max_backoff_ms: u64,
    pub batch_size: u32,
    pub throttle_ms: u64,
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: ClientConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// The documented timings: 30 minute idle threshold, 5 minute idle
    /// check cadence, 1s poll base with an 8s backoff cap.
    pub fn recommended(api_base_url: impl Into<String>, auth: CredentialConfig) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            auth,
            request_timeout_ms: 15_000,
            page_size: 20,
            cache: CacheTtlConfig {
                overview_ttl_ms: 30_000,
                page_ttl_ms: 10_000,
                default_ttl_ms: 60_000,
            },
            session: SessionTimingConfig {
                token_ttl_ms: 60_000,
                idle_threshold_ms: 30 * 60 * 1000,
                idle_poll_interval_ms: 5 * 60 * 1000,
            },
            poll: PollTimingConfig {
                base_interval_ms: 1_000,
                max_backoff_ms: 8_000,
                batch_size: 10,
                throttle_ms: 250,
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.auth.api_key.is_none() && self.auth.bearer_token.is_none() {
            return Err(ConfigError::InvalidValue {
                field: "auth",
                reason: "api_key or bearer_token must be provided".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "page_size",
                reason: "must be > 0".to_string(),
            });
        }
        if self.cache.default_ttl_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.default_ttl_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.session.token_ttl_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.token_ttl_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.session.idle_poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.idle_poll_interval_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.session.idle_threshold_ms < self.session.idle_poll_interval_ms {
            return Err(ConfigError::InvalidValue {
                field: "session.idle_threshold_ms",
                reason: "must be >= idle_poll_interval_ms".to_string(),
            });
        }
        if self.poll.base_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll.base_interval_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.poll.max_backoff_ms < self.poll.base_interval_ms {
            return Err(ConfigError::InvalidValue {
                field: "poll.max_backoff_ms",
                reason: "must be >= base_interval_ms".to_string(),
            });
        }
        if self.poll.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll.batch_size",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("OUTDIAL_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

// ============================================================================
// TESTS
// ============================================================================
