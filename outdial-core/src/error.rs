//! Error taxonomy for outdial operations.
//!
//! All variants are `Clone` so a single failure can fan out to every
//! waiter of a shared in-flight request; transport causes are carried as
//! strings for that reason.

use crate::identity::{CampaignId, RunId};
use thiserror::Error;

/// Errors from the remote HTTP surface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("Transport error calling {endpoint}: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("Unauthorized response from {endpoint}")]
    Unauthorized { endpoint: String },

    #[error("Failed to decode response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("Unexpected HTTP {status} from {endpoint}: {body}")]
    Unexpected {
        endpoint: String,
        status: u16,
        body: String,
    },
}

impl ApiError {
    /// Whether this error must trigger the logged-out transition.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

/// Session and credential lifecycle errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Authentication credential expired or invalidated")]
    AuthExpired,

    #[error("No credential configured")]
    NoCredential,
}

/// Synchronization-core errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("Shared fetch for key {key} failed: {reason}")]
    SingleFlightFailed { key: String, reason: String },

    #[error("Discarded stale response for {key}")]
    StaleResponseDiscarded { key: String },

    #[error("Failed to encode cache value for {key}: {reason}")]
    Encode { key: String, reason: String },

    #[error("Campaign {campaign_id} has no execution records")]
    DataAbsent { campaign_id: CampaignId },
}

/// Background run polling errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    #[error("Failed to launch run for campaign {campaign_id}: {reason}")]
    LaunchFailed {
        campaign_id: CampaignId,
        reason: String,
    },

    #[error("Background run {run_id} reported failure")]
    JobFailed { run_id: RunId },

    #[error("Status fetch for run {run_id} failed: {reason}")]
    StatusFetchFailed { run_id: RunId, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or OUTDIAL_CONFIG)")]
    MissingConfigPath,

    #[error("Failed to read config file: {0}")]
    Io(String),

    #[error("Failed to parse config TOML: {0}")]
    Parse(String),

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Master error type for all outdial operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OutdialError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Poll error: {0}")]
    Poll(#[from] PollError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for outdial operations.
pub type OutdialResult<T> = Result<T, OutdialError>;

// ============================================================================
// TESTS
// ============================================================================
