//! Identity types for campaigns and background runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Common surface for UUID-backed identifier newtypes.
pub trait IdType: Copy + Eq + std::hash::Hash {
    /// Wrap an existing UUID.
    fn from_uuid(id: Uuid) -> Self;

    /// Get the underlying UUID.
    fn as_uuid(&self) -> Uuid;
}

/// Identifier of an outbound call campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CampaignId(Uuid);

/// Identifier of one server-side execution run of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl CampaignId {
    /// Generate a fresh random campaign ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl RunId {
    /// Generate a fresh random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CampaignId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl IdType for CampaignId {
    fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl IdType for RunId {
    fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for CampaignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
