//! Status enums for runs and individual calls.

use serde::{Deserialize, Serialize};

/// Lifecycle of a server-side background run.
///
/// `Done` and `Failed` are terminal: once reached, no further transition
/// occurs and pollers must stop scheduling checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl RunStatus {
    /// Whether this status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Tolerant parse of the wire representation.
    ///
    /// Unknown or missing statuses normalize to `Pending` rather than
    /// failing the whole response.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "running" | "executing" | "in_progress" => Self::Running,
            "done" | "completed" | "success" => Self::Done,
            "failed" | "error" | "cancelled" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// Status of a single outbound call within a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Not yet picked up by the dialer. Also the deterministic default for
    /// records whose status field is missing or unrecognized.
    #[default]
    NotStarted,
    Scheduled,
    Executing,
    Completed,
    Failed,
}

impl CallStatus {
    /// Tolerant parse of the wire representation.
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "scheduled" | "queued" => Self::Scheduled,
            "executing" | "running" | "dialing" => Self::Executing,
            "completed" | "done" | "success" => Self::Completed,
            "failed" | "error" => Self::Failed,
            _ => Self::NotStarted,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
