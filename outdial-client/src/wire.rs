//! Raw wire shapes and their normalization into stable core types.
//!
//! The remote service is loose about optional sub-fields; this module is
//! the single boundary where that looseness is tolerated. Every field that
//! the server has been observed to omit is an `Option` here, and
//! `normalize` maps each one to a deterministic default. Nothing outside
//! this module should ever see a raw shape.

use outdial_core::{
    CallStatus, CampaignOverview, ExecutionPage, ExecutionRecord, PageInfo, RunId, RunProgress,
    RunStatus, Timestamp,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RawVerifyResponse {
    pub valid: Option<bool>,
}

impl RawVerifyResponse {
    /// A missing flag is treated as not valid.
    pub fn normalize(self) -> bool {
        self.valid.unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
pub struct RawLaunchResponse {
    pub run_id: RunId,
}

#[derive(Debug, Deserialize)]
pub struct RawRunStatus {
    pub status: Option<String>,
    pub processed_count: Option<u64>,
    pub total_count: Option<u64>,
}

impl RawRunStatus {
    pub fn normalize(self, run_id: RunId) -> RunProgress {
        RunProgress {
            run_id,
            status: self
                .status
                .as_deref()
                .map(RunStatus::from_wire)
                .unwrap_or(RunStatus::Pending),
            processed: self.processed_count.unwrap_or(0),
            total: self.total_count.unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RawOverview {
    pub total_jobs: Option<u64>,
    pub completed: Option<u64>,
    pub failed: Option<u64>,
    pub executing: Option<u64>,
    pub scheduled: Option<u64>,
    pub is_completed: Option<bool>,
}

impl RawOverview {
    pub fn normalize(self) -> CampaignOverview {
        CampaignOverview {
            total_calls: self.total_jobs.unwrap_or(0),
            completed: self.completed.unwrap_or(0),
            failed: self.failed.unwrap_or(0),
            executing: self.executing.unwrap_or(0),
            scheduled: self.scheduled.unwrap_or(0),
            is_completed: self.is_completed.unwrap_or(false),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RawExecutionRecord {
    pub call_id: Option<String>,
    pub contact_label: Option<String>,
    pub status: Option<String>,
    pub attempts: Option<u32>,
    pub last_error: Option<String>,
    pub updated_at: Option<Timestamp>,
}

impl RawExecutionRecord {
    pub fn normalize(self) -> ExecutionRecord {
        ExecutionRecord {
            call_id: self.call_id.unwrap_or_default(),
            contact_label: self.contact_label.unwrap_or_default(),
            status: self
                .status
                .as_deref()
                .map(CallStatus::from_wire)
                .unwrap_or_default(),
            attempts: self.attempts.unwrap_or(0),
            last_error: self.last_error,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RawPagination {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub total_pages: Option<u32>,
    pub total_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RawExecutionPage {
    #[serde(default)]
    pub items: Vec<RawExecutionRecord>,
    pub pagination: Option<RawPagination>,
}

impl RawExecutionPage {
    /// Normalize a page response.
    ///
    /// `requested_page` and `requested_size` fill in pagination fields the
    /// server omitted; a wholly missing pagination block yields a
    /// single-page view covering exactly the records present.
    pub fn normalize(self, requested_page: u32, requested_size: u32) -> ExecutionPage {
        let records: Vec<ExecutionRecord> =
            self.items.into_iter().map(RawExecutionRecord::normalize).collect();

        let info = match self.pagination {
            Some(raw) => {
                let page_size = raw.page_size.unwrap_or(requested_size);
                let total_count = raw.total_count.unwrap_or(records.len() as u64);
                PageInfo {
                    page: raw.page.unwrap_or(requested_page),
                    page_size,
                    total_pages: raw
                        .total_pages
                        .unwrap_or_else(|| PageInfo::pages_for(total_count, page_size)),
                    total_count,
                }
            }
            None => PageInfo {
                page: requested_page,
                page_size: requested_size,
                total_pages: u32::from(!records.is_empty()),
                total_count: records.len() as u64,
            },
        };

        ExecutionPage { records, info }
    }
}

// ============================================================================
// TESTS
// ============================================================================
