//! Normalized campaign result shapes.
//!
//! These are the stable record types the synchronization core works with.
//! Raw wire responses are normalized into them at the client boundary, so
//! tolerance for missing or unknown fields lives in exactly one place.

use crate::enums::{CallStatus, RunStatus};
use crate::identity::{RunId, Timestamp};
use serde::{Deserialize, Serialize};

/// Progress report for one background run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProgress {
    pub run_id: RunId,
    pub status: RunStatus,
    /// Calls processed so far.
    pub processed: u64,
    /// Total calls the run will process.
    pub total: u64,
}

/// Aggregate counters for a whole campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CampaignOverview {
    pub total_calls: u64,
    pub completed: u64,
    pub failed: u64,
    pub executing: u64,
    pub scheduled: u64,
    pub is_completed: bool,
}

impl CampaignOverview {
    /// True when every counter is zero.
    pub fn is_all_zero(&self) -> bool {
        self.total_calls == 0
            && self.completed == 0
            && self.failed == 0
            && self.executing == 0
            && self.scheduled == 0
    }

    /// Backfill counters from an advisory source.
    ///
    /// The overview endpoint is authoritative. When it reports all-zero
    /// counters but another source (pagination totals) disagrees, the
    /// advisory values fill in. Non-zero authoritative counters always win.
    pub fn merge_preferring_nonzero(self, advisory: CampaignOverview) -> CampaignOverview {
        if self.is_all_zero() && !advisory.is_all_zero() {
            advisory
        } else {
            self
        }
    }
}

/// One execution record: a single outbound call attempt within a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub call_id: String,
    /// Display label for the dialed contact; empty when the server omits it.
    pub contact_label: String,
    pub status: CallStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub updated_at: Option<Timestamp>,
}

/// Pagination metadata for an execution page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub total_count: u64,
}

impl PageInfo {
    /// Derive page count from a total when the server omits it.
    pub fn pages_for(total_count: u64, page_size: u32) -> u32 {
        if page_size == 0 {
            return 0;
        }
        total_count.div_ceil(page_size as u64) as u32
    }
}

/// One fetched page of execution records plus its pagination metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPage {
    pub records: Vec<ExecutionRecord>,
    pub info: PageInfo,
}

/// The three distinct data states of a fetched page.
///
/// `BeyondEnd` is a page past the data (zero records but a non-zero total
/// count) - typically a stale page number after records were removed. It is
/// deliberately distinct from `Empty`, where the campaign truly has no
/// records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageData {
    Records(Vec<ExecutionRecord>),
    Empty,
    BeyondEnd,
}

impl PageData {
    /// Classify a fetched page into its data state.
    pub fn classify(page: ExecutionPage) -> (PageData, PageInfo) {
        let info = page.info;
        let data = if page.records.is_empty() {
            if info.total_count == 0 {
                PageData::Empty
            } else {
                PageData::BeyondEnd
            }
        } else {
            PageData::Records(page.records)
        };
        (data, info)
    }
}

/// Render state for anything fetched from the remote service.
///
/// "Fetching", "empty result", and "error" are three non-overlapping
/// states; consumers must never present a zeroed value as if it were
/// confirmed data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState<T> {
    Loading,
    Ready(T),
    Empty,
    Failed(String),
}

impl<T> LoadState<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn as_ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// Aggregate overview with its visibility gate.
///
/// `ready` stays false until the first full fetch settles; an unready
/// snapshot must not be rendered. Snapshots are built complete and replaced
/// wholesale - fields are never mutated incrementally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverviewSnapshot {
    pub counters: LoadState<CampaignOverview>,
    pub ready: bool,
}

impl OverviewSnapshot {
    /// The pre-fetch state: nothing visible yet.
    pub fn pending() -> Self {
        Self {
            counters: LoadState::Loading,
            ready: false,
        }
    }

    /// A settled snapshot, visible to consumers.
    pub fn settled(counters: LoadState<CampaignOverview>) -> Self {
        Self {
            counters,
            ready: true,
        }
    }
}

/// The current page of execution records as the consumer should see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedView {
    pub data: PageData,
    pub info: PageInfo,
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Page count covers every record without overshooting by a page.
        #[test]
        fn prop_pages_cover_total(total in 0u64..100_000, size in 1u32..500) {
            let pages = PageInfo::pages_for(total, size);
            prop_assert!(u64::from(pages) * u64::from(size) >= total);
            if pages > 0 {
                prop_assert!(u64::from(pages - 1) * u64::from(size) < total);
            }
        }

        /// Merging never fabricates counters: the result is one of its inputs.
        #[test]
        fn prop_merge_returns_an_input(a in any::<u64>(), b in any::<u64>()) {
            let left = CampaignOverview { total_calls: a, ..Default::default() };
            let right = CampaignOverview { total_calls: b, ..Default::default() };
            let merged = left.merge_preferring_nonzero(right);
            prop_assert!(merged == left || merged == right);
        }
    }
}
