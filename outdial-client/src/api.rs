//! The remote campaign service surface.
//!
//! This trait is the seam between the synchronization core and the network.
//! Production code uses [`crate::RestClient`]; tests substitute scripted
//! implementations.

use async_trait::async_trait;
use outdial_core::{ApiError, CampaignId, CampaignOverview, ExecutionPage, RunId, RunProgress};

/// Typed access to the five remote operations the core consumes.
///
/// Every implementation must attach the current credential to each call and
/// surface an unauthorized response as [`ApiError::Unauthorized`] so the
/// session monitor can drive the logged-out transition.
#[async_trait]
pub trait CampaignApi: Send + Sync {
    /// Check whether the current credential is still accepted.
    async fn verify_credential(&self) -> Result<bool, ApiError>;

    /// Launch a background execution run for a campaign.
    async fn launch_run(
        &self,
        campaign_id: CampaignId,
        batch_size: u32,
        throttle_ms: u64,
    ) -> Result<RunId, ApiError>;

    /// Fetch the current progress of a run.
    async fn run_status(&self, run_id: RunId) -> Result<RunProgress, ApiError>;

    /// Fetch the aggregate counters for a campaign.
    async fn campaign_overview(&self, campaign_id: CampaignId)
        -> Result<CampaignOverview, ApiError>;

    /// Fetch one page of execution records, optionally filtered by status.
    async fn execution_page(
        &self,
        campaign_id: CampaignId,
        page: u32,
        page_size: u32,
        status_filter: Option<&str>,
    ) -> Result<ExecutionPage, ApiError>;
}
