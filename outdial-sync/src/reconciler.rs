//! Campaign status reconciliation: aggregate counters plus one visible
//! page of execution records.
//!
//! Snapshots are built whole and swapped in a single assignment; a
//! consumer never observes a half-updated view. Page navigation carries a
//! generation number so a response that arrives after a newer request has
//! settled is discarded instead of regressing the view.

use crate::cache::SyncCache;
use crate::session::SessionMonitor;
use outdial_client::api::CampaignApi;
use outdial_client::config::ClientConfig;
use outdial_core::{
    CampaignId, CampaignOverview, ExecutionPage, IdType, LoadState, OutdialError, OutdialResult,
    OverviewSnapshot, PageData, PagedView, SyncError,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub page_size: u32,
    pub overview_ttl: Duration,
    pub page_ttl: Duration,
    /// Server-side status filter applied to every page request.
    pub status_filter: Option<String>,
}

impl ReconcilerConfig {
    pub fn from_client(config: &ClientConfig, status_filter: Option<String>) -> Self {
        Self {
            page_size: config.page_size,
            overview_ttl: Duration::from_millis(config.cache.overview_ttl_ms),
            page_ttl: Duration::from_millis(config.cache.page_ttl_ms),
            status_filter,
        }
    }
}

/// The complete view a consumer renders from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerSnapshot {
    pub overview: OverviewSnapshot,
    pub page: LoadState<PagedView>,
    pub current_page: u32,
}

impl ReconcilerSnapshot {
    fn pending() -> Self {
        Self {
            overview: OverviewSnapshot::pending(),
            page: LoadState::Loading,
            current_page: 1,
        }
    }

    /// Total pages as last reported; zero until a page has settled.
    pub fn total_pages(&self) -> u32 {
        match self.page.as_ready() {
            Some(view) => view.info.total_pages,
            None => 0,
        }
    }
}

struct ViewState {
    campaign_id: Option<CampaignId>,
    snapshot: ReconcilerSnapshot,
}

pub struct StatusReconciler {
    api: Arc<dyn CampaignApi>,
    cache: Arc<SyncCache>,
    session: Arc<SessionMonitor>,
    config: ReconcilerConfig,
    state: Mutex<ViewState>,
    // Bumped by every view-changing request; a settling fetch applies its
    // result only while it still holds the latest generation.
    generation: AtomicU64,
}

impl StatusReconciler {
    pub fn new(
        api: Arc<dyn CampaignApi>,
        cache: Arc<SyncCache>,
        session: Arc<SessionMonitor>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            api,
            cache,
            session,
            config,
            state: Mutex::new(ViewState {
                campaign_id: None,
                snapshot: ReconcilerSnapshot::pending(),
            }),
            generation: AtomicU64::new(0),
        }
    }

    /// Open a campaign view on page one.
    ///
    /// With `initial_overview` the counters settle immediately and only
    /// the first page is fetched; otherwise the overview and the page are
    /// fetched together. The snapshot is ready once both sides have
    /// settled, success or failure; fetch failures surface as
    /// [`LoadState::Failed`] rather than as an error.
    pub async fn open(
        &self,
        campaign_id: CampaignId,
        initial_overview: Option<CampaignOverview>,
    ) -> OutdialResult<ReconcilerSnapshot> {
        self.session.record_activity();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.lock().await;
            state.campaign_id = Some(campaign_id);
            state.snapshot = ReconcilerSnapshot::pending();
        }

        let (overview, page) = match initial_overview {
            Some(counters) => {
                let page = self.load_page(campaign_id, 1).await;
                (LoadState::Ready(counters), page)
            }
            None => tokio::join!(
                self.load_overview(campaign_id),
                self.load_page(campaign_id, 1)
            ),
        };
        let snapshot = assemble(overview, page, 1);

        let mut state = self.state.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(%campaign_id, "open superseded before settling");
            return Ok(snapshot);
        }
        state.snapshot = snapshot.clone();
        Ok(snapshot)
    }

    /// Navigate to a specific page of the open campaign.
    ///
    /// Returns `Ok(None)` when no campaign is open or when a newer
    /// navigation settled first; the stale response is discarded and the
    /// view keeps the newer page.
    pub async fn goto_page(&self, page: u32) -> OutdialResult<Option<ReconcilerSnapshot>> {
        let page = page.max(1);
        let campaign_id = {
            let state = self.state.lock().await;
            match state.campaign_id {
                Some(id) => id,
                None => return Ok(None),
            }
        };
        self.session.record_activity();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let fetched = self.load_page(campaign_id, page).await;

        let mut state = self.state.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation
            || state.campaign_id != Some(campaign_id)
        {
            let discarded = SyncError::StaleResponseDiscarded {
                key: self.page_key(campaign_id, page),
            };
            tracing::debug!(page, error = %discarded, "discarding superseded page response");
            return Ok(None);
        }
        state.snapshot.page = fetched;
        state.snapshot.current_page = page;
        state.snapshot.overview =
            backfill_overview(state.snapshot.overview.clone(), &state.snapshot.page);
        Ok(Some(state.snapshot.clone()))
    }

    /// Navigate forward one page; `Ok(None)` when already on the last.
    pub async fn next_page(&self) -> OutdialResult<Option<ReconcilerSnapshot>> {
        let (current, total) = self.page_position().await;
        if total == 0 || current >= total {
            return Ok(None);
        }
        self.goto_page(current + 1).await
    }

    /// Navigate back one page; `Ok(None)` when already on the first.
    pub async fn prev_page(&self) -> OutdialResult<Option<ReconcilerSnapshot>> {
        let (current, _) = self.page_position().await;
        if current <= 1 {
            return Ok(None);
        }
        self.goto_page(current - 1).await
    }

    /// Drop every cached value for the open campaign and rebuild the view
    /// from page one with live fetches.
    pub async fn refresh(&self) -> OutdialResult<Option<ReconcilerSnapshot>> {
        let campaign_id = {
            let state = self.state.lock().await;
            match state.campaign_id {
                Some(id) => id,
                None => return Ok(None),
            }
        };
        let dropped = self
            .cache
            .invalidate_prefix(&campaign_key_prefix(campaign_id));
        tracing::debug!(%campaign_id, dropped, "refreshing campaign view");
        let snapshot = self.open(campaign_id, None).await?;
        Ok(Some(snapshot))
    }

    /// The current snapshot as last applied.
    pub async fn snapshot(&self) -> ReconcilerSnapshot {
        self.state.lock().await.snapshot.clone()
    }

    async fn page_position(&self) -> (u32, u32) {
        let state = self.state.lock().await;
        (
            state.snapshot.current_page,
            state.snapshot.total_pages(),
        )
    }

    async fn load_overview(&self, campaign_id: CampaignId) -> LoadState<CampaignOverview> {
        let key = overview_key(campaign_id);
        let api = Arc::clone(&self.api);
        let result = self
            .cache
            .fetch(&key, self.config.overview_ttl, || async move {
                api.campaign_overview(campaign_id)
                    .await
                    .map_err(OutdialError::from)
            })
            .await;
        match result {
            Ok(counters) => LoadState::Ready(counters),
            Err(err) => {
                self.note_error(&err).await;
                tracing::warn!(%campaign_id, error = %err, "overview fetch failed");
                LoadState::Failed(err.to_string())
            }
        }
    }

    async fn load_page(&self, campaign_id: CampaignId, page: u32) -> LoadState<PagedView> {
        let key = self.page_key(campaign_id, page);
        let api = Arc::clone(&self.api);
        let page_size = self.config.page_size;
        let filter = self.config.status_filter.clone();
        let result = self
            .cache
            .fetch(&key, self.config.page_ttl, || async move {
                api.execution_page(campaign_id, page, page_size, filter.as_deref())
                    .await
                    .map_err(OutdialError::from)
            })
            .await;
        match result {
            Ok(fetched) => classify_page(fetched),
            Err(err) => {
                self.note_error(&err).await;
                tracing::warn!(%campaign_id, page, error = %err, "page fetch failed");
                LoadState::Failed(err.to_string())
            }
        }
    }

    async fn note_error(&self, err: &OutdialError) {
        if let OutdialError::Api(api_err) = err {
            self.session.observe_api_error(api_err).await;
        }
    }

    fn page_key(&self, campaign_id: CampaignId, page: u32) -> String {
        let prefix = campaign_key_prefix(campaign_id);
        match &self.config.status_filter {
            Some(filter) => format!("{prefix}page:{page}:{}:{filter}", self.config.page_size),
            None => format!("{prefix}page:{page}:{}", self.config.page_size),
        }
    }
}

fn campaign_key_prefix(campaign_id: CampaignId) -> String {
    format!("campaign:{}:", campaign_id.as_uuid())
}

fn overview_key(campaign_id: CampaignId) -> String {
    format!("{}overview", campaign_key_prefix(campaign_id))
}

fn classify_page(page: ExecutionPage) -> LoadState<PagedView> {
    let (data, info) = PageData::classify(page);
    match data {
        PageData::Empty => LoadState::Empty,
        data => LoadState::Ready(PagedView { data, info }),
    }
}

fn assemble(
    overview: LoadState<CampaignOverview>,
    page: LoadState<PagedView>,
    current_page: u32,
) -> ReconcilerSnapshot {
    let mut snapshot = ReconcilerSnapshot {
        overview: OverviewSnapshot::settled(overview),
        page,
        current_page,
    };
    snapshot.overview = backfill_overview(snapshot.overview, &snapshot.page);
    snapshot
}

/// Pagination totals are advisory: they backfill the counters only when
/// the authoritative overview reported all zeros.
fn backfill_overview(
    overview: OverviewSnapshot,
    page: &LoadState<PagedView>,
) -> OverviewSnapshot {
    let ready = overview.ready;
    let counters = match overview.counters {
        LoadState::Ready(counters) => counters,
        other => {
            return OverviewSnapshot {
                counters: other,
                ready,
            }
        }
    };
    if !counters.is_all_zero() {
        return OverviewSnapshot::settled(LoadState::Ready(counters));
    }
    match page {
        LoadState::Ready(view) if view.info.total_count > 0 => {
            let advisory = CampaignOverview {
                total_calls: view.info.total_count,
                ..Default::default()
            };
            OverviewSnapshot::settled(LoadState::Ready(
                counters.merge_preferring_nonzero(advisory),
            ))
        }
        LoadState::Empty => OverviewSnapshot::settled(LoadState::Empty),
        _ => OverviewSnapshot::settled(LoadState::Ready(counters)),
    }
}

// ============================================================================
// TESTS
// ============================================================================
