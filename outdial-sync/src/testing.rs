//! Shared test doubles: a scripted API and a simulated clock.

use crate::clock::Clock;
use async_trait::async_trait;
use outdial_core::{
    ApiError, CallStatus, CampaignId, CampaignOverview, ExecutionPage, ExecutionRecord, PageInfo,
    RunId, RunProgress, Timestamp,
};
use outdial_client::CampaignApi;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// MANUAL CLOCK
// ============================================================================

/// Simulated clock: `sleep` records the requested duration, advances
/// simulated time by that amount, and yields. Backoff sequences can be
/// asserted from the recorded sleeps without any real waiting.
pub struct ManualClock {
    now: Mutex<Timestamp>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        let start = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default();
        Self {
            now: Mutex::new(start),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
    }

    pub fn recorded_sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// SCRIPTED API
// ============================================================================

type Script<T> = Mutex<VecDeque<Result<T, ApiError>>>;

/// Scripted [`CampaignApi`]: each method pops its next scripted result.
/// An unscripted call returns a transport error so a test that exhausts
/// its script fails loudly instead of hanging.
#[derive(Default)]
pub struct MockApi {
    verify: Script<bool>,
    launch: Script<RunId>,
    status: Script<RunProgress>,
    overview: Script<CampaignOverview>,
    pages: Mutex<HashMap<u32, VecDeque<Result<ExecutionPage, ApiError>>>>,
    page_gates: Mutex<HashMap<u32, Arc<Notify>>>,
    status_gate: Mutex<Option<Arc<Notify>>>,
    pub verify_calls: AtomicU32,
    pub status_calls: AtomicU32,
    pub overview_calls: AtomicU32,
    pub page_calls: AtomicU32,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script_verify(&self, result: Result<bool, ApiError>) {
        self.verify.lock().unwrap().push_back(result);
    }

    pub fn script_launch(&self, result: Result<RunId, ApiError>) {
        self.launch.lock().unwrap().push_back(result);
    }

    pub fn script_status(&self, result: Result<RunProgress, ApiError>) {
        self.status.lock().unwrap().push_back(result);
    }

    pub fn script_overview(&self, result: Result<CampaignOverview, ApiError>) {
        self.overview.lock().unwrap().push_back(result);
    }

    pub fn script_page(&self, page: u32, result: Result<ExecutionPage, ApiError>) {
        self.pages
            .lock()
            .unwrap()
            .entry(page)
            .or_default()
            .push_back(result);
    }

    /// Block the next request for `page` until the returned gate is
    /// notified. Used to force out-of-order response arrival.
    pub fn gate_page(&self, page: u32) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.page_gates.lock().unwrap().insert(page, gate.clone());
        gate
    }

    /// Block every status request until the returned gate is notified.
    pub fn gate_status(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.status_gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

fn unscripted(endpoint: &str) -> ApiError {
    ApiError::Transport {
        endpoint: endpoint.to_string(),
        reason: "unscripted call".to_string(),
    }
}

#[async_trait]
impl CampaignApi for MockApi {
    async fn verify_credential(&self) -> Result<bool, ApiError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.verify
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(unscripted("verify")))
    }

    async fn launch_run(
        &self,
        _campaign_id: CampaignId,
        _batch_size: u32,
        _throttle_ms: u64,
    ) -> Result<RunId, ApiError> {
        self.launch
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(unscripted("launch")))
    }

    async fn run_status(&self, _run_id: RunId) -> Result<RunProgress, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.status_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.status
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(unscripted("status")))
    }

    async fn campaign_overview(
        &self,
        _campaign_id: CampaignId,
    ) -> Result<CampaignOverview, ApiError> {
        self.overview_calls.fetch_add(1, Ordering::SeqCst);
        self.overview
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(unscripted("overview")))
    }

    async fn execution_page(
        &self,
        _campaign_id: CampaignId,
        page: u32,
        _page_size: u32,
        _status_filter: Option<&str>,
    ) -> Result<ExecutionPage, ApiError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.page_gates.lock().unwrap().get(&page).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.pages
            .lock()
            .unwrap()
            .get_mut(&page)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(unscripted("page")))
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub fn record(id: &str) -> ExecutionRecord {
    ExecutionRecord {
        call_id: id.to_string(),
        contact_label: format!("contact-{id}"),
        status: CallStatus::NotStarted,
        attempts: 0,
        last_error: None,
        updated_at: None,
    }
}

pub fn page_of(page: u32, page_size: u32, total_count: u64, ids: &[&str]) -> ExecutionPage {
    ExecutionPage {
        records: ids.iter().map(|id| record(id)).collect(),
        info: PageInfo {
            page,
            page_size,
            total_pages: PageInfo::pages_for(total_count, page_size),
            total_count,
        },
    }
}

pub fn running(run_id: RunId, processed: u64, total: u64) -> RunProgress {
    RunProgress {
        run_id,
        status: outdial_core::RunStatus::Running,
        processed,
        total,
    }
}
