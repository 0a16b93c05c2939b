//! Wiring: one bundle owning the client, cache, and session monitor.

use crate::cache::SyncCache;
use crate::clock::{Clock, SystemClock};
use crate::poller::{PollEvent, RunHandle, RunPoller};
use crate::reconciler::{ReconcilerConfig, StatusReconciler};
use crate::session::{SessionEvent, SessionMonitor};
use outdial_client::api::CampaignApi;
use outdial_client::config::ClientConfig;
use outdial_client::rest::RestClient;
use outdial_core::{CampaignId, OutdialResult};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// The assembled synchronization core.
///
/// Owns the shared cache and session monitor and hands out reconcilers
/// and pollers wired to them. Must be created inside a tokio runtime;
/// construction spawns the idle watcher.
pub struct SyncService {
    config: ClientConfig,
    api: Arc<dyn CampaignApi>,
    clock: Arc<dyn Clock>,
    cache: Arc<SyncCache>,
    session: Arc<SessionMonitor>,
    shutdown: watch::Sender<bool>,
    idle_watcher: JoinHandle<()>,
}

impl SyncService {
    /// Build against the real HTTP client and system clock.
    pub fn create(config: ClientConfig) -> OutdialResult<(Self, mpsc::Receiver<SessionEvent>)> {
        config.validate()?;
        let api: Arc<dyn CampaignApi> = Arc::new(RestClient::new(&config)?);
        Ok(Self::with_parts(config, api, Arc::new(SystemClock)))
    }

    /// Build from explicit parts. This is the seam for swapping in a
    /// scripted API or a simulated clock.
    pub fn with_parts(
        config: ClientConfig,
        api: Arc<dyn CampaignApi>,
        clock: Arc<dyn Clock>,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let cache = Arc::new(SyncCache::new(
            Arc::clone(&clock),
            std::time::Duration::from_millis(config.cache.default_ttl_ms),
        ));
        let (session, events) =
            SessionMonitor::new(Arc::clone(&api), Arc::clone(&clock), config.session);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let idle_watcher = session.spawn_idle_watcher(shutdown_rx);
        tracing::info!(base_url = %config.api_base_url, "sync service started");
        (
            Self {
                config,
                api,
                clock,
                cache,
                session,
                shutdown,
                idle_watcher,
            },
            events,
        )
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<SyncCache> {
        &self.cache
    }

    pub fn session(&self) -> &Arc<SessionMonitor> {
        &self.session
    }

    pub fn api(&self) -> &Arc<dyn CampaignApi> {
        &self.api
    }

    /// A reconciler sharing this service's cache and session.
    pub fn reconciler(&self, status_filter: Option<String>) -> StatusReconciler {
        StatusReconciler::new(
            Arc::clone(&self.api),
            Arc::clone(&self.cache),
            Arc::clone(&self.session),
            ReconcilerConfig::from_client(&self.config, status_filter),
        )
    }

    /// A poller sharing this service's session.
    pub fn poller(&self) -> RunPoller {
        RunPoller::new(
            Arc::clone(&self.api),
            Arc::clone(&self.clock),
            Arc::clone(&self.session),
            self.config.poll,
        )
    }

    /// Launch a run for the campaign and poll it to completion.
    pub async fn start_poller(
        &self,
        campaign_id: CampaignId,
        events: mpsc::Sender<PollEvent>,
    ) -> OutdialResult<RunHandle> {
        self.poller().start(campaign_id, events).await
    }

    /// Stop the background idle watcher and tear the service down.
    pub async fn dispose(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.idle_watcher.await {
            tracing::warn!(error = %err, "idle watcher ended abnormally");
        }
        tracing::info!("sync service stopped");
    }
}

// ============================================================================
// TESTS
// ============================================================================
