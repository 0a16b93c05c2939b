//! Session credential monitoring.
//!
//! A verification verdict is trusted for a bounded interval, after which
//! the next check goes to the server. User activity is tracked separately:
//! once the idle span crosses the configured threshold, the recurring idle
//! check verifies the credential live even when the cached verdict is
//! still inside its trust window; a successful check restarts the idle
//! span. The logged-out transition is terminal
//! and is announced exactly once no matter how many callers race into it.

use crate::clock::Clock;
use outdial_client::api::CampaignApi;
use outdial_client::config::SessionTimingConfig;
use outdial_core::{ApiError, OutdialResult, SessionError, Timestamp};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No verdict yet.
    Unknown,
    /// Last verification succeeded.
    Valid,
    /// Terminal: the credential was rejected or explicitly revoked.
    LoggedOut,
}

/// Session lifecycle notifications delivered to the service owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedOut,
}

struct TokenState {
    state: SessionState,
    verified_at: Option<Timestamp>,
}

pub struct SessionMonitor {
    api: Arc<dyn CampaignApi>,
    clock: Arc<dyn Clock>,
    timing: SessionTimingConfig,
    // Held across the verification round-trip so concurrent checks
    // serialize onto one request instead of racing the server.
    token: tokio::sync::Mutex<TokenState>,
    last_activity: std::sync::Mutex<Timestamp>,
    events: mpsc::Sender<SessionEvent>,
}

impl SessionMonitor {
    pub fn new(
        api: Arc<dyn CampaignApi>,
        clock: Arc<dyn Clock>,
        timing: SessionTimingConfig,
    ) -> (Arc<Self>, mpsc::Receiver<SessionEvent>) {
        let (events, receiver) = mpsc::channel(8);
        let now = clock.now();
        let monitor = Arc::new(Self {
            api,
            clock,
            timing,
            token: tokio::sync::Mutex::new(TokenState {
                state: SessionState::Unknown,
                verified_at: None,
            }),
            last_activity: std::sync::Mutex::new(now),
            events,
        });
        (monitor, receiver)
    }

    /// Whether the credential is currently usable.
    ///
    /// A fresh verdict answers from memory; a stale or absent one triggers
    /// a live verification. Transport failures propagate without touching
    /// session state, so a flaky network never logs anyone out.
    pub async fn is_valid(&self) -> OutdialResult<bool> {
        let mut token = self.token.lock().await;
        match token.state {
            SessionState::LoggedOut => return Ok(false),
            SessionState::Valid => {
                if let Some(at) = token.verified_at {
                    if self.clock.now() - at < self.token_ttl() {
                        return Ok(true);
                    }
                }
            }
            SessionState::Unknown => {}
        }
        self.verify_locked(&mut token).await
    }

    /// Guard for operations that require a live session.
    pub async fn require_valid(&self) -> OutdialResult<()> {
        if self.is_valid().await? {
            Ok(())
        } else {
            Err(SessionError::AuthExpired.into())
        }
    }

    /// Note user activity. Resets the idle span only; a check already due
    /// still runs on schedule.
    pub fn record_activity(&self) {
        if let Ok(mut last) = self.last_activity.lock() {
            *last = self.clock.now();
        }
    }

    /// Time since the last recorded activity.
    pub fn idle_for(&self) -> Duration {
        let last = match self.last_activity.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };
        (self.clock.now() - last).to_std().unwrap_or_default()
    }

    pub async fn state(&self) -> SessionState {
        self.token.lock().await.state
    }

    /// Transition to logged out. Idempotent: later calls are no-ops and
    /// emit nothing.
    pub async fn force_logout(&self) {
        let mut token = self.token.lock().await;
        self.logout_locked(&mut token);
    }

    /// Route an API error through the session: an unauthorized response
    /// from any endpoint forces the logout transition.
    pub async fn observe_api_error(&self, err: &ApiError) {
        if err.is_unauthorized() {
            self.force_logout().await;
        }
    }

    /// Spawn the recurring idle check. The task exits on shutdown or once
    /// the session reaches the logged-out state.
    pub fn spawn_idle_watcher(
        self: &Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let interval = Duration::from_millis(monitor.timing.idle_poll_interval_ms);
            let threshold = Duration::from_millis(monitor.timing.idle_threshold_ms);
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::debug!("idle watcher stopping");
                            break;
                        }
                    }
                    _ = monitor.clock.sleep(interval) => {
                        let idle = monitor.idle_for();
                        if idle < threshold {
                            continue;
                        }
                        let mut token = monitor.token.lock().await;
                        if token.state == SessionState::LoggedOut {
                            break;
                        }
                        tracing::debug!(idle_ms = idle.as_millis() as u64, "idle threshold crossed, verifying credential");
                        match monitor.verify_locked(&mut token).await {
                            Ok(true) => {
                                // A confirmed credential restarts the idle
                                // span; the next forced check is a full
                                // threshold away, not one tick.
                                monitor.record_activity();
                            }
                            Ok(false) => break,
                            Err(err) => {
                                tracing::warn!(error = %err, "idle credential check failed, will retry");
                            }
                        }
                    }
                }
            }
        })
    }

    async fn verify_locked(&self, token: &mut TokenState) -> OutdialResult<bool> {
        match self.api.verify_credential().await {
            Ok(true) => {
                token.state = SessionState::Valid;
                token.verified_at = Some(self.clock.now());
                Ok(true)
            }
            Ok(false) => {
                self.logout_locked(token);
                Ok(false)
            }
            Err(err) if err.is_unauthorized() => {
                self.logout_locked(token);
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn logout_locked(&self, token: &mut TokenState) {
        if token.state == SessionState::LoggedOut {
            return;
        }
        token.state = SessionState::LoggedOut;
        token.verified_at = None;
        tracing::info!("session logged out");
        if let Err(err) = self.events.try_send(SessionEvent::LoggedOut) {
            tracing::warn!(error = %err, "dropping logout event");
        }
    }

    fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.timing.token_ttl_ms.min(i64::MAX as u64) as i64)
    }
}

// ============================================================================
// TESTS
// ============================================================================
