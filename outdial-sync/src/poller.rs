//! Background run launch and progress polling.
//!
//! One poll task per launched run. The poll interval starts at the base
//! and doubles after every check that shows no new processed calls, up to
//! the configured cap; any forward progress snaps it back to the base.
//! The task ends at the first terminal status, on a fetch error, or on
//! cancellation. A status fetched while cancellation was in flight is
//! discarded rather than emitted.

use crate::clock::Clock;
use crate::session::SessionMonitor;
use outdial_client::api::CampaignApi;
use outdial_client::config::PollTimingConfig;
use outdial_core::{CampaignId, OutdialResult, PollError, RunId, RunProgress, RunStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Progress notifications for one background run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    Launched { run_id: RunId },
    Progress(RunProgress),
    Completed(RunProgress),
    Failed { error: PollError },
}

/// Handle to a live poll task.
pub struct RunHandle {
    pub run_id: RunId,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RunHandle {
    /// Request cancellation. Idempotent; the task stops emitting as soon
    /// as it observes the signal.
    pub fn cancel(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Wait for the poll task to finish.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

pub struct RunPoller {
    api: Arc<dyn CampaignApi>,
    clock: Arc<dyn Clock>,
    session: Arc<SessionMonitor>,
    timing: PollTimingConfig,
}

impl RunPoller {
    pub fn new(
        api: Arc<dyn CampaignApi>,
        clock: Arc<dyn Clock>,
        session: Arc<SessionMonitor>,
        timing: PollTimingConfig,
    ) -> Self {
        Self {
            api,
            clock,
            session,
            timing,
        }
    }

    /// Launch a run for the campaign and start polling its status.
    ///
    /// Launch failure is returned directly; everything after a successful
    /// launch arrives through `events`.
    pub async fn start(
        &self,
        campaign_id: CampaignId,
        events: mpsc::Sender<PollEvent>,
    ) -> OutdialResult<RunHandle> {
        let run_id = match self
            .api
            .launch_run(campaign_id, self.timing.batch_size, self.timing.throttle_ms)
            .await
        {
            Ok(run_id) => run_id,
            Err(err) => {
                self.session.observe_api_error(&err).await;
                return Err(PollError::LaunchFailed {
                    campaign_id,
                    reason: err.to_string(),
                }
                .into());
            }
        };
        tracing::info!(%run_id, %campaign_id, "run launched");
        let _ = events.send(PollEvent::Launched { run_id }).await;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(poll_loop(
            Arc::clone(&self.api),
            Arc::clone(&self.clock),
            Arc::clone(&self.session),
            self.timing,
            run_id,
            events,
            shutdown_rx,
        ));
        Ok(RunHandle {
            run_id,
            shutdown,
            task,
        })
    }
}

async fn poll_loop(
    api: Arc<dyn CampaignApi>,
    clock: Arc<dyn Clock>,
    session: Arc<SessionMonitor>,
    timing: PollTimingConfig,
    run_id: RunId,
    events: mpsc::Sender<PollEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let base = Duration::from_millis(timing.base_interval_ms);
    let cap = Duration::from_millis(timing.max_backoff_ms);
    let mut backoff = base;
    let mut last_processed = 0u64;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::debug!(%run_id, "poll loop cancelled");
                    break;
                }
            }
            _ = clock.sleep(backoff) => {
                let status = api.run_status(run_id).await;
                if *shutdown.borrow() {
                    tracing::debug!(%run_id, "discarding status fetched after cancellation");
                    break;
                }
                let progress = match status {
                    Ok(progress) => progress,
                    Err(err) => {
                        session.observe_api_error(&err).await;
                        let error = PollError::StatusFetchFailed {
                            run_id,
                            reason: err.to_string(),
                        };
                        tracing::warn!(%run_id, error = %error, "run status fetch failed");
                        let _ = events.send(PollEvent::Failed { error }).await;
                        break;
                    }
                };

                if progress.status.is_terminal() {
                    let event = if progress.status == RunStatus::Done {
                        tracing::info!(%run_id, processed = progress.processed, "run completed");
                        PollEvent::Completed(progress)
                    } else {
                        tracing::warn!(%run_id, "run failed");
                        PollEvent::Failed {
                            error: PollError::JobFailed { run_id },
                        }
                    };
                    let _ = events.send(event).await;
                    break;
                }

                let progressed = progress.processed > last_processed;
                if progressed {
                    last_processed = progress.processed;
                }
                backoff = next_backoff(backoff, base, cap, progressed);
                let _ = events.send(PollEvent::Progress(progress)).await;
            }
        }
    }
}

/// Forward progress snaps the interval back to the base; stagnation
/// doubles it up to the cap.
fn next_backoff(current: Duration, base: Duration, cap: Duration, progressed: bool) -> Duration {
    if progressed {
        base
    } else {
        current.saturating_mul(2).min(cap)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{running, ManualClock, MockApi};
    use crate::session::SessionEvent;
    use outdial_client::config::SessionTimingConfig;
    use outdial_core::ApiError;

    fn timing() -> PollTimingConfig {
        PollTimingConfig {
            base_interval_ms: 1_000,
            max_backoff_ms: 8_000,
            batch_size: 10,
            throttle_ms: 250,
        }
    }

    fn poller_with(
        api: &Arc<MockApi>,
    ) -> (
        RunPoller,
        Arc<ManualClock>,
        mpsc::Receiver<SessionEvent>,
    ) {
        let clock = Arc::new(ManualClock::new());
        let session_timing = SessionTimingConfig {
            token_ttl_ms: 60_000,
            idle_threshold_ms: 30 * 60 * 1000,
            idle_poll_interval_ms: 5 * 60 * 1000,
        };
        let (session, session_events) =
            SessionMonitor::new(api.clone(), clock.clone(), session_timing);
        let poller = RunPoller::new(api.clone(), clock.clone(), session, timing());
        (poller, clock, session_events)
    }

    fn done(run_id: RunId, total: u64) -> RunProgress {
        RunProgress {
            run_id,
            status: RunStatus::Done,
            processed: total,
            total,
        }
    }

    async fn drain(events: &mut mpsc::Receiver<PollEvent>) -> Vec<PollEvent> {
        let mut seen = Vec::new();
        while let Some(event) = events.recv().await {
            seen.push(event);
        }
        seen
    }

    #[tokio::test]
    async fn test_stagnant_backoff_doubles_to_cap() {
        let api = MockApi::new();
        let run_id = RunId::new();
        api.script_launch(Ok(run_id));
        for _ in 0..5 {
            api.script_status(Ok(running(run_id, 0, 45)));
        }
        api.script_status(Ok(done(run_id, 45)));
        let (poller, clock, _session_events) = poller_with(&api);

        let (tx, mut rx) = mpsc::channel(32);
        let handle = poller.start(CampaignId::new(), tx).await.unwrap();
        handle.join().await;

        let events = drain(&mut rx).await;
        assert!(matches!(events.first(), Some(PollEvent::Launched { .. })));
        assert!(matches!(events.last(), Some(PollEvent::Completed(_))));

        let sleeps: Vec<u64> = clock
            .recorded_sleeps()
            .iter()
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(sleeps, vec![1_000, 2_000, 4_000, 8_000, 8_000, 8_000]);
    }

    #[tokio::test]
    async fn test_progress_resets_backoff() {
        let api = MockApi::new();
        let run_id = RunId::new();
        api.script_launch(Ok(run_id));
        api.script_status(Ok(running(run_id, 0, 45)));
        api.script_status(Ok(running(run_id, 0, 45)));
        api.script_status(Ok(running(run_id, 5, 45)));
        api.script_status(Ok(running(run_id, 5, 45)));
        api.script_status(Ok(done(run_id, 45)));
        let (poller, clock, _session_events) = poller_with(&api);

        let (tx, mut rx) = mpsc::channel(32);
        let handle = poller.start(CampaignId::new(), tx).await.unwrap();
        handle.join().await;
        drain(&mut rx).await;

        let sleeps: Vec<u64> = clock
            .recorded_sleeps()
            .iter()
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(sleeps, vec![1_000, 2_000, 4_000, 1_000, 2_000]);
    }

    #[tokio::test]
    async fn test_no_checks_after_terminal_status() {
        let api = MockApi::new();
        let run_id = RunId::new();
        api.script_launch(Ok(run_id));
        api.script_status(Ok(done(run_id, 45)));
        let (poller, _clock, _session_events) = poller_with(&api);

        let (tx, mut rx) = mpsc::channel(32);
        let handle = poller.start(CampaignId::new(), tx).await.unwrap();
        handle.join().await;

        let events = drain(&mut rx).await;
        assert_eq!(
            events,
            vec![
                PollEvent::Launched { run_id },
                PollEvent::Completed(done(run_id, 45)),
            ]
        );
        assert_eq!(api.status_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_run_emits_job_failed() {
        let api = MockApi::new();
        let run_id = RunId::new();
        api.script_launch(Ok(run_id));
        api.script_status(Ok(RunProgress {
            run_id,
            status: RunStatus::Failed,
            processed: 3,
            total: 45,
        }));
        let (poller, _clock, _session_events) = poller_with(&api);

        let (tx, mut rx) = mpsc::channel(32);
        let handle = poller.start(CampaignId::new(), tx).await.unwrap();
        handle.join().await;

        let events = drain(&mut rx).await;
        assert!(matches!(
            events.last(),
            Some(PollEvent::Failed {
                error: PollError::JobFailed { .. }
            })
        ));
    }

    #[tokio::test]
    async fn test_launch_failure_returns_error() {
        let api = MockApi::new();
        api.script_launch(Err(ApiError::Transport {
            endpoint: "/runs".to_string(),
            reason: "refused".to_string(),
        }));
        let (poller, _clock, _session_events) = poller_with(&api);

        let (tx, _rx) = mpsc::channel(32);
        let result = poller.start(CampaignId::new(), tx).await;
        assert!(matches!(
            result,
            Err(outdial_core::OutdialError::Poll(
                PollError::LaunchFailed { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_status_logs_session_out() {
        let api = MockApi::new();
        let run_id = RunId::new();
        api.script_launch(Ok(run_id));
        api.script_status(Err(ApiError::Unauthorized {
            endpoint: "/status".to_string(),
        }));
        let (poller, _clock, mut session_events) = poller_with(&api);

        let (tx, mut rx) = mpsc::channel(32);
        let handle = poller.start(CampaignId::new(), tx).await.unwrap();
        handle.join().await;

        let events = drain(&mut rx).await;
        assert!(matches!(
            events.last(),
            Some(PollEvent::Failed {
                error: PollError::StatusFetchFailed { .. }
            })
        ));
        assert_eq!(session_events.recv().await, Some(SessionEvent::LoggedOut));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancellation_discards_in_flight_status() {
        let api = MockApi::new();
        let run_id = RunId::new();
        api.script_launch(Ok(run_id));
        api.script_status(Ok(running(run_id, 10, 45)));
        let gate = api.gate_status();
        let (poller, _clock, _session_events) = poller_with(&api);

        let (tx, mut rx) = mpsc::channel(32);
        let handle = poller.start(CampaignId::new(), tx).await.unwrap();
        assert_eq!(rx.recv().await, Some(PollEvent::Launched { run_id }));

        // Let the task block inside the status fetch, then cancel and
        // release it: the fetched status must never surface.
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
        gate.notify_waiters();
        handle.join().await;

        let events = drain(&mut rx).await;
        assert!(events.is_empty());
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
