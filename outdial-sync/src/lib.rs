//! Client-side synchronization core for outbound call campaigns.
//!
//! Keeps a browser- or desktop-resident client consistent with the
//! campaign service: a TTL cache with single-flight request collapsing,
//! a session credential monitor with idle detection, a backoff poller
//! for background runs, and a reconciler that maintains a paginated view
//! of campaign execution status. [`service::SyncService`] assembles the
//! pieces.

pub mod cache;
pub mod clock;
pub mod poller;
pub mod reconciler;
pub mod service;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::SyncCache;
pub use clock::{Clock, SystemClock};
pub use poller::{PollEvent, RunHandle, RunPoller};
pub use reconciler::{ReconcilerConfig, ReconcilerSnapshot, StatusReconciler};
pub use service::SyncService;
pub use session::{SessionEvent, SessionMonitor, SessionState};
