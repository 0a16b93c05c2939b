//! Outdial Core - shared data types
//!
//! Pure data structures for the campaign synchronization core. All other
//! crates depend on this. This crate contains ONLY data types and the error
//! taxonomy - no I/O and no business logic.

pub mod campaign;
pub mod enums;
pub mod error;
pub mod identity;

pub use campaign::{
    CampaignOverview, ExecutionPage, ExecutionRecord, LoadState, OverviewSnapshot, PageData,
    PageInfo, PagedView, RunProgress,
};
pub use enums::{CallStatus, RunStatus};
pub use error::{
    ApiError, ConfigError, OutdialError, OutdialResult, PollError, SessionError, SyncError,
};
pub use identity::{CampaignId, IdType, RunId, Timestamp};
