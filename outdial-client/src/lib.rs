//! Outdial Client - remote service surface
//!
//! Typed access to the campaign service over HTTP. The `CampaignApi` trait
//! is the seam the synchronization core depends on; `RestClient` is the
//! production implementation. Raw wire shapes and their normalization into
//! `outdial-core` types live in `wire` - nothing outside that module
//! tolerates loosely-shaped responses.

pub mod api;
pub mod config;
pub mod rest;
pub mod wire;

pub use api::CampaignApi;
pub use config::{
    CacheTtlConfig, ClientConfig, CredentialConfig, PollTimingConfig, SessionTimingConfig,
};
pub use rest::RestClient;
