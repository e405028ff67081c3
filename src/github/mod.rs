// GitHub API layer: transport, endpoint helpers and token resolution.

pub mod auth;
pub mod client;
pub mod detail;
pub mod notifications;
pub mod pulls;
pub(crate) mod rate_limit;
pub mod stub;

pub use client::{GitHubApi, OctocrabTransport, RawResponse, Transport, api_base_for_host};
pub use stub::StubTransport;
