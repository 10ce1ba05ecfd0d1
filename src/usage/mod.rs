//! Usage fetching against the claude.ai web API.

pub mod client;
pub mod credentials;
pub mod error;
pub mod poller;
pub mod transport;
pub mod types;

pub use client::SessionAuthClient;
pub use poller::UsagePoller;
