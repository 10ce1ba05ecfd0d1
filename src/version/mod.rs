//! Installed vs. latest Claude Code version tracking.

pub mod checker;
pub mod compare;
pub mod sources;

pub use checker::{CheckOutcome, VersionChecker};
pub use sources::{CliVersionProbe, GithubReleaseFeed};
