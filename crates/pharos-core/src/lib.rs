//! `pharos-core`: configuration, error and data types shared by every
//! `pharos-*` crate.

pub mod config;
pub mod error;
pub mod outcome;
pub mod summary;
pub mod types;

pub use config::PharosConfig;
pub use error::{ConfigError, Result};
pub use outcome::{Outcome, OutcomeKind, SkipReason};
pub use summary::{AccountStats, JobStats, RunSummary};
pub use types::{AccountId, JobId};
