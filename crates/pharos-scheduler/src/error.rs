use pharos_core::{AccountId, JobId};
use thiserror::Error;

/// Failure of a single handler invocation.
///
/// The variant decides what the engine does next: retry, record, skip or
/// take the account out of rotation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// Connection refused/reset, DNS, proxy failures.
    #[error("network error: {0}")]
    Network(String),

    #[error("timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    /// The remote answered with something we could not interpret.
    #[error("unexpected response: {0}")]
    Format(String),

    /// The remote understood and refused (4xx, JSON-RPC error object).
    #[error("rejected: {0}")]
    Rejected(String),

    /// Nothing to do for this account; recorded as a skip, not a failure.
    #[error("skipped: {0}")]
    Skip(String),

    /// The account cannot continue at all (e.g. its key is unusable).
    #[error("fatal: {0}")]
    Fatal(String),
}

impl JobError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            JobError::Network(_) | JobError::Timeout { .. } | JobError::RateLimited(_)
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            JobError::Network(_) => "network",
            JobError::Timeout { .. } => "timeout",
            JobError::RateLimited(_) => "rate_limited",
            JobError::Auth(_) => "auth",
            JobError::Format(_) => "format",
            JobError::Rejected(_) => "rejected",
            JobError::Skip(_) => "skip",
            JobError::Fatal(_) => "fatal",
        }
    }
}

/// A second outcome was offered for a key that already has one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("outcome for account {account}, job {job}, cycle {cycle} already recorded")]
pub struct DuplicateOutcome {
    pub account: AccountId,
    pub job: JobId,
    pub cycle: u64,
}

/// Errors from the optional SQLite summary store. Never fatal to a run.
#[derive(Debug, Error)]
pub enum SummaryStoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SummaryStoreError>;
