//! The aggregate view handed to notifiers and the summary store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AccountId, JobId};

/// How many recent error messages are kept per job.
pub const MAX_RECENT_ERRORS: usize = 5;

/// Per-job counters across all accounts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStats {
    pub success: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Most recent failure messages, oldest first, capped at [`MAX_RECENT_ERRORS`].
    pub recent_errors: Vec<String>,
    /// Skip count per [`SkipReason::code`](crate::SkipReason::code).
    #[serde(default)]
    pub skip_reasons: BTreeMap<String, usize>,
}

impl JobStats {
    pub fn total(&self) -> usize {
        self.success + self.skipped + self.failed
    }

    /// Success percentage over every outcome, skips included, rounded to
    /// two decimals; 0 when nothing ran.
    pub fn success_rate(&self) -> f64 {
        percentage(self.success, self.total())
    }

    /// How many skips carried the reason `code` (e.g. `"prerequisite-failed"`).
    pub fn skipped_for(&self, code: &str) -> usize {
        self.skip_reasons.get(code).copied().unwrap_or(0)
    }
}

/// Per-account counters across all cycles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountStats {
    pub success: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cycles_completed: u64,
    /// Set once the account hit a fatal error and left the rotation.
    pub excluded: bool,
}

impl AccountStats {
    pub fn total(&self) -> usize {
        self.success + self.skipped + self.failed
    }

    /// An account counts as successful when at least one job succeeded.
    pub fn is_successful(&self) -> bool {
        self.success > 0
    }
}

/// Point-in-time aggregate of every recorded outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    /// Number of global cycles every non-excluded account has finished.
    pub cycles_completed: u64,
    pub total_outcomes: usize,
    pub jobs: BTreeMap<JobId, JobStats>,
    pub accounts: BTreeMap<AccountId, AccountStats>,
}

impl RunSummary {
    pub fn successful_accounts(&self) -> usize {
        self.accounts.values().filter(|a| a.is_successful()).count()
    }

    pub fn excluded_accounts(&self) -> usize {
        self.accounts.values().filter(|a| a.excluded).count()
    }

    pub fn account_success_rate(&self) -> f64 {
        percentage(self.successful_accounts(), self.accounts.len())
    }

    /// Job outcomes summed over every job.
    pub fn job_totals(&self) -> JobStats {
        let mut totals = JobStats::default();
        for stats in self.jobs.values() {
            totals.success += stats.success;
            totals.skipped += stats.skipped;
            totals.failed += stats.failed;
            for (code, n) in &stats.skip_reasons {
                *totals.skip_reasons.entry(code.clone()).or_default() += n;
            }
        }
        totals
    }

    /// Outcome count for one job, 0 if the job never ran.
    pub fn job_total(&self, job: &JobId) -> usize {
        self.jobs.get(job).map(JobStats::total).unwrap_or(0)
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 10_000.0).round() / 100.0
}
