//! Result aggregator: the only shared mutable structure of a run.
//!
//! Every mutation and every snapshot goes through one mutex, so a snapshot
//! always reflects a prefix of the recorded outcomes.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use pharos_core::summary::MAX_RECENT_ERRORS;
use pharos_core::{AccountId, AccountStats, JobId, JobStats, Outcome, RunSummary};

use crate::error::DuplicateOutcome;

pub struct ResultAggregator {
    run_id: String,
    started_at: DateTime<Utc>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    keys: HashSet<(AccountId, JobId, u64)>,
    jobs: BTreeMap<JobId, JobStats>,
    accounts: BTreeMap<AccountId, AccountStats>,
    total: usize,
    global_cycles: u64,
}

impl Inner {
    /// Smallest cycle count over accounts still in rotation.
    fn global_floor(&self) -> Option<u64> {
        self.accounts
            .values()
            .filter(|a| !a.excluded)
            .map(|a| a.cycles_completed)
            .min()
    }

    /// Advance the global cycle counter; returns the new value if it moved.
    fn advance_global(&mut self) -> Option<u64> {
        match self.global_floor() {
            Some(floor) if floor > self.global_cycles => {
                self.global_cycles = floor;
                Some(floor)
            }
            _ => None,
        }
    }
}

impl ResultAggregator {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Utc::now(),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Make an account visible in summaries before it records anything.
    pub fn register_account(&self, account: &AccountId) {
        let mut inner = self.inner.lock().expect("aggregator poisoned");
        inner.accounts.entry(account.clone()).or_default();
    }

    /// Record exactly one outcome for `(account, job, cycle)`.
    pub fn record(
        &self,
        account: &AccountId,
        job: &JobId,
        cycle: u64,
        outcome: &Outcome,
    ) -> Result<(), DuplicateOutcome> {
        let mut inner = self.inner.lock().expect("aggregator poisoned");
        if !inner.keys.insert((account.clone(), job.clone(), cycle)) {
            return Err(DuplicateOutcome {
                account: account.clone(),
                job: job.clone(),
                cycle,
            });
        }
        inner.total += 1;

        let job_stats = inner.jobs.entry(job.clone()).or_default();
        match outcome {
            Outcome::Success { .. } => job_stats.success += 1,
            Outcome::Skipped { reason } => {
                job_stats.skipped += 1;
                *job_stats
                    .skip_reasons
                    .entry(reason.code().to_string())
                    .or_default() += 1;
            }
            Outcome::Failed { error, .. } => {
                job_stats.failed += 1;
                job_stats.recent_errors.push(format!("{account}: {error}"));
                if job_stats.recent_errors.len() > MAX_RECENT_ERRORS {
                    job_stats.recent_errors.remove(0);
                }
            }
        }

        let account_stats = inner.accounts.entry(account.clone()).or_default();
        match outcome {
            Outcome::Success { .. } => account_stats.success += 1,
            Outcome::Skipped { .. } => account_stats.skipped += 1,
            Outcome::Failed { .. } => account_stats.failed += 1,
        }
        Ok(())
    }

    /// Note that `account` finished `cycle`. Returns the new global cycle
    /// count when this completion closed a global cycle.
    pub fn complete_cycle(&self, account: &AccountId, cycle: u64) -> Option<u64> {
        let mut inner = self.inner.lock().expect("aggregator poisoned");
        let stats = inner.accounts.entry(account.clone()).or_default();
        stats.cycles_completed = stats.cycles_completed.max(cycle);
        inner.advance_global()
    }

    /// Take `account` out of rotation. Excluded accounts no longer hold back
    /// global cycle completion, so this may close one too.
    pub fn mark_excluded(&self, account: &AccountId) -> Option<u64> {
        let mut inner = self.inner.lock().expect("aggregator poisoned");
        inner.accounts.entry(account.clone()).or_default().excluded = true;
        inner.advance_global()
    }

    pub fn global_cycles(&self) -> u64 {
        self.inner.lock().expect("aggregator poisoned").global_cycles
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("aggregator poisoned").total
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consistent point-in-time copy.
    pub fn snapshot(&self) -> RunSummary {
        let inner = self.inner.lock().expect("aggregator poisoned");
        RunSummary {
            run_id: self.run_id.clone(),
            started_at: self.started_at,
            generated_at: Utc::now(),
            cycles_completed: inner.global_cycles,
            total_outcomes: inner.total,
            jobs: inner.jobs.clone(),
            accounts: inner.accounts.clone(),
        }
    }
}
