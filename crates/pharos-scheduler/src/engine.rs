//! The worker pool.
//!
//! Each account is driven by exactly one task. A fair semaphore with
//! `threads` permits bounds how many accounts run a cycle at once; a permit is
//! held from the startup jitter through the last job of the cycle and released
//! before the cycle gap.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use pharos_accounts::Account;
use pharos_core::config::PharosConfig;
use pharos_core::{ConfigError, JobId, Outcome, RunSummary, SkipReason};
use pharos_notify::Notifier;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::aggregator::ResultAggregator;
use crate::db::SummaryStore;
use crate::error::JobError;
use crate::job::{CycleContext, JobDefinition};
use crate::pacing::{DelayKind, PacingPolicy};
use crate::table::Route;
use crate::window::{Clock, RouteWindow, SystemClock};

/// Run-wide knobs that are not pacing.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub threads: usize,
    /// Keep cycling until cancelled. When false each account runs one cycle.
    pub repeat: bool,
    pub ignore_prerequisites: bool,
    /// Total attempts for a retriable failure, first one included.
    pub max_attempts: u32,
    pub job_timeout: Option<Duration>,
    pub grace_period: Duration,
    pub window: RouteWindow,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            repeat: true,
            ignore_prerequisites: false,
            max_attempts: 1,
            job_timeout: None,
            grace_period: Duration::from_secs(30),
            window: RouteWindow::always_open(),
        }
    }
}

impl SchedulerOptions {
    pub fn from_config(config: &PharosConfig) -> Result<Self, ConfigError> {
        if config.threads < 1 {
            return Err(ConfigError::Threads(config.threads));
        }
        if config.retry.max_attempts < 1 {
            return Err(ConfigError::RetryAttempts);
        }
        Ok(Self {
            threads: config.threads,
            repeat: config.route.repeat,
            ignore_prerequisites: config.route.ignore_prerequisites,
            max_attempts: config.retry.max_attempts,
            job_timeout: config.job_timeout_secs.map(Duration::from_secs),
            grace_period: Duration::from_secs(config.shutdown.grace_period_secs),
            window: RouteWindow::from_config(&config.route)?,
        })
    }
}

/// Orchestrates accounts through the route until the run ends or the
/// cancellation token fires.
pub struct Scheduler {
    route: Arc<Route>,
    pacing: Arc<PacingPolicy>,
    options: SchedulerOptions,
    clock: Arc<dyn Clock>,
    aggregator: Arc<ResultAggregator>,
    notifiers: Vec<Arc<dyn Notifier>>,
    store: Option<SummaryStore>,
}

impl Scheduler {
    pub fn new(route: Route, pacing: PacingPolicy, options: SchedulerOptions) -> Self {
        Self {
            route: Arc::new(route),
            pacing: Arc::new(pacing),
            options,
            clock: Arc::new(SystemClock),
            aggregator: Arc::new(ResultAggregator::new(Uuid::now_v7().to_string())),
            notifiers: Vec::new(),
            store: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn with_store(mut self, store: SummaryStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn run_id(&self) -> &str {
        self.aggregator.run_id()
    }

    /// Shared handle to the aggregator, e.g. to snapshot a run in progress.
    pub fn aggregator(&self) -> Arc<ResultAggregator> {
        Arc::clone(&self.aggregator)
    }

    /// Drive `accounts` until every account task ends (non-repeating run or
    /// all accounts excluded) or `token` is cancelled, then flush.
    pub async fn run(self, accounts: Vec<Arc<Account>>, token: CancellationToken) -> RunSummary {
        info!(
            run_id = %self.aggregator.run_id(),
            accounts = accounts.len(),
            jobs = self.route.len(),
            threads = self.options.threads,
            repeat = self.options.repeat,
            "scheduler started"
        );

        let (cycle_tx, mut cycle_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            route: Arc::clone(&self.route),
            pacing: Arc::clone(&self.pacing),
            options: self.options.clone(),
            clock: Arc::clone(&self.clock),
            aggregator: Arc::clone(&self.aggregator),
            slots: Arc::new(Semaphore::new(self.options.threads)),
            token: token.clone(),
            cycle_tx,
        });

        let mut workers = JoinSet::new();
        for account in accounts {
            self.aggregator.register_account(&account.id);
            workers.spawn(drive_account(Arc::clone(&shared), account));
        }

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("shutdown requested, no new jobs will be dispatched");
                    break;
                }
                Some(global) = cycle_rx.recv() => {
                    if self.options.repeat {
                        let label = format!("global cycle {global}");
                        tokio::select! {
                            _ = token.cancelled() => {}
                            _ = self.emit(&label) => {}
                        }
                    }
                }
                joined = workers.join_next() => match joined {
                    Some(Ok(())) => {}
                    Some(Err(e)) => error!("account task ended abnormally: {e}"),
                    None => {
                        info!("every account task finished");
                        break;
                    }
                },
            }
        }

        if token.is_cancelled() {
            self.drain(&mut workers).await;
        }
        while cycle_rx.try_recv().is_ok() {}

        let summary = self.emit("final").await;
        info!(run_id = %summary.run_id, "scheduler stopped");
        summary
    }

    // ------ Internal helpers -------------------------------------------------

    /// Give in-flight jobs the grace period, then abort what is left.
    async fn drain(&self, workers: &mut JoinSet<()>) {
        let grace = self.options.grace_period;
        let finished = tokio::time::timeout(grace, async {
            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    error!("account task ended abnormally: {e}");
                }
            }
        })
        .await;

        if finished.is_err() {
            warn!(
                remaining = workers.len(),
                grace_secs = grace.as_secs(),
                "grace period elapsed, aborting in-flight jobs"
            );
            workers.abort_all();
            while workers.join_next().await.is_some() {}
        }
    }

    /// Snapshot, persist, log statistics and notify. Store and notifier
    /// failures are logged and swallowed.
    async fn emit(&self, label: &str) -> RunSummary {
        let summary = self.aggregator.snapshot();
        log_statistics(label, &summary);

        if let Some(store) = &self.store {
            if let Err(e) = store.persist(&summary) {
                warn!(error = %e, "failed to persist run summary");
            }
        }
        for notifier in &self.notifiers {
            match notifier.notify(&summary).await {
                Ok(()) => debug!(notifier = notifier.name(), "summary delivered"),
                Err(e) => warn!(notifier = notifier.name(), error = %e, "notification failed"),
            }
        }
        summary
    }
}

/// Same rate definition as the report: successes over every outcome.
fn log_statistics(label: &str, summary: &RunSummary) {
    let totals = summary.job_totals();
    info!(
        run_id = %summary.run_id,
        cycles = summary.cycles_completed,
        success = totals.success,
        skipped = totals.skipped,
        failed = totals.failed,
        success_rate = totals.success_rate(),
        accounts_ok = summary.successful_accounts(),
        accounts = summary.accounts.len(),
        "statistics ({label})"
    );
}

/// State every account task sees.
struct Shared {
    route: Arc<Route>,
    pacing: Arc<PacingPolicy>,
    options: SchedulerOptions,
    clock: Arc<dyn Clock>,
    aggregator: Arc<ResultAggregator>,
    slots: Arc<Semaphore>,
    token: CancellationToken,
    cycle_tx: mpsc::UnboundedSender<u64>,
}

impl Shared {
    /// Sleep unless cancelled first. Returns false on cancellation.
    async fn pause(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return !self.token.is_cancelled();
        }
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn window_open(&self) -> bool {
        self.options.window.is_open(self.clock.now())
    }

    /// Block until the route window is open. Returns false on cancellation.
    async fn wait_for_window(&self, account: &Account) -> bool {
        loop {
            let wait = self.options.window.until_open(self.clock.now());
            if wait.is_zero() {
                return !self.token.is_cancelled();
            }
            info!(account = %account.id, wait_secs = wait.as_secs(), "outside route window, waiting");
            if !self.pause(wait.max(Duration::from_secs(1))).await {
                return false;
            }
        }
    }
}

enum CycleEnd {
    Completed,
    Excluded,
    Cancelled,
}

/// One account's life: window, slot, startup jitter, route, cycle gap, repeat.
async fn drive_account(shared: Arc<Shared>, account: Arc<Account>) {
    // Jobs that succeeded for this account in any cycle so far.
    let mut succeeded: HashSet<JobId> = HashSet::new();
    let mut cycle: u64 = 0;

    loop {
        cycle += 1;

        // The window may close while queued for a slot or during the startup
        // jitter; the cycle only starts if it is still open afterwards.
        let permit = loop {
            if !shared.wait_for_window(&account).await {
                return;
            }

            let permit = tokio::select! {
                _ = shared.token.cancelled() => return,
                permit = Arc::clone(&shared.slots).acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => return,
                },
            };
            if !shared.window_open() {
                debug!(account = %account.id, cycle, "route window closed while queued, releasing slot");
                continue;
            }

            let startup = shared.pacing.next_delay(DelayKind::Startup);
            debug!(account = %account.id, cycle, delay_secs = startup.as_secs(), "starting cycle");
            if !shared.pause(startup).await {
                return;
            }
            if shared.window_open() {
                break permit;
            }
            debug!(account = %account.id, cycle, "route window closed during startup delay, releasing slot");
        };

        let end = run_cycle(&shared, &account, cycle, &mut succeeded).await;
        drop(permit);

        match end {
            CycleEnd::Completed => {
                info!(account = %account.id, cycle, "cycle complete");
                if let Some(global) = shared.aggregator.complete_cycle(&account.id, cycle) {
                    let _ = shared.cycle_tx.send(global);
                }
            }
            CycleEnd::Excluded => {
                warn!(account = %account.id, cycle, "account excluded from the run");
                if let Some(global) = shared.aggregator.mark_excluded(&account.id) {
                    let _ = shared.cycle_tx.send(global);
                }
                return;
            }
            CycleEnd::Cancelled => return,
        }

        if !shared.options.repeat {
            return;
        }
        let gap = shared.pacing.next_delay(DelayKind::CycleGap);
        info!(account = %account.id, next_in_secs = gap.as_secs(), "waiting before next cycle");
        if !shared.pause(gap).await {
            return;
        }
    }
}

async fn run_cycle(
    shared: &Shared,
    account: &Account,
    cycle: u64,
    succeeded: &mut HashSet<JobId>,
) -> CycleEnd {
    let mut ctx = CycleContext::new(cycle);
    let mut failed_now: HashSet<JobId> = HashSet::new();
    let mut skipped_now: HashSet<JobId> = HashSet::new();
    let mut dispatched_any = false;

    for job in shared.route.jobs() {
        if shared.token.is_cancelled() {
            return CycleEnd::Cancelled;
        }

        let gate = missing_field(job, account).or_else(|| {
            if shared.options.ignore_prerequisites {
                None
            } else {
                prerequisite_gate(job, succeeded, &failed_now, &skipped_now)
            }
        });

        let mut exclude = false;
        let outcome = match gate {
            Some(reason) => Outcome::skipped(reason),
            None => {
                if dispatched_any {
                    let delay = shared.pacing.next_delay(DelayKind::InterTask);
                    if !shared.pause(delay).await {
                        return CycleEnd::Cancelled;
                    }
                }
                dispatched_any = true;
                let result = dispatch(shared, job, account, &mut ctx).await;
                exclude = result.exclude;
                result.outcome
            }
        };

        match &outcome {
            Outcome::Success { payload } => {
                succeeded.insert(job.id.clone());
                ctx.insert_payload(job.id.clone(), payload.clone());
                info!(account = %account.id, job = %job.id, cycle, "job succeeded");
            }
            Outcome::Skipped { reason } => {
                // A job blocked by a failure passes that failure on to its
                // own dependents.
                if matches!(reason, SkipReason::PrerequisiteFailed { .. }) {
                    failed_now.insert(job.id.clone());
                }
                skipped_now.insert(job.id.clone());
                info!(account = %account.id, job = %job.id, cycle, reason = reason.code(), "job skipped: {reason}");
            }
            Outcome::Failed { error, retriable } => {
                failed_now.insert(job.id.clone());
                warn!(account = %account.id, job = %job.id, cycle, retriable, "job failed: {error}");
            }
        }

        if let Err(e) = shared.aggregator.record(&account.id, &job.id, cycle, &outcome) {
            error!("{e}");
        }

        if exclude {
            return CycleEnd::Excluded;
        }
    }
    CycleEnd::Completed
}

fn missing_field(job: &JobDefinition, account: &Account) -> Option<SkipReason> {
    job.handler
        .requirements()
        .iter()
        .find(|field| !account.has(**field))
        .map(|field| SkipReason::MissingField {
            field: field.to_string(),
        })
}

/// Why `job` may not run yet, if anything. A prerequisite that failed in this
/// cycle wins over one that is merely unmet.
fn prerequisite_gate(
    job: &JobDefinition,
    succeeded: &HashSet<JobId>,
    failed_now: &HashSet<JobId>,
    skipped_now: &HashSet<JobId>,
) -> Option<SkipReason> {
    if let Some(pre) = job.prerequisites.iter().find(|p| failed_now.contains(*p)) {
        return Some(SkipReason::PrerequisiteFailed { job: pre.clone() });
    }
    job.prerequisites
        .iter()
        .find(|p| skipped_now.contains(*p) || !succeeded.contains(*p))
        .map(|pre| SkipReason::PrerequisiteNotMet { job: pre.clone() })
}

struct Dispatch {
    outcome: Outcome,
    exclude: bool,
}

impl Dispatch {
    fn done(outcome: Outcome) -> Self {
        Self {
            outcome,
            exclude: false,
        }
    }
}

/// Invoke the handler, retrying retriable failures within the attempt budget.
/// The handler call itself is never interrupted by cancellation; only the
/// pause before a retry is.
async fn dispatch(
    shared: &Shared,
    job: &JobDefinition,
    account: &Account,
    ctx: &mut CycleContext,
) -> Dispatch {
    let max_attempts = shared.options.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        ctx.attempt = attempt;
        debug!(account = %account.id, job = %job.id, attempt, "dispatching");

        let result = match shared.options.job_timeout {
            Some(limit) => match tokio::time::timeout(limit, job.handler.execute(account, ctx)).await {
                Ok(r) => r,
                Err(_) => Err(JobError::Timeout {
                    ms: limit.as_millis() as u64,
                }),
            },
            None => job.handler.execute(account, ctx).await,
        };

        let err = match result {
            Ok(payload) => return Dispatch::done(Outcome::success(payload)),
            Err(JobError::Skip(message)) => {
                return Dispatch::done(Outcome::skipped(SkipReason::Handler { message }))
            }
            Err(e @ JobError::Fatal(_)) => {
                return Dispatch {
                    outcome: Outcome::failed(e.to_string(), false),
                    exclude: true,
                }
            }
            Err(e) => e,
        };

        if !err.is_retriable() || attempt >= max_attempts {
            return Dispatch::done(Outcome::failed(err.to_string(), err.is_retriable()));
        }

        warn!(
            account = %account.id,
            job = %job.id,
            attempt,
            max_attempts,
            code = err.code(),
            "retriable failure, retrying: {err}"
        );
        let delay = shared.pacing.next_delay(DelayKind::InterTask);
        if !shared.pause(delay).await {
            return Dispatch::done(Outcome::failed(err.to_string(), true));
        }
        attempt += 1;
    }
}
