//! End-to-end runs of the scheduler on virtual time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use pharos_accounts::{Account, AccountField, AccountRegistry, RawRecord};
use pharos_core::config::DelayRange;
use pharos_core::{AccountId, JobId, RunSummary};
use pharos_notify::{Notifier, NotifyError};
use pharos_scheduler::{
    Clock, CycleContext, JobDefinition, JobError, JobHandler, JobTable, PacingPolicy, RouteWindow,
    Scheduler, SchedulerOptions, SummaryStore,
};
use serde_json::{json, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

// ------ Fixtures ---------------------------------------------------------

/// Records every handler invocation, in order, and peak concurrency.
#[derive(Default)]
struct Probe {
    calls: Mutex<Vec<(AccountId, JobId, u64, u32)>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl Probe {
    fn calls(&self) -> Vec<(AccountId, JobId, u64, u32)> {
        self.calls.lock().unwrap().clone()
    }

    fn jobs_for(&self, account: &AccountId) -> Vec<(String, u64)> {
        self.calls()
            .into_iter()
            .filter(|(a, ..)| a == account)
            .map(|(_, j, c, _)| (j.to_string(), c))
            .collect()
    }
}

/// Sleeps for `work`, then succeeds (or fails for the listed accounts).
struct Step {
    name: &'static str,
    work: Duration,
    probe: Arc<Probe>,
    fail_for: Vec<AccountId>,
    error: JobError,
}

impl Step {
    fn new(name: &'static str, probe: &Arc<Probe>) -> Self {
        Self {
            name,
            work: Duration::ZERO,
            probe: Arc::clone(probe),
            fail_for: Vec::new(),
            error: JobError::Rejected("refused".into()),
        }
    }

    fn taking(mut self, work: Duration) -> Self {
        self.work = work;
        self
    }

    fn failing_for(mut self, account: &AccountId, error: JobError) -> Self {
        self.fail_for.push(account.clone());
        self.error = error;
        self
    }
}

#[async_trait]
impl JobHandler for Step {
    async fn execute(&self, account: &Account, ctx: &CycleContext) -> Result<Value, JobError> {
        self.probe.calls.lock().unwrap().push((
            account.id.clone(),
            JobId::from(self.name),
            ctx.cycle,
            ctx.attempt,
        ));
        let now = self.probe.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.peak.fetch_max(now, Ordering::SeqCst);

        if !self.work.is_zero() {
            tokio::time::sleep(self.work).await;
        }
        self.probe.running.fetch_sub(1, Ordering::SeqCst);

        if self.fail_for.contains(&account.id) {
            return Err(self.error.clone());
        }
        Ok(json!({ "job": self.name, "cycle": ctx.cycle }))
    }
}

fn accounts(n: usize) -> Vec<Arc<Account>> {
    let records = (0..n)
        .map(|i| {
            let digit = char::from_digit((i + 1) as u32, 16).unwrap();
            RawRecord::with_key(i + 1, std::iter::repeat(digit).take(64).collect::<String>())
        })
        .collect();
    AccountRegistry::from_records(records).accounts().to_vec()
}

fn one_shot(threads: usize) -> SchedulerOptions {
    SchedulerOptions {
        threads,
        repeat: false,
        max_attempts: 1,
        grace_period: Duration::from_secs(5),
        ..Default::default()
    }
}

fn scheduler(defs: Vec<JobDefinition>, options: SchedulerOptions) -> Scheduler {
    let table = JobTable::new(defs).unwrap();
    let route = table.route(&[]).route;
    Scheduler::new(route, PacingPolicy::immediate(), options)
}

fn def(step: Step, priority: i32) -> JobDefinition {
    JobDefinition::new(step.name, priority, Arc::new(step))
}

fn stats(summary: &RunSummary, job: &str) -> (usize, usize, usize) {
    let s = &summary.jobs[&JobId::from(job)];
    (s.success, s.skipped, s.failed)
}

fn skips(summary: &RunSummary, job: &str, code: &str) -> usize {
    summary.jobs[&JobId::from(job)].skipped_for(code)
}

#[derive(Default)]
struct CountingNotifier {
    seen: Mutex<Vec<u64>>,
}

#[async_trait]
impl Notifier for CountingNotifier {
    fn name(&self) -> &str {
        "counting"
    }

    async fn notify(&self, summary: &RunSummary) -> pharos_notify::Result<()> {
        self.seen.lock().unwrap().push(summary.cycles_completed);
        Ok(())
    }
}

struct BrokenNotifier;

#[async_trait]
impl Notifier for BrokenNotifier {
    fn name(&self) -> &str {
        "broken"
    }

    async fn notify(&self, _: &RunSummary) -> pharos_notify::Result<()> {
        Err(NotifyError::Config("chat not found".into()))
    }
}

/// Wall clock that moves with tokio's (paused) virtual time.
struct VirtualClock {
    base: DateTime<Utc>,
    origin: Instant,
}

impl Clock for VirtualClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.origin.elapsed()).unwrap();
        self.base + elapsed
    }
}

// ------ Scenarios --------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn two_priority_jobs_three_accounts() {
    let probe = Arc::new(Probe::default());
    let sched = scheduler(
        vec![
            def(Step::new("B", &probe).taking(Duration::from_secs(1)), 5),
            def(Step::new("A", &probe).taking(Duration::from_secs(1)), 10),
        ],
        one_shot(2),
    );
    let accts = accounts(3);
    let summary = sched.run(accts.clone(), CancellationToken::new()).await;

    assert_eq!(summary.job_total(&JobId::from("A")), 3);
    assert_eq!(summary.job_total(&JobId::from("B")), 3);
    assert_eq!(summary.total_outcomes, 6);
    for a in &accts {
        assert_eq!(
            probe.jobs_for(&a.id),
            vec![("A".to_string(), 1), ("B".to_string(), 1)]
        );
    }
    assert!(probe.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test(start_paused = true)]
async fn never_more_than_threads_accounts_at_once() {
    let probe = Arc::new(Probe::default());
    let sched = scheduler(
        vec![
            def(Step::new("a", &probe).taking(Duration::from_secs(3)), 2),
            def(Step::new("b", &probe).taking(Duration::from_secs(2)), 1),
        ],
        one_shot(3),
    );
    let summary = sched.run(accounts(10), CancellationToken::new()).await;

    assert_eq!(summary.total_outcomes, 20);
    assert_eq!(probe.peak.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn failed_prerequisite_skips_dependents_for_that_account_only() {
    let probe = Arc::new(Probe::default());
    let accts = accounts(3);
    let x = accts[0].id.clone();

    let sched = scheduler(
        vec![
            def(Step::new("A", &probe).failing_for(&x, JobError::Rejected("400".into())), 1),
            JobDefinition::new("B", 9, Arc::new(Step::new("B", &probe))).requires("A"),
        ],
        one_shot(2),
    );
    let summary = sched.run(accts.clone(), CancellationToken::new()).await;

    assert_eq!(stats(&summary, "A"), (2, 0, 1));
    assert_eq!(stats(&summary, "B"), (2, 1, 0));
    assert_eq!(skips(&summary, "B", "prerequisite-failed"), 1);
    // B was never dispatched for X.
    assert_eq!(probe.jobs_for(&x), vec![("A".to_string(), 1)]);
    for other in &accts[1..] {
        assert_eq!(probe.jobs_for(&other.id).len(), 2);
    }
    assert!(!summary.accounts[&x].is_successful());
}

#[tokio::test(start_paused = true)]
async fn failure_propagates_down_a_prerequisite_chain() {
    let probe = Arc::new(Probe::default());
    let accts = accounts(2);
    let x = accts[0].id.clone();

    let sched = scheduler(
        vec![
            def(Step::new("A", &probe).failing_for(&x, JobError::Auth("401".into())), 1),
            JobDefinition::new("B", 1, Arc::new(Step::new("B", &probe))).requires("A"),
            JobDefinition::new("C", 1, Arc::new(Step::new("C", &probe))).requires("B"),
        ],
        one_shot(2),
    );
    let summary = sched.run(accts.clone(), CancellationToken::new()).await;

    for job in ["B", "C"] {
        assert_eq!(stats(&summary, job), (1, 1, 0));
        assert_eq!(skips(&summary, job, "prerequisite-failed"), 1);
        assert_eq!(skips(&summary, job, "prerequisite-not-met"), 0);
    }
    assert_eq!(probe.jobs_for(&x), vec![("A".to_string(), 1)]);
    assert_eq!(probe.jobs_for(&accts[1].id).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn prerequisite_outside_route_is_not_met() {
    let probe = Arc::new(Probe::default());
    let table = JobTable::new(vec![
        def(Step::new("register", &probe), 0),
        JobDefinition::new("claim", 0, Arc::new(Step::new("claim", &probe))).requires("register"),
    ])
    .unwrap();
    let route = table.route(&["claim".to_string()]).route;

    let summary = Scheduler::new(route.clone(), PacingPolicy::immediate(), one_shot(1))
        .run(accounts(1), CancellationToken::new())
        .await;
    assert_eq!(stats(&summary, "claim"), (0, 1, 0));
    assert!(probe.calls().is_empty());

    // Same route with prerequisite checks switched off.
    let options = SchedulerOptions {
        ignore_prerequisites: true,
        ..one_shot(1)
    };
    let summary = Scheduler::new(route, PacingPolicy::immediate(), options)
        .run(accounts(1), CancellationToken::new())
        .await;
    assert_eq!(stats(&summary, "claim"), (1, 0, 0));
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_in_flight_job_within_grace() {
    let probe = Arc::new(Probe::default());
    let sched = scheduler(
        vec![
            def(Step::new("slow", &probe).taking(Duration::from_secs(2)), 10),
            def(Step::new("after", &probe), 1),
        ],
        SchedulerOptions {
            repeat: true,
            ..one_shot(1)
        },
    );
    let token = CancellationToken::new();
    let handle = tokio::spawn(sched.run(accounts(1), token.clone()));

    tokio::time::sleep(Duration::from_secs(1)).await;
    let cancelled_at = Instant::now();
    token.cancel();
    let summary = handle.await.unwrap();

    assert!(cancelled_at.elapsed() <= Duration::from_secs(5));
    assert_eq!(stats(&summary, "slow"), (1, 0, 0));
    assert_eq!(summary.job_total(&JobId::from("after")), 0);
    assert_eq!(probe.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_aborts_after_grace_period() {
    let probe = Arc::new(Probe::default());
    let sched = scheduler(
        vec![def(Step::new("stuck", &probe).taking(Duration::from_secs(600)), 0)],
        one_shot(1),
    );
    let token = CancellationToken::new();
    let handle = tokio::spawn(sched.run(accounts(1), token.clone()));

    tokio::time::sleep(Duration::from_secs(1)).await;
    let cancelled_at = Instant::now();
    token.cancel();
    let summary = handle.await.unwrap();

    let waited = cancelled_at.elapsed();
    assert!(waited >= Duration::from_secs(5) && waited < Duration::from_secs(6));
    assert_eq!(summary.total_outcomes, 0);
    assert_eq!(summary.accounts.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_cycle_gap_is_prompt() {
    let probe = Arc::new(Probe::default());
    let table = JobTable::new(vec![def(Step::new("ping", &probe), 0)]).unwrap();
    let pacing = PacingPolicy::new(
        DelayRange::default(),
        DelayRange::default(),
        DelayRange::fixed(86_400),
    )
    .unwrap();
    let sched = Scheduler::new(
        table.route(&[]).route,
        pacing,
        SchedulerOptions {
            repeat: true,
            ..one_shot(1)
        },
    );
    let token = CancellationToken::new();
    let handle = tokio::spawn(sched.run(accounts(1), token.clone()));

    tokio::time::sleep(Duration::from_secs(10)).await;
    let cancelled_at = Instant::now();
    token.cancel();
    let summary = handle.await.unwrap();

    assert!(cancelled_at.elapsed() < Duration::from_secs(1));
    assert_eq!(summary.cycles_completed, 1);
    assert_eq!(probe.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn repeating_run_keeps_route_order_and_notifies_per_global_cycle() {
    let probe = Arc::new(Probe::default());
    let table = JobTable::new(vec![
        def(Step::new("c", &probe), 1),
        JobDefinition::new("b", 50, Arc::new(Step::new("b", &probe))).requires("a"),
        def(Step::new("a", &probe), 5),
    ])
    .unwrap();
    let pacing = PacingPolicy::new(
        DelayRange::default(),
        DelayRange::fixed(1),
        DelayRange::fixed(100),
    )
    .unwrap();
    let notifier = Arc::new(CountingNotifier::default());
    let sched = Scheduler::new(
        table.route(&[]).route,
        pacing,
        SchedulerOptions {
            repeat: true,
            ..one_shot(2)
        },
    )
    .with_notifier(notifier.clone());

    let accts = accounts(2);
    let token = CancellationToken::new();
    let handle = tokio::spawn(sched.run(accts.clone(), token.clone()));
    // Cycles start at t=0, 102, 204, 306 (two inter-task pauses + gap).
    tokio::time::sleep(Duration::from_secs(350)).await;
    token.cancel();
    let summary = handle.await.unwrap();

    assert_eq!(summary.cycles_completed, 4);
    for a in &accts {
        let jobs = probe.jobs_for(&a.id);
        assert_eq!(jobs.len(), 12);
        for (cycle, chunk) in jobs.chunks(3).enumerate() {
            let names: Vec<&str> = chunk.iter().map(|(j, _)| j.as_str()).collect();
            assert_eq!(names, vec!["a", "c", "b"]);
            assert!(chunk.iter().all(|(_, c)| *c == cycle as u64 + 1));
        }
    }
    // One report per global cycle plus the final one.
    assert_eq!(*notifier.seen.lock().unwrap(), vec![1, 2, 3, 4, 4]);
}

#[tokio::test(start_paused = true)]
async fn retriable_failures_are_retried_within_budget() {
    struct Flaky {
        failures: AtomicUsize,
        attempts: Arc<Mutex<Vec<u32>>>,
    }

    #[async_trait]
    impl JobHandler for Flaky {
        async fn execute(&self, _: &Account, ctx: &CycleContext) -> Result<Value, JobError> {
            self.attempts.lock().unwrap().push(ctx.attempt);
            if self.failures.fetch_sub(1, Ordering::SeqCst) > 0 {
                return Err(JobError::Network("connection reset".into()));
            }
            Ok(Value::Null)
        }
    }

    let attempts = Arc::new(Mutex::new(Vec::new()));
    let flaky = Flaky {
        failures: AtomicUsize::new(2),
        attempts: Arc::clone(&attempts),
    };
    let options = SchedulerOptions {
        max_attempts: 3,
        ..one_shot(1)
    };
    let summary = Scheduler::new(
        JobTable::new(vec![JobDefinition::new("flaky", 0, Arc::new(flaky))])
            .unwrap()
            .route(&[])
            .route,
        PacingPolicy::immediate(),
        options,
    )
    .run(accounts(1), CancellationToken::new())
    .await;

    assert_eq!(stats(&summary, "flaky"), (1, 0, 0));
    assert_eq!(*attempts.lock().unwrap(), vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn non_retriable_failure_is_not_retried_and_timeout_is() {
    let probe = Arc::new(Probe::default());
    let accts = accounts(1);
    let options = SchedulerOptions {
        max_attempts: 2,
        job_timeout: Some(Duration::from_secs(1)),
        ..one_shot(1)
    };
    let summary = scheduler(
        vec![
            def(
                Step::new("auth", &probe).failing_for(&accts[0].id, JobError::Auth("401".into())),
                10,
            ),
            def(Step::new("hang", &probe).taking(Duration::from_secs(30)), 0),
        ],
        options,
    )
    .run(accts.clone(), CancellationToken::new())
    .await;

    let calls: Vec<(String, u32)> = probe
        .calls()
        .into_iter()
        .map(|(_, j, _, attempt)| (j.to_string(), attempt))
        .collect();
    assert_eq!(
        calls,
        vec![
            ("auth".to_string(), 1),
            ("hang".to_string(), 1),
            ("hang".to_string(), 2),
        ]
    );
    assert_eq!(stats(&summary, "hang"), (0, 0, 1));
    let errors = &summary.jobs[&JobId::from("hang")].recent_errors;
    assert!(errors[0].ends_with("timed out after 1000ms"));
}

#[tokio::test(start_paused = true)]
async fn fatal_error_excludes_the_account() {
    let probe = Arc::new(Probe::default());
    let accts = accounts(2);
    let bad = accts[0].id.clone();
    let sched = scheduler(
        vec![
            def(
                Step::new("sign", &probe).failing_for(&bad, JobError::Fatal("key unusable".into())),
                10,
            ),
            def(Step::new("other", &probe), 0),
        ],
        one_shot(2),
    );
    let summary = sched.run(accts.clone(), CancellationToken::new()).await;

    assert!(summary.accounts[&bad].excluded);
    assert_eq!(summary.excluded_accounts(), 1);
    assert_eq!(probe.jobs_for(&bad), vec![("sign".to_string(), 1)]);
    assert_eq!(stats(&summary, "other"), (1, 0, 0));
    assert_eq!(summary.cycles_completed, 1);
}

#[tokio::test(start_paused = true)]
async fn missing_account_field_is_skipped() {
    struct NeedsTwitter;

    #[async_trait]
    impl JobHandler for NeedsTwitter {
        fn requirements(&self) -> &[AccountField] {
            &[AccountField::TwitterToken]
        }

        async fn execute(&self, account: &Account, _: &CycleContext) -> Result<Value, JobError> {
            Ok(json!(account.twitter_token))
        }
    }

    let key = |c: char| std::iter::repeat(c).take(64).collect::<String>();
    let registry = AccountRegistry::from_records(vec![
        RawRecord::with_key(1, key('a')),
        RawRecord {
            twitter_token: "tw-token".into(),
            ..RawRecord::with_key(2, key('b'))
        },
    ]);
    let summary = scheduler(
        vec![JobDefinition::new("follow", 0, Arc::new(NeedsTwitter))],
        one_shot(2),
    )
    .run(registry.accounts().to_vec(), CancellationToken::new())
    .await;

    assert_eq!(stats(&summary, "follow"), (1, 1, 0));
    assert_eq!(skips(&summary, "follow", "missing-field"), 1);
}

#[tokio::test(start_paused = true)]
async fn payloads_flow_to_later_jobs_in_the_cycle() {
    struct Reader {
        seen: Arc<Mutex<Vec<Option<Value>>>>,
    }

    #[async_trait]
    impl JobHandler for Reader {
        async fn execute(&self, _: &Account, ctx: &CycleContext) -> Result<Value, JobError> {
            self.seen
                .lock()
                .unwrap()
                .push(ctx.payload(&JobId::from("first")).cloned());
            Ok(Value::Null)
        }
    }

    let probe = Arc::new(Probe::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    scheduler(
        vec![
            def(Step::new("first", &probe), 10),
            JobDefinition::new("second", 0, Arc::new(Reader { seen: Arc::clone(&seen) })),
        ],
        one_shot(1),
    )
    .run(accounts(1), CancellationToken::new())
    .await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![Some(json!({ "job": "first", "cycle": 1 }))]
    );
}

#[tokio::test(start_paused = true)]
async fn closed_window_delays_the_first_cycle() {
    let started = Arc::new(Mutex::new(None));

    struct Stamp(Arc<Mutex<Option<Instant>>>);

    #[async_trait]
    impl JobHandler for Stamp {
        async fn execute(&self, _: &Account, _: &CycleContext) -> Result<Value, JobError> {
            *self.0.lock().unwrap() = Some(Instant::now());
            Ok(Value::Null)
        }
    }

    let origin = Instant::now();
    let clock = VirtualClock {
        base: Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap(),
        origin,
    };
    let hm = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap();
    let options = SchedulerOptions {
        window: RouteWindow::new(hm(9), hm(17)),
        ..one_shot(1)
    };
    scheduler(vec![JobDefinition::new("stamp", 0, Arc::new(Stamp(Arc::clone(&started))))], options)
        .with_clock(Arc::new(clock))
        .run(accounts(1), CancellationToken::new())
        .await;

    let at = started.lock().unwrap().expect("job ran");
    let waited = at.duration_since(origin);
    assert!(waited >= Duration::from_secs(3600) && waited < Duration::from_secs(3610));
}

#[tokio::test(start_paused = true)]
async fn cycle_never_starts_after_window_closed_while_queued() {
    struct Stamp {
        clock: Arc<VirtualClock>,
        starts: Arc<Mutex<Vec<DateTime<Utc>>>>,
    }

    #[async_trait]
    impl JobHandler for Stamp {
        async fn execute(&self, _: &Account, _: &CycleContext) -> Result<Value, JobError> {
            self.starts.lock().unwrap().push(self.clock.now());
            tokio::time::sleep(Duration::from_secs(20 * 60)).await;
            Ok(Value::Null)
        }
    }

    let clock = Arc::new(VirtualClock {
        base: Utc.with_ymd_and_hms(2025, 5, 1, 16, 50, 0).unwrap(),
        origin: Instant::now(),
    });
    let starts = Arc::new(Mutex::new(Vec::new()));
    let hm = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap();
    let window = RouteWindow::new(hm(9), hm(17));
    let options = SchedulerOptions {
        window,
        ..one_shot(1)
    };
    let handler = Stamp {
        clock: Arc::clone(&clock),
        starts: Arc::clone(&starts),
    };
    let summary = scheduler(vec![JobDefinition::new("stamp", 0, Arc::new(handler))], options)
        .with_clock(clock)
        .run(accounts(2), CancellationToken::new())
        .await;

    assert_eq!(summary.job_total(&JobId::from("stamp")), 2);
    let starts = starts.lock().unwrap().clone();
    assert_eq!(starts[0], Utc.with_ymd_and_hms(2025, 5, 1, 16, 50, 0).unwrap());
    // The second account got its slot at 17:10 and waited for the next window.
    let next_open = Utc.with_ymd_and_hms(2025, 5, 2, 9, 0, 0).unwrap();
    assert!(starts[1] >= next_open && starts[1] < next_open + chrono::Duration::minutes(1));
    for at in &starts {
        assert!(window.is_open(*at), "cycle started outside window at {at}");
    }
}

#[tokio::test(start_paused = true)]
async fn rejected_accounts_never_reach_the_scheduler() {
    let probe = Arc::new(Probe::default());
    let good = std::iter::repeat('7').take(64).collect::<String>();
    let registry = AccountRegistry::from_records(vec![
        RawRecord::with_key(1, good.clone()),
        RawRecord::with_key(2, "not-a-key"),
        RawRecord::with_key(3, good),
        RawRecord {
            proxy: "gopher://x:1".into(),
            ..RawRecord::with_key(4, std::iter::repeat('8').take(64).collect::<String>())
        },
    ]);
    assert_eq!(registry.rejected().len(), 3);

    let summary = scheduler(vec![def(Step::new("ping", &probe), 0)], one_shot(4))
        .run(registry.accounts().to_vec(), CancellationToken::new())
        .await;

    let valid: Vec<AccountId> = registry.accounts().iter().map(|a| a.id.clone()).collect();
    let scheduled: Vec<AccountId> = summary.accounts.keys().cloned().collect();
    assert_eq!(scheduled, valid);
    assert_eq!(probe.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn notifier_failure_is_not_fatal_and_store_records_summaries() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("summaries.db");
    let probe = Arc::new(Probe::default());

    let sched = scheduler(vec![def(Step::new("ping", &probe), 0)], one_shot(1))
        .with_notifier(Arc::new(BrokenNotifier))
        .with_store(SummaryStore::open(&db).unwrap());
    let run_id = sched.run_id().to_string();
    let summary = sched.run(accounts(2), CancellationToken::new()).await;

    assert_eq!(summary.total_outcomes, 2);
    let store = SummaryStore::open(&db).unwrap();
    assert_eq!(store.count(&run_id).unwrap(), 1);
    let latest: HashMap<JobId, _> = store.latest_job_stats(&run_id).unwrap().into_iter().collect();
    assert_eq!(latest[&JobId::from("ping")].success, 2);
}

#[tokio::test(start_paused = true)]
async fn snapshot_during_run_matches_final_accounting() {
    let probe = Arc::new(Probe::default());
    let sched = scheduler(
        vec![
            def(Step::new("a", &probe).taking(Duration::from_secs(1)), 1),
            def(Step::new("b", &probe).taking(Duration::from_secs(1)), 0),
        ],
        one_shot(2),
    );
    let aggregator = sched.aggregator();
    let handle = tokio::spawn(sched.run(accounts(4), CancellationToken::new()));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    let mid = aggregator.snapshot();
    let summary = handle.await.unwrap();

    assert_eq!(mid.total_outcomes, 2);
    assert_eq!(summary.total_outcomes, 8);
    let counted: usize = summary.jobs.values().map(|j| j.total()).sum();
    assert_eq!(counted, summary.total_outcomes);
}
