//! Wiring: configuration in, a ready scheduler and its accounts out.

use std::sync::Arc;

use pharos_accounts::{Account, AccountRegistry, CsvAccountSource, CsvRejectedSink};
use pharos_core::PharosConfig;
use pharos_notify::{LogNotifier, Notifier, TelegramNotifier};
use pharos_scheduler::{PacingPolicy, Scheduler, SchedulerOptions, SummaryStore};
use tracing::{info, warn};

pub struct App {
    pub scheduler: Scheduler,
    pub accounts: Vec<Arc<Account>>,
}

/// Everything that can fail here is fatal and happens before the first
/// account is scheduled.
pub fn build(config: &PharosConfig, seed: Option<u64>) -> anyhow::Result<App> {
    let source = CsvAccountSource::new(&config.accounts.path);
    let sink = CsvRejectedSink::new(&config.accounts.rejected_path);
    let registry = AccountRegistry::load(&source, &sink)?;

    let table = pharos_tasks::build_table(config)?;
    let selection = table.route(&config.route.tasks);
    if !selection.unknown.is_empty() {
        warn!(unknown = ?selection.unknown, "route names jobs missing from the catalog; ignored");
    }
    let route = selection.route;
    info!(jobs = ?route.ids(), "route resolved");

    let mut pacing = PacingPolicy::from_config(config)?;
    if let Some(seed) = seed {
        pacing = pacing.with_seed(seed);
    }

    let mut accounts = registry.accounts().to_vec();
    if config.accounts.shuffle {
        pacing.shuffle(&mut accounts);
    }

    let options = SchedulerOptions::from_config(config)?;
    let mut scheduler = Scheduler::new(route, pacing, options).with_notifier(notifier(config)?);

    if let Some(path) = &config.database.path {
        ensure_parent_dir(path);
        match SummaryStore::open(path) {
            Ok(store) => {
                info!(path = %path, "summary store opened");
                scheduler = scheduler.with_store(store);
            }
            Err(e) => warn!(path = %path, "summary store unavailable, continuing without it: {e}"),
        }
    }

    Ok(App {
        scheduler,
        accounts,
    })
}

fn notifier(config: &PharosConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    match (&config.telegram, config.send_stats_to_telegram) {
        (Some(tg), true) => {
            info!(chat_id = tg.chat_id, "reporting to telegram");
            Ok(Arc::new(TelegramNotifier::from_config(tg)?))
        }
        _ => Ok(Arc::new(LogNotifier)),
    }
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
