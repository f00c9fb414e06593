use std::path::Path;
use std::sync::Mutex;

use pharos_core::{JobId, JobStats, RunSummary};
use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;

/// Initialise the summary schema in `conn`.
///
/// One row per emitted summary in `run_summaries`, plus its per-job counters
/// in `job_summaries`. Both are append-only.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS run_summaries (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id              TEXT    NOT NULL,
            started_at          TEXT    NOT NULL,
            generated_at        TEXT    NOT NULL,
            cycles_completed    INTEGER NOT NULL,
            total_outcomes      INTEGER NOT NULL,
            accounts            INTEGER NOT NULL,
            successful_accounts INTEGER NOT NULL,
            excluded_accounts   INTEGER NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS job_summaries (
            summary_id    INTEGER NOT NULL REFERENCES run_summaries(id),
            job           TEXT    NOT NULL,
            success       INTEGER NOT NULL,
            skipped       INTEGER NOT NULL,
            failed        INTEGER NOT NULL,
            recent_errors TEXT    NOT NULL,   -- JSON array of strings
            skip_reasons  TEXT    NOT NULL,   -- JSON object: reason code -> count
            PRIMARY KEY (summary_id, job)
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_run_summaries_run ON run_summaries (run_id);
        ",
    )?;
    Ok(())
}

/// Durable pass/fail history. Writes are small and synchronous.
pub struct SummaryStore {
    conn: Mutex<Connection>,
}

impl SummaryStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Append `summary` and its job rows in one transaction.
    pub fn persist(&self, summary: &RunSummary) -> Result<()> {
        let mut conn = self.conn.lock().expect("summary store poisoned");
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO run_summaries
             (run_id, started_at, generated_at, cycles_completed, total_outcomes,
              accounts, successful_accounts, excluded_accounts)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            rusqlite::params![
                summary.run_id,
                summary.started_at.to_rfc3339(),
                summary.generated_at.to_rfc3339(),
                summary.cycles_completed as i64,
                summary.total_outcomes as i64,
                summary.accounts.len() as i64,
                summary.successful_accounts() as i64,
                summary.excluded_accounts() as i64,
            ],
        )?;
        let summary_id = tx.last_insert_rowid();

        for (job, stats) in &summary.jobs {
            tx.execute(
                "INSERT INTO job_summaries
                 (summary_id, job, success, skipped, failed, recent_errors, skip_reasons)
                 VALUES (?1,?2,?3,?4,?5,?6,?7)",
                rusqlite::params![
                    summary_id,
                    job.as_str(),
                    stats.success as i64,
                    stats.skipped as i64,
                    stats.failed as i64,
                    serde_json::to_string(&stats.recent_errors)?,
                    serde_json::to_string(&stats.skip_reasons)?,
                ],
            )?;
        }
        tx.commit()?;
        debug!(run_id = %summary.run_id, summary_id, "summary persisted");
        Ok(())
    }

    /// Number of summaries stored for `run_id`.
    pub fn count(&self, run_id: &str) -> Result<u64> {
        let conn = self.conn.lock().expect("summary store poisoned");
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM run_summaries WHERE run_id = ?1",
            [run_id],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    /// Per-job counters of the most recent summary stored for `run_id`.
    pub fn latest_job_stats(&self, run_id: &str) -> Result<Vec<(JobId, JobStats)>> {
        let conn = self.conn.lock().expect("summary store poisoned");
        let mut stmt = conn.prepare(
            "SELECT job, success, skipped, failed, recent_errors, skip_reasons
             FROM job_summaries
             WHERE summary_id = (SELECT MAX(id) FROM run_summaries WHERE run_id = ?1)
             ORDER BY job",
        )?;
        let rows = stmt
            .query_map([run_id], |row| {
                Ok((
                    row.get::<_, String>(0)?, // job
                    row.get::<_, i64>(1)?,    // success
                    row.get::<_, i64>(2)?,    // skipped
                    row.get::<_, i64>(3)?,    // failed
                    row.get::<_, String>(4)?, // recent_errors JSON
                    row.get::<_, String>(5)?, // skip_reasons JSON
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for (job, success, skipped, failed, errors, reasons) in rows {
            out.push((
                JobId(job),
                JobStats {
                    success: success as usize,
                    skipped: skipped as usize,
                    failed: failed as usize,
                    recent_errors: serde_json::from_str(&errors)?,
                    skip_reasons: serde_json::from_str(&reasons)?,
                },
            ));
        }
        Ok(out)
    }
}
