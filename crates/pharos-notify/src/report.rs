//! Plain-text run report shared by every notifier.

use pharos_core::{JobStats, RunSummary};

const RULE_WIDTH: usize = 40;

/// Render `summary` as header, global statistics and per-job statistics.
pub fn render_report(summary: &RunSummary) -> String {
    let mut lines = Vec::new();
    header(summary, &mut lines);
    global_statistics(summary, &mut lines);
    job_statistics(summary, &mut lines);
    lines.join("\n")
}

fn header(summary: &RunSummary, lines: &mut Vec<String>) {
    let rule = "=".repeat(RULE_WIDTH);
    lines.push(rule.clone());
    lines.push(format!("📊 PHAROS ROUTE REPORT · run {}", short_run_id(&summary.run_id)));
    lines.push(format!(
        "Cycles completed: {} · outcomes: {}",
        summary.cycles_completed, summary.total_outcomes
    ));
    lines.push(format!(
        "Generated: {}",
        summary.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    lines.push(rule);
}

fn global_statistics(summary: &RunSummary, lines: &mut Vec<String>) {
    let total = summary.accounts.len();
    let ok = summary.successful_accounts();
    let rate = summary.account_success_rate();
    let failure_rate = if total == 0 { 0.0 } else { round2(100.0 - rate) };

    lines.push("GENERAL STATISTICS:".to_string());
    lines.push(format!("✅ Successful accounts: {ok}/{total} ({rate}%)"));
    lines.push(format!(
        "❌ Unsuccessful accounts: {}/{total} ({failure_rate}%)",
        total - ok
    ));
    let excluded = summary.excluded_accounts();
    if excluded > 0 {
        lines.push(format!("⛔ Excluded accounts: {excluded}"));
    }
    lines.push("_".repeat(RULE_WIDTH));
}

fn job_statistics(summary: &RunSummary, lines: &mut Vec<String>) {
    if summary.jobs.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.push("📦 JOB STATISTICS:".to_string());

    for (job, stats) in &summary.jobs {
        lines.push(String::new());
        lines.push(format!("{} {job}:", status_mark(stats)));
        lines.push(format!(
            "  Successful: {}/{} ({}%)",
            stats.success,
            stats.total(),
            stats.success_rate()
        ));
        if stats.skipped > 0 {
            let reasons: Vec<String> = stats
                .skip_reasons
                .iter()
                .map(|(code, n)| format!("{code} {n}"))
                .collect();
            if reasons.is_empty() {
                lines.push(format!("  Skipped: {}", stats.skipped));
            } else {
                lines.push(format!("  Skipped: {} ({})", stats.skipped, reasons.join(", ")));
            }
        }
        if stats.failed > 0 {
            lines.push(format!("  Failed: {}", stats.failed));
            for error in &stats.recent_errors {
                lines.push(format!("    • {error}"));
            }
        }
    }
}

fn status_mark(stats: &JobStats) -> &'static str {
    if stats.total() == 0 || stats.success == 0 {
        "❌"
    } else if stats.success == stats.total() {
        "✅"
    } else {
        "⚠️"
    }
}

fn short_run_id(run_id: &str) -> &str {
    run_id.get(..8).unwrap_or(run_id)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
