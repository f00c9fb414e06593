use clap::Parser;
use pharos_core::PharosConfig;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod app;

/// Runs every valid account through the configured job route.
#[derive(Parser, Debug)]
#[command(name = "pharos-runner", version)]
#[command(about = "Multi-account task runner with pacing, prerequisites and reporting")]
struct Cli {
    /// Configuration file (falls back to PHAROS_CONFIG, then config/pharos.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Seed the delay/shuffle RNG for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Run a single cycle per account, overriding route.repeat
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "pharos_runner=info,pharos_scheduler=info,pharos_accounts=info,pharos_notify=info,pharos_tasks=info".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    let mut config = PharosConfig::load(cli.config.as_deref()).map_err(|e| {
        error!(code = e.code(), "{e}");
        e
    })?;
    if cli.once {
        config.route.repeat = false;
    }

    let app = app::build(&config, cli.seed)?;
    if app.accounts.is_empty() {
        warn!("no valid accounts; nothing to schedule");
    }

    let token = CancellationToken::new();
    let watcher = token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        watcher.cancel();
    });

    let summary = app.scheduler.run(app.accounts, token).await;
    info!(
        run_id = %summary.run_id,
        cycles = summary.cycles_completed,
        outcomes = summary.total_outcomes,
        "pharos-runner finished"
    );
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl-C handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
