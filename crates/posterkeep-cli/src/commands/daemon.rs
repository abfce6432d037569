use super::auto::tick_once;
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use poster_sync_core::{AutoImportScheduler, TickOutcome};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};

/// One tick with config, credentials and id store reloaded from disk
async fn scheduled_tick() -> Result<()> {
    let paths = super::paths();
    let (config, source) = super::open_source(&paths)?;
    let scheduler = AutoImportScheduler::from_config(&config.scheduler_or_default(), &paths);

    match tick_once(&config, &paths, source.as_ref(), &scheduler).await? {
        TickOutcome::Disabled => debug!(operation = "scheduled_tick", "Automatic import disabled"),
        TickOutcome::Locked { since } => {
            info!(operation = "scheduled_tick", since = ?since, "Import already running, skipping tick")
        }
        TickOutcome::NotDue { next_run } => {
            debug!(operation = "scheduled_tick", next_run = %next_run, "No import due")
        }
        TickOutcome::Completed(report) => {
            let totals = report.totals();
            info!(
                operation = "scheduled_import_complete",
                successful = totals.successful,
                skipped = totals.skipped,
                renamed = totals.renamed,
                failed = totals.failed,
                orphaned = report.orphaned(),
                duration_ms = (report.finished_at - report.started_at).num_milliseconds(),
                "Scheduled import completed successfully"
            );
        }
        TickOutcome::Incomplete(report) => {
            for failure in &report.failures {
                warn!(
                    operation = "scheduled_import_incomplete",
                    library = %failure.library_title,
                    media_type = %failure.media_type,
                    error = %failure.error,
                    "Import run failed"
                );
            }
        }
        TickOutcome::Failed(message) => {
            error!(operation = "scheduled_import_error", error = %message, "Scheduled import failed")
        }
    }
    Ok(())
}

async fn logged_tick() {
    if let Err(e) = scheduled_tick().await {
        error!(operation = "scheduled_tick", error = %e, "Scheduler tick failed");
    }
}

/// Run in the foreground until interrupted; containers keep this as their main process
pub async fn run_daemon(schedule_override: Option<String>, no_startup_tick: bool, output: &Output) -> Result<()> {
    let paths = super::paths();
    let config = super::load_config(&paths)?;
    paths
        .ensure_directories()
        .map_err(|e| eyre!("Failed to create data directories: {}", e))?;

    let scheduler_config = config.scheduler_or_default();
    let schedule = schedule_override.unwrap_or_else(|| scheduler_config.tick_schedule.clone());
    if !scheduler_config.enabled {
        output.warn("Automatic import is disabled in config.toml; ticks will do nothing until it is enabled");
    }

    let mut sched = JobScheduler::new()
        .await
        .map_err(|e| eyre!("Failed to create scheduler: {}", e))?;
    let job = Job::new_async(schedule.as_str(), |_uuid, _lock| Box::pin(logged_tick()))
        .map_err(|e| eyre!("Invalid tick schedule '{}': {}", schedule, e))?;
    sched
        .add(job)
        .await
        .map_err(|e| eyre!("Failed to add scheduler job: {}", e))?;

    if scheduler_config.run_on_startup && !no_startup_tick {
        info!(operation = "scheduler_startup", "Running initial tick on startup");
        logged_tick().await;
    }

    sched
        .start()
        .await
        .map_err(|e| eyre!("Failed to start scheduler: {}", e))?;
    info!(
        operation = "scheduler_started",
        schedule = %schedule,
        interval = %scheduler_config.interval,
        log_file = %paths.daemon_log_file().display(),
        "Scheduler started"
    );
    output.info(format!(
        "posterkeep daemon running (schedule '{}'), logs in {}",
        schedule,
        paths.log_dir().display()
    ));

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| eyre!("Failed to listen for shutdown signal: {}", e))?;
    info!(operation = "scheduler_stopping", "Shutdown requested");
    sched
        .shutdown()
        .await
        .map_err(|e| eyre!("Failed to stop scheduler: {}", e))?;
    Ok(())
}
