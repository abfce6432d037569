use super::import::render_report;
use crate::output::Output;
use chrono::Utc;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use poster_sync_config::{Config, PathManager};
use poster_sync_core::{AutoImportScheduler, RunContext, SweepDriver, TickOutcome};
use poster_sync_sources::PosterSource;

/// One scheduler tick against freshly loaded config and id store
pub async fn tick_once(
    config: &Config,
    paths: &PathManager,
    source: &dyn PosterSource,
    scheduler: &AutoImportScheduler,
) -> Result<TickOutcome> {
    let mut ctx = RunContext::from_config(config, paths);
    let ctx_ref = &mut ctx;
    let outcome = scheduler
        .tick(Utc::now(), move || async move { SweepDriver::new(source).run(ctx_ref).await })
        .await?;
    Ok(outcome)
}

pub async fn run_auto(force: bool, output: &Output) -> Result<()> {
    let paths = super::paths();
    let (config, source) = super::open_source(&paths)?;
    let scheduler_config = config.scheduler_or_default();

    if force {
        // Enabled or not, the interval is ignored; only the lock is honoured
        let scheduler = AutoImportScheduler::from_config(&scheduler_config, &paths);
        let Some(_lock) = scheduler.acquire_lock(Utc::now())? else {
            return Err(eyre!("Another import is already running"));
        };
        let mut ctx = RunContext::from_config(&config, &paths);
        let report = SweepDriver::new(source.as_ref()).run(&mut ctx).await?;
        if report.is_success() {
            scheduler.record_success(report.finished_at)?;
        }
        render_report(&report, output)?;
        return if report.is_success() {
            Ok(())
        } else {
            Err(eyre!("{} of the import runs failed", report.failures.len()))
        };
    }

    let scheduler = AutoImportScheduler::from_config(&scheduler_config, &paths);
    match tick_once(&config, &paths, source.as_ref(), &scheduler).await? {
        TickOutcome::Disabled => {
            output.info("Automatic import is disabled. Enable it with 'posterkeep config auto --enabled true'");
            Ok(())
        }
        TickOutcome::Locked { since } => {
            let since = since
                .map(|t| format!(" since {}", t.format("%Y-%m-%d %H:%M:%S UTC")))
                .unwrap_or_default();
            output.info(format!("Another import is running{}, nothing to do", since));
            Ok(())
        }
        TickOutcome::NotDue { next_run } => {
            output.info(format!("Next import due at {}", next_run.format("%Y-%m-%d %H:%M:%S UTC")));
            Ok(())
        }
        TickOutcome::Completed(report) => render_report(&report, output),
        TickOutcome::Incomplete(report) => {
            render_report(&report, output)?;
            Err(eyre!(
                "{} of the import runs failed; the sweep will be retried on the next tick",
                report.failures.len()
            ))
        }
        TickOutcome::Failed(message) => Err(eyre!("Automatic import failed: {}", message)),
    }
}
