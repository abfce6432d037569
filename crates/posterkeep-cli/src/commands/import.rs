use super::progress::ImportProgress;
use crate::output::Output;
use chrono::Utc;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::{presets, Attribute, Cell, Color, Table};
use poster_sync_core::{AutoImportScheduler, RunContext, SweepDriver, SweepReport};
use poster_sync_models::{MediaType, OverwriteOption};

pub async fn run_import(
    media_types: Vec<MediaType>,
    overwrite: Option<OverwriteOption>,
    libraries: Vec<String>,
    output: &Output,
) -> Result<()> {
    let paths = super::paths();
    let (config, source) = super::open_source(&paths)?;

    let mut ctx = RunContext::from_config(&config, &paths);
    let full_sweep = media_types.is_empty() && libraries.is_empty();
    if !media_types.is_empty() {
        ctx.settings.media_types = media_types;
    }
    if let Some(overwrite) = overwrite {
        ctx.settings.overwrite = overwrite;
    }
    if !libraries.is_empty() {
        ctx.settings.libraries = libraries;
    }

    // Manual sweeps share the lock with the scheduler
    let scheduler = AutoImportScheduler::from_config(&config.scheduler_or_default(), &paths);
    let Some(_lock) = scheduler.acquire_lock(Utc::now())? else {
        let since = scheduler
            .lock_holder_since()
            .map(|t| format!(" (started {})", t.format("%Y-%m-%d %H:%M:%S UTC")))
            .unwrap_or_default();
        return Err(eyre!("Another import is already running{}", since));
    };

    output.info(format!(
        "Importing posters from {} into {}",
        config.server.url,
        paths.posters_dir().display()
    ));

    let mut progress = ImportProgress::new(output.is_human() && !output.is_quiet());
    let report = SweepDriver::new(source.as_ref())
        .run_observed(&mut ctx, &mut progress)
        .await?;

    if full_sweep && report.is_success() {
        scheduler.record_success(report.finished_at)?;
    }

    render_report(&report, output)?;

    if report.is_success() {
        Ok(())
    } else {
        Err(eyre!("{} of the import runs failed", report.failures.len()))
    }
}

/// Per-run table in human mode, the whole report as JSON otherwise
pub fn render_report(report: &SweepReport, output: &Output) -> Result<()> {
    if !output.is_human() {
        output.json(&serde_json::to_value(report)?);
        return Ok(());
    }
    if output.is_quiet() {
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table.set_header(
        ["Library", "Type", "New", "Skipped", "Unchanged", "Renamed", "Failed", "Orphaned"]
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
    );
    for run in &report.runs {
        let orphaned = run.orphans.as_ref().map(|o| o.orphaned.to_string()).unwrap_or_else(|| "-".to_string());
        let failed = Cell::new(run.totals.failed);
        table.add_row(vec![
            Cell::new(&run.library_title),
            Cell::new(run.media_type),
            Cell::new(run.totals.successful).fg(Color::Green),
            Cell::new(run.totals.skipped),
            Cell::new(run.totals.unchanged),
            Cell::new(run.totals.renamed),
            if run.totals.failed > 0 { failed.fg(Color::Red) } else { failed },
            Cell::new(orphaned),
        ]);
    }
    for failure in &report.failures {
        table.add_row(vec![
            Cell::new(&failure.library_title),
            Cell::new(failure.media_type),
            Cell::new(format!("run failed: {}", failure.error)).fg(Color::Red),
        ]);
    }
    println!("{}", table);

    for run in &report.runs {
        for error in &run.errors {
            output.warn(format!("{} [{}]: {}", error.title, error.item_id, error.message));
        }
    }

    let totals = report.totals();
    let elapsed = report.finished_at - report.started_at;
    let summary = format!(
        "{} new, {} skipped, {} renamed, {} failed, {} orphaned in {}s",
        totals.successful,
        totals.skipped,
        totals.renamed,
        totals.failed,
        report.orphaned(),
        elapsed.num_seconds()
    );
    if report.is_success() {
        output.success(summary);
    } else {
        output.warn(summary);
    }
    Ok(())
}
