use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use poster_sync_core::{BatchStep, ImportError, ImportObserver, RunReport, RunSpec};
use std::io::IsTerminal;

pub fn is_interactive() -> bool {
    std::io::stdout().is_terminal() && std::io::stderr().is_terminal()
}

fn run_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
        .map(|style| style.progress_chars("█▉▊▋▌▍▎▏  "))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn label(run: &RunSpec) -> String {
    format!("{} / {}", run.library.title, run.media_type)
}

/// One progress bar per (library, media type) run; structured logs when not on a terminal
pub struct ImportProgress {
    multi: MultiProgress,
    current: Option<ProgressBar>,
    interactive: bool,
}

impl ImportProgress {
    pub fn new(enabled: bool) -> Self {
        let interactive = enabled && is_interactive();
        if !interactive {
            tracing::debug!(
                operation = "ui_init",
                mode = "non_interactive",
                "Progress bars disabled, using structured logging"
            );
        }
        Self {
            multi: MultiProgress::new(),
            current: None,
            interactive,
        }
    }
}

impl ImportObserver for ImportProgress {
    fn run_started(&mut self, run: &RunSpec) {
        if !self.interactive {
            return;
        }
        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(run_style());
        bar.set_message(format!("{}: listing...", label(run)));
        self.current = Some(bar);
    }

    fn batch_finished(&mut self, run: &RunSpec, step: &BatchStep) {
        let cursor = &step.state.cursor;
        let totals = &step.state.totals;
        match &self.current {
            Some(bar) => {
                let len = cursor.total.unwrap_or(cursor.offset) as u64;
                bar.set_length(len.max(cursor.offset as u64));
                bar.set_position(cursor.offset as u64);
                bar.set_message(format!(
                    "{}: {} new, {} skipped, {} failed",
                    label(run),
                    totals.successful,
                    totals.skipped,
                    totals.failed
                ));
            }
            None => tracing::info!(
                operation = "progress",
                library = %run.library.title,
                media_type = %run.media_type,
                offset = cursor.offset,
                total = ?cursor.total,
                successful = totals.successful,
                skipped = totals.skipped,
                failed = totals.failed,
                "Import progress update"
            ),
        }
    }

    fn run_finished(&mut self, run: &RunSpec, report: &RunReport) {
        if let Some(bar) = self.current.take() {
            let orphaned = report.orphans.as_ref().map(|o| o.orphaned).unwrap_or(0);
            bar.finish_with_message(format!(
                "{}: {} new, {} skipped, {} renamed, {} failed, {} orphaned",
                label(run),
                report.totals.successful,
                report.totals.skipped,
                report.totals.renamed,
                report.totals.failed,
                orphaned
            ));
        }
    }

    fn run_failed(&mut self, run: &RunSpec, error: &ImportError) {
        if let Some(bar) = self.current.take() {
            bar.abandon_with_message(format!("{}: failed: {}", label(run), error));
        }
    }
}
