use chrono::{DateTime, Utc};
use poster_sync_models::{Library, LibraryType, MediaType};
use poster_sync_sources::PosterSource;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{error, info, warn};

use crate::import::{ImportObserver, NoopObserver, RunTotals};
use crate::{ImportError, ImportPipeline, ImportSettings, ReconcileTracker, RunContext, RunReport, RunSpec};

fn supports(library_type: LibraryType, media_type: MediaType) -> bool {
    match media_type {
        MediaType::Movie => library_type == LibraryType::Movie,
        MediaType::Show | MediaType::Season => library_type == LibraryType::Show,
        MediaType::Collection => true,
    }
}

/// Order the runs of a sweep and mark the last run of every reconciliation key
pub fn plan_sweep(libraries: &[Library], settings: &ImportSettings) -> Vec<RunSpec> {
    let selected: Vec<&Library> = libraries
        .iter()
        .filter(|library| {
            settings.libraries.is_empty()
                || settings
                    .libraries
                    .iter()
                    .any(|title| title.eq_ignore_ascii_case(&library.title))
        })
        .collect();

    let mut plan = Vec::new();
    let mut seen_types = BTreeSet::new();
    for media_type in &settings.media_types {
        if !seen_types.insert(*media_type) {
            continue;
        }
        for library in &selected {
            if supports(library.library_type, *media_type) {
                plan.push(
                    RunSpec::new((*library).clone(), *media_type)
                        .with_overwrite(settings.overwrite)
                        .last_of_type(false),
                );
            }
        }
    }

    let mut keys = BTreeSet::new();
    for run in plan.iter_mut().rev() {
        if keys.insert(run.reconcile_key()) {
            run.is_last_of_type = true;
        }
    }
    plan
}

#[derive(Debug, Clone, Serialize)]
pub struct RunFailure {
    pub library_id: String,
    pub library_title: String,
    pub media_type: MediaType,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub runs: Vec<RunReport>,
    pub failures: Vec<RunFailure>,
}

impl SweepReport {
    /// Every planned run finished and every sync succeeded
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn totals(&self) -> RunTotals {
        self.runs.iter().fold(RunTotals::default(), |mut acc, run| {
            acc.successful += run.totals.successful;
            acc.skipped += run.totals.skipped;
            acc.unchanged += run.totals.unchanged;
            acc.renamed += run.totals.renamed;
            acc.failed += run.totals.failed;
            acc.batches += run.totals.batches;
            acc
        })
    }

    pub fn orphaned(&self) -> usize {
        self.runs
            .iter()
            .filter_map(|run| run.orphans.as_ref())
            .map(|orphans| orphans.orphaned)
            .sum()
    }
}

/// Runs the import pipeline over every (library, media type) pair of the server
pub struct SweepDriver<'a> {
    source: &'a dyn PosterSource,
}

impl<'a> SweepDriver<'a> {
    pub fn new(source: &'a dyn PosterSource) -> Self {
        Self { source }
    }

    pub async fn run(&self, ctx: &mut RunContext) -> Result<SweepReport, ImportError> {
        self.run_observed(ctx, &mut NoopObserver).await
    }

    /// A failed run is recorded and the sweep moves on; only configuration errors stop it
    pub async fn run_observed(
        &self,
        ctx: &mut RunContext,
        observer: &mut dyn ImportObserver,
    ) -> Result<SweepReport, ImportError> {
        let started_at = Utc::now();
        ctx.tracker = ReconcileTracker::new();

        let libraries = self.source.list_libraries().await?;
        let plan = plan_sweep(&libraries, &ctx.settings);
        if plan.is_empty() {
            warn!("No libraries match the configured media types");
        }
        info!(
            operation = "sweep",
            source = self.source.source_name(),
            libraries = libraries.len(),
            runs = plan.len(),
            "Starting sweep"
        );

        let pipeline = ImportPipeline::new(self.source);
        let mut runs = Vec::new();
        let mut failures = Vec::new();

        for run in &plan {
            match pipeline.run_observed(ctx, run, observer).await {
                Ok(report) => runs.push(report),
                Err(e) if e.aborts_sweep() => {
                    error!(operation = "sweep", error = %e, "Sweep aborted");
                    return Err(e);
                }
                Err(e) => failures.push(RunFailure {
                    library_id: run.library.id.clone(),
                    library_title: run.library.title.clone(),
                    media_type: run.media_type,
                    error: e.to_string(),
                }),
            }

            // Bound what a killed process can lose to one library
            if let Err(e) = ctx.registry.sync() {
                warn!("Failed to sync id store after {}: {}", run.library.title, e);
                failures.push(RunFailure {
                    library_id: run.library.id.clone(),
                    library_title: run.library.title.clone(),
                    media_type: run.media_type,
                    error: e.to_string(),
                });
            }
        }

        let report = SweepReport {
            started_at,
            finished_at: Utc::now(),
            runs,
            failures,
        };
        let totals = report.totals();
        info!(
            operation = "sweep",
            successful = totals.successful,
            skipped = totals.skipped,
            renamed = totals.renamed,
            failed = totals.failed,
            orphaned = report.orphaned(),
            failed_runs = report.failures.len(),
            "Sweep finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{item, test_context, FakeSource};
    use tempfile::TempDir;

    fn library(id: &str, title: &str, library_type: LibraryType) -> Library {
        Library {
            id: id.to_string(),
            title: title.to_string(),
            library_type,
        }
    }

    #[test]
    fn test_plan_marks_last_run_per_key() {
        let libraries = vec![
            library("1", "Movies", LibraryType::Movie),
            library("2", "Kids", LibraryType::Movie),
            library("3", "TV", LibraryType::Show),
        ];
        let plan = plan_sweep(&libraries, &ImportSettings::default());

        let summary: Vec<(MediaType, &str, bool)> = plan
            .iter()
            .map(|run| (run.media_type, run.library.id.as_str(), run.is_last_of_type))
            .collect();
        assert_eq!(
            summary,
            vec![
                (MediaType::Movie, "1", false),
                (MediaType::Movie, "2", true),
                (MediaType::Show, "3", true),
                (MediaType::Season, "3", true),
                (MediaType::Collection, "1", false),
                (MediaType::Collection, "2", true),
                (MediaType::Collection, "3", true),
            ]
        );
    }

    #[test]
    fn test_plan_filters_libraries() {
        let libraries = vec![
            library("1", "Movies", LibraryType::Movie),
            library("2", "Kids", LibraryType::Movie),
        ];
        let settings = ImportSettings {
            media_types: vec![MediaType::Movie, MediaType::Movie],
            libraries: vec!["movies".to_string()],
            ..ImportSettings::default()
        };
        let plan = plan_sweep(&libraries, &settings);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].library.id, "1");
        assert!(plan[0].is_last_of_type);
    }

    #[tokio::test]
    async fn test_two_library_sweep() {
        let temp_dir = TempDir::new().unwrap();
        let mut ctx = test_context(temp_dir.path());
        ctx.settings.media_types = vec![MediaType::Movie];
        let source = FakeSource::new()
            .with_library("A", "Movies", LibraryType::Movie)
            .with_library("B", "Kids", LibraryType::Movie)
            .with_items("A", MediaType::Movie, vec![item("10", "Ten"), item("11", "Eleven")])
            .with_items("B", MediaType::Movie, vec![item("12", "Twelve"), item("13", "Thirteen")]);
        let dir = temp_dir.path().join("posters").join("movies");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Gone [99] [[Movies]] **Plex**.jpg"), b"gone").unwrap();

        let report = SweepDriver::new(&source).run(&mut ctx).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.runs.len(), 2);
        assert_eq!(report.totals().successful, 4);
        assert_eq!(report.orphaned(), 1);
        let expected: BTreeSet<String> = ["10", "11", "12", "13"].iter().map(|s| s.to_string()).collect();
        assert_eq!(ctx.registry.all_valid_ids(MediaType::Movie), expected);
        assert_eq!(ctx.registry.store().load().ids_for(MediaType::Movie), expected);
        assert!(dir.join("Gone [99] [[Movies]] **Orphaned**.jpg").exists());
    }

    #[tokio::test]
    async fn test_failed_run_does_not_stop_sweep() {
        let temp_dir = TempDir::new().unwrap();
        let mut ctx = test_context(temp_dir.path());
        ctx.settings.media_types = vec![MediaType::Movie, MediaType::Show];
        let source = FakeSource::new()
            .with_library("A", "Movies", LibraryType::Movie)
            .with_library("T", "TV", LibraryType::Show)
            .with_items("T", MediaType::Show, vec![item("300", "Dark")])
            .fail_listing("A", MediaType::Movie);

        let report = SweepDriver::new(&source).run(&mut ctx).await.unwrap();

        assert!(!report.is_success());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].library_id, "A");
        assert_eq!(report.runs.len(), 1);
        assert!(ctx.registry.all_valid_ids(MediaType::Show).contains("300"));
    }

    #[tokio::test]
    async fn test_library_listing_failure_fails_sweep() {
        let temp_dir = TempDir::new().unwrap();
        let mut ctx = test_context(temp_dir.path());
        let source = FakeSource::new().fail_libraries();

        let err = SweepDriver::new(&source).run(&mut ctx).await.unwrap_err();
        assert!(matches!(err, ImportError::Transport(_)));
    }
}
