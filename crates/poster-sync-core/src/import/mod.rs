//! Batch import pipeline
//!
//! A run imports one media type from one library. It advances one remote page
//! per batch, and everything needed to continue lives in [`RunState`], so a run
//! can be driven in-process by [`ImportPipeline::run_to_completion`] or as a
//! series of independent calls to [`ImportPipeline::run_batch`].

use poster_sync_models::{Library, MediaType, OverwriteOption, RemoteItem};
use poster_sync_sources::PosterSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::filename::validate_filename;
use crate::orphan::{finish_run, OrphanReconciler, OrphanResult, ReconcileKey, ReconcileScope};
use crate::{FilenameCodec, ImportError, RunContext};


const MAX_COPY_VARIANTS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Target existed and the run asked to skip existing files
    SkipOption,
    /// Downloaded bytes matched the file already on disk
    Unchanged,
    /// The server has no artwork for the item
    NoArtwork,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Successful { filename: String },
    Skipped { filename: String, reason: SkipReason },
    Renamed { from: String, to: String },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub item_id: String,
    pub title: String,
    pub message: String,
}

/// Counts for one batch
///
/// `unchanged` is the subset of `skipped` whose bytes matched the existing file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub successful: usize,
    pub skipped: usize,
    pub unchanged: usize,
    pub renamed: usize,
    pub failed: usize,
    pub errors: Vec<ItemError>,
    /// Ids confirmed by this batch; failed items are never included
    pub imported_ids: Vec<String>,
    pub failed_ids: Vec<String>,
}

impl BatchResult {
    fn record(&mut self, item: &RemoteItem, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Successful { .. } => self.successful += 1,
            ItemOutcome::Skipped { reason, .. } => {
                self.skipped += 1;
                if reason == SkipReason::Unchanged {
                    self.unchanged += 1;
                }
            }
            ItemOutcome::Renamed { .. } => self.renamed += 1,
            ItemOutcome::Failed { message } => {
                warn!("Failed to import '{}' [{}]: {}", item.title, item.id, message);
                self.failed += 1;
                self.failed_ids.push(item.id.clone());
                self.errors.push(ItemError {
                    item_id: item.id.clone(),
                    title: item.title.clone(),
                    message,
                });
                return;
            }
        }
        self.imported_ids.push(item.id.clone());
    }

    pub fn processed(&self) -> usize {
        self.successful + self.skipped + self.renamed + self.failed
    }
}

/// Remote paging position of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCursor {
    pub offset: usize,
    pub total: Option<usize>,
    pub exhausted: bool,
}

impl ImportCursor {
    pub fn start() -> Self {
        Self::default()
    }

    /// Step past a page; a short page, an empty page or reaching the total ends the listing
    pub fn advance(&mut self, returned: usize, requested: usize, total: Option<usize>) {
        self.offset += returned;
        if total.is_some() {
            self.total = total;
        }
        let reached_total = self.total.map_or(false, |t| self.offset >= t);
        if returned == 0 || returned < requested || reached_total {
            self.exhausted = true;
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub successful: usize,
    pub skipped: usize,
    pub unchanged: usize,
    pub renamed: usize,
    pub failed: usize,
    pub batches: usize,
}

/// Everything carried from one batch of a run to the next
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunState {
    pub cursor: ImportCursor,
    pub totals: RunTotals,
    /// Ids confirmed so far in this run, written as the library's whole entry after every batch
    pub imported_ids: BTreeSet<String>,
    pub errors: Vec<ItemError>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    fn absorb(&mut self, batch: &BatchResult) {
        self.totals.successful += batch.successful;
        self.totals.skipped += batch.skipped;
        self.totals.unchanged += batch.unchanged;
        self.totals.renamed += batch.renamed;
        self.totals.failed += batch.failed;
        self.totals.batches += 1;
        self.imported_ids.extend(batch.imported_ids.iter().cloned());
        self.errors.extend(batch.errors.iter().cloned());
    }
}

/// One (library, media type) run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSpec {
    pub library: Library,
    pub media_type: MediaType,
    pub overwrite: OverwriteOption,
    /// Last library of its reconciliation key in this sweep; finishing it reconciles
    pub is_last_of_type: bool,
}

impl RunSpec {
    pub fn new(library: Library, media_type: MediaType) -> Self {
        Self {
            library,
            media_type,
            overwrite: OverwriteOption::default(),
            is_last_of_type: true,
        }
    }

    pub fn with_overwrite(mut self, overwrite: OverwriteOption) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn last_of_type(mut self, is_last: bool) -> Self {
        self.is_last_of_type = is_last;
        self
    }

    pub fn reconcile_key(&self) -> ReconcileKey {
        ReconcileKey::for_run(self.media_type, self.library.library_type)
    }
}

#[derive(Debug, Clone)]
pub struct BatchStep {
    pub batch: BatchResult,
    pub state: RunState,
    pub finished: bool,
    /// Set when this batch finished the designated last run of its key
    pub orphans: Option<OrphanResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub library_id: String,
    pub library_title: String,
    pub media_type: MediaType,
    pub totals: RunTotals,
    pub errors: Vec<ItemError>,
    pub valid_ids: usize,
    pub orphans: Option<OrphanResult>,
}

impl RunReport {
    fn new(run: &RunSpec, state: RunState, orphans: Option<OrphanResult>) -> Self {
        Self {
            library_id: run.library.id.clone(),
            library_title: run.library.title.clone(),
            media_type: run.media_type,
            totals: state.totals,
            errors: state.errors,
            valid_ids: state.imported_ids.len(),
            orphans,
        }
    }
}

/// Progress hooks for front ends
pub trait ImportObserver: Send {
    fn run_started(&mut self, _run: &RunSpec) {}
    fn batch_finished(&mut self, _run: &RunSpec, _step: &BatchStep) {}
    fn run_finished(&mut self, _run: &RunSpec, _report: &RunReport) {}
    fn run_failed(&mut self, _run: &RunSpec, _error: &ImportError) {}
}

pub struct NoopObserver;

impl ImportObserver for NoopObserver {}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

pub struct ImportPipeline<'a> {
    source: &'a dyn PosterSource,
}

impl<'a> ImportPipeline<'a> {
    pub fn new(source: &'a dyn PosterSource) -> Self {
        Self { source }
    }

    /// Import one remote page of a run
    ///
    /// A failed batch marks the run's reconciliation key so the sweep never
    /// orphans files on the strength of an incomplete listing.
    pub async fn run_batch(
        &self,
        ctx: &mut RunContext,
        run: &RunSpec,
        state: RunState,
    ) -> Result<BatchStep, ImportError> {
        let key = run.reconcile_key();
        ctx.tracker.begin(key);
        match self.advance(ctx, run, state).await {
            Ok(step) => Ok(step),
            Err(e) => {
                warn!(
                    operation = "import_batch",
                    library = %run.library.title,
                    media_type = %run.media_type,
                    error = %e,
                    "Import run aborted"
                );
                ctx.tracker.taint(key);
                if run.is_last_of_type {
                    ctx.tracker.complete_run(key, true);
                }
                Err(e)
            }
        }
    }

    pub async fn run_to_completion(&self, ctx: &mut RunContext, run: &RunSpec) -> Result<RunReport, ImportError> {
        self.run_observed(ctx, run, &mut NoopObserver).await
    }

    /// Drive a run page by page until the listing is exhausted
    pub async fn run_observed(
        &self,
        ctx: &mut RunContext,
        run: &RunSpec,
        observer: &mut dyn ImportObserver,
    ) -> Result<RunReport, ImportError> {
        info!(
            operation = "import_run",
            library = %run.library.title,
            media_type = %run.media_type,
            last_of_type = run.is_last_of_type,
            "Starting import run"
        );
        observer.run_started(run);

        let mut state = RunState::new();
        loop {
            let step = match self.run_batch(ctx, run, state).await {
                Ok(step) => step,
                Err(e) => {
                    observer.run_failed(run, &e);
                    return Err(e);
                }
            };
            observer.batch_finished(run, &step);
            if step.finished {
                let report = RunReport::new(run, step.state, step.orphans);
                info!(
                    operation = "import_run",
                    library = %report.library_title,
                    media_type = %report.media_type,
                    successful = report.totals.successful,
                    skipped = report.totals.skipped,
                    unchanged = report.totals.unchanged,
                    renamed = report.totals.renamed,
                    failed = report.totals.failed,
                    "Import run finished"
                );
                observer.run_finished(run, &report);
                return Ok(report);
            }
            state = step.state;
            pause(ctx.settings.batch_delay).await;
        }
    }

    async fn advance(&self, ctx: &mut RunContext, run: &RunSpec, mut state: RunState) -> Result<BatchStep, ImportError> {
        let media_type = run.media_type;
        let mut batch = BatchResult::default();

        if !state.cursor.is_exhausted() {
            let page_size = ctx.settings.page_size.max(1);
            let page = self
                .source
                .list_items(&run.library, media_type, state.cursor.offset, page_size)
                .await?;
            let returned = page.items.len();
            let total = page.total_count;

            let candidates = match media_type {
                MediaType::Season => {
                    let mut seasons = Vec::new();
                    for show in &page.items {
                        seasons.extend(self.collect_seasons(show, page_size).await?);
                    }
                    seasons
                }
                _ => page.items,
            };

            let dir = ctx.dirs.ensure(media_type)?;
            batch = self.process_items(ctx, run, &dir, &candidates).await;

            state.cursor.advance(returned, page_size, total);
            state.absorb(&batch);
            if state.cursor.is_exhausted() {
                // Whole listing seen: the stored entry becomes exactly this run's ids
                ctx.registry
                    .store_ids(state.imported_ids.iter().cloned(), media_type, &run.library.id, true)?;
            } else {
                ctx.registry
                    .store_ids(batch.imported_ids.iter().cloned(), media_type, &run.library.id, false)?;
            }
            ctx.registry.retain_failed(media_type, batch.failed_ids.iter().cloned());

            debug!(
                "{} {} batch at offset {}: {} processed, {} failed",
                run.library.title,
                media_type,
                state.cursor.offset,
                batch.processed(),
                batch.failed
            );
        }

        let finished = state.cursor.is_exhausted();
        let orphans = if finished {
            finish_run(ctx, run.reconcile_key(), run.is_last_of_type)?
        } else {
            None
        };

        Ok(BatchStep {
            batch,
            state,
            finished,
            orphans,
        })
    }

    /// Every season of a show, titled "<show> - <season>"
    ///
    /// The show name is the one the server reports on the season, falling back
    /// to the listed show's title.
    async fn collect_seasons(&self, show: &RemoteItem, page_size: usize) -> Result<Vec<RemoteItem>, ImportError> {
        let mut seasons = Vec::new();
        let mut cursor = ImportCursor::start();
        while !cursor.is_exhausted() {
            let page = self.source.list_children(&show.id, cursor.offset, page_size).await?;
            cursor.advance(page.items.len(), page_size, page.total_count);
            for season in page.items {
                let show_title = season.parent_title.unwrap_or_else(|| show.title.clone());
                seasons.push(RemoteItem {
                    id: season.id,
                    title: format!("{} - {}", show_title, season.title),
                    thumb_ref: season.thumb_ref,
                    parent_title: Some(show_title),
                });
            }
        }
        Ok(seasons)
    }

    async fn process_items(&self, ctx: &RunContext, run: &RunSpec, dir: &Path, items: &[RemoteItem]) -> BatchResult {
        let mut batch = BatchResult::default();
        let chunk_size = ctx.settings.write_batch_size.max(1);
        for (i, chunk) in items.chunks(chunk_size).enumerate() {
            if i > 0 {
                pause(ctx.settings.batch_delay).await;
            }
            for item in chunk {
                let outcome = self.process_item(ctx, run, dir, item).await;
                batch.record(item, outcome);
            }
        }
        batch
    }

    async fn process_item(&self, ctx: &RunContext, run: &RunSpec, dir: &Path, item: &RemoteItem) -> ItemOutcome {
        if !item.id.chars().any(|c| c.is_ascii_alphanumeric()) {
            return ItemOutcome::Failed {
                message: format!("item id '{}' cannot be encoded in a filename", item.id),
            };
        }

        let target = ctx.codec.encode(
            &item.title,
            &item.id,
            run.media_type,
            Some(run.library.library_type),
            &run.library.title,
        );
        let target_path = match ctx.dirs.resolve(run.media_type, &target) {
            Ok(path) => path,
            Err(e) => return ItemOutcome::Failed { message: e.to_string() },
        };

        if !target_path.exists() {
            if let Some(existing) = previous_name(&ctx.codec, run, item, &target, dir) {
                let from = dir.join(&existing);
                return match std::fs::rename(&from, &target_path) {
                    Ok(()) => {
                        debug!("Renamed {} -> {}", existing, target);
                        ItemOutcome::Renamed { from: existing, to: target }
                    }
                    Err(e) => ItemOutcome::Failed {
                        message: ImportError::filesystem(&from, e).to_string(),
                    },
                };
            }
        }

        if run.overwrite == OverwriteOption::Skip && target_path.exists() {
            return ItemOutcome::Skipped {
                filename: target,
                reason: SkipReason::SkipOption,
            };
        }

        let Some(thumb_ref) = item.thumb_ref.as_deref() else {
            return ItemOutcome::Skipped {
                filename: target,
                reason: SkipReason::NoArtwork,
            };
        };

        let write_path = if run.overwrite == OverwriteOption::Copy && target_path.exists() {
            match free_copy_path(dir, &target) {
                Some(path) => path,
                None => {
                    return ItemOutcome::Failed {
                        message: format!("no free copy name for {}", target),
                    }
                }
            }
        } else {
            target_path
        };

        let bytes = match self.source.fetch_image_bytes(thumb_ref).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return ItemOutcome::Failed {
                    message: ImportError::from(e).to_string(),
                }
            }
        };

        if run.overwrite == OverwriteOption::Overwrite {
            if let Ok(existing) = std::fs::read(&write_path) {
                if existing == bytes {
                    return ItemOutcome::Skipped {
                        filename: target,
                        reason: SkipReason::Unchanged,
                    };
                }
            }
        }

        match std::fs::write(&write_path, &bytes) {
            Ok(()) => ItemOutcome::Successful {
                filename: file_name(&write_path).unwrap_or(target),
            },
            Err(e) => ItemOutcome::Failed {
                message: ImportError::filesystem(&write_path, e).to_string(),
            },
        }
    }

    /// Import every season of one show and reconcile that show's season files
    ///
    /// Ids are unioned into the library's season entry rather than replacing
    /// it, since the other shows of the library were not listed.
    pub async fn import_show_seasons(
        &self,
        ctx: &mut RunContext,
        library: &Library,
        show: &RemoteItem,
        overwrite: OverwriteOption,
    ) -> Result<RunReport, ImportError> {
        let run = RunSpec::new(library.clone(), MediaType::Season).with_overwrite(overwrite);
        let page_size = ctx.settings.page_size.max(1);

        let seasons = self.collect_seasons(show, page_size).await?;
        let dir = ctx.dirs.ensure(MediaType::Season)?;
        let batch = self.process_items(ctx, &run, &dir, &seasons).await;

        let mut state = RunState::new();
        state.cursor.exhausted = true;
        state.absorb(&batch);

        ctx.registry
            .store_ids(batch.imported_ids.iter().cloned(), MediaType::Season, &library.id, false)?;
        ctx.registry.retain_failed(MediaType::Season, batch.failed_ids.iter().cloned());

        let mut valid: BTreeSet<String> = batch.imported_ids.iter().cloned().collect();
        valid.extend(ctx.registry.protected_ids(MediaType::Season));
        // Scope by the name the season files were written under
        let show_title = seasons
            .iter()
            .find_map(|season| season.parent_title.as_deref())
            .unwrap_or(&show.title);
        let orphans = OrphanReconciler::new(&ctx.codec, &dir).reconcile(&valid, &ReconcileScope::for_show(show_title))?;

        info!(
            operation = "import_show",
            show = %show_title,
            seasons = seasons.len(),
            orphaned = orphans.orphaned,
            "Show seasons imported"
        );
        Ok(RunReport::new(&run, state, Some(orphans)))
    }
}

/// An earlier name of the same item that can be renamed into place
///
/// Older imports wrote names without the library segment, and orphaned files
/// come back once their item reappears.
fn previous_name(codec: &FilenameCodec, run: &RunSpec, item: &RemoteItem, target: &str, dir: &Path) -> Option<String> {
    let mut candidates = Vec::new();
    if run.media_type != MediaType::Collection {
        let legacy = codec.encode(&item.title, &item.id, run.media_type, None, "");
        if legacy != target {
            candidates.push(legacy);
        }
    }
    let orphaned: Vec<String> = std::iter::once(target)
        .chain(candidates.iter().map(String::as_str))
        .filter_map(|name| codec.orphan(name))
        .collect();
    candidates.extend(orphaned);

    candidates
        .into_iter()
        .find(|name| validate_filename(name).is_ok() && dir.join(name).is_file())
}

fn free_copy_path(dir: &Path, target: &str) -> Option<PathBuf> {
    (1..=MAX_COPY_VARIANTS)
        .map(|n| dir.join(FilenameCodec::copy_variant(target, n)))
        .find(|path| !path.exists())
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().and_then(|n| n.to_str()).map(str::to_string)
}
