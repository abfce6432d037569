use super::import::render_report;
use crate::output::Output;
use chrono::Utc;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use poster_sync_config::PathManager;
use poster_sync_core::{AutoImportScheduler, ImportPipeline, RunContext, SweepReport};
use poster_sync_models::{Library, LibraryType, MediaType, OverwriteOption, RemoteItem};
use poster_sync_sources::PosterSource;
use tracing::debug;

pub async fn run_import_show(
    show: String,
    library: Option<String>,
    overwrite: Option<OverwriteOption>,
    output: &Output,
) -> Result<()> {
    let paths: PathManager = super::paths();
    let (config, source) = super::open_source(&paths)?;
    let mut ctx = RunContext::from_config(&config, &paths);
    let overwrite = overwrite.unwrap_or(ctx.settings.overwrite);

    let scheduler = AutoImportScheduler::from_config(&config.scheduler_or_default(), &paths);
    let Some(_lock) = scheduler.acquire_lock(Utc::now())? else {
        return Err(eyre!("Another import is already running"));
    };

    let library = find_library(source.as_ref(), library.as_deref()).await?;
    let remote_show = find_show(source.as_ref(), &library, &show, ctx.settings.page_size)
        .await?
        .ok_or_else(|| eyre!("No show matching '{}' in library '{}'", show, library.title))?;
    output.info(format!("Importing seasons of {} from {}", remote_show.title, library.title));

    let started_at = Utc::now();
    let report = ImportPipeline::new(source.as_ref())
        .import_show_seasons(&mut ctx, &library, &remote_show, overwrite)
        .await?;
    ctx.registry.sync()?;

    let sweep = SweepReport {
        started_at,
        finished_at: Utc::now(),
        runs: vec![report],
        failures: Vec::new(),
    };
    render_report(&sweep, output)
}

async fn find_library(source: &dyn PosterSource, title: Option<&str>) -> Result<Library> {
    let libraries = source.list_libraries().await?;
    let found = match title {
        Some(title) => libraries
            .into_iter()
            .find(|l| l.library_type == LibraryType::Show && l.title.eq_ignore_ascii_case(title)),
        None => libraries.into_iter().find(|l| l.library_type == LibraryType::Show),
    };
    found.ok_or_else(|| match title {
        Some(title) => eyre!("No TV library named '{}'", title),
        None => eyre!("The server has no TV library"),
    })
}

/// Page through the library until an item matches by id or title
async fn find_show(
    source: &dyn PosterSource,
    library: &Library,
    wanted: &str,
    page_size: usize,
) -> Result<Option<RemoteItem>> {
    let page_size = page_size.max(1);
    let mut offset = 0;
    loop {
        let page = source.list_items(library, MediaType::Show, offset, page_size).await?;
        debug!("Searching {} shows at offset {}", page.items.len(), offset);
        let returned = page.items.len();
        if let Some(show) = page
            .items
            .into_iter()
            .find(|item| item.id == wanted || item.title.eq_ignore_ascii_case(wanted))
        {
            return Ok(Some(show));
        }
        offset += returned;
        let exhausted = returned < page_size || page.total_count.is_some_and(|total| offset >= total);
        if returned == 0 || exhausted {
            return Ok(None);
        }
    }
}
