use super::prompts;
use crate::output::Output;
use crate::IdsCommands;
use chrono::Utc;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::{presets, Attribute, Cell, Table};
use poster_sync_config::PathManager;
use poster_sync_core::{AutoImportScheduler, IdRegistry, IdStore};
use poster_sync_models::MediaType;
use serde_json::json;

pub fn run_ids(cmd: IdsCommands, output: &Output) -> Result<()> {
    let paths = super::paths();
    match cmd {
        IdsCommands::Show { media_type } => show_ids(&paths, media_type, output),
        IdsCommands::Clear {
            media_type,
            library,
            yes,
        } => clear_ids(&paths, media_type, library, yes, output),
    }
}

fn show_ids(paths: &PathManager, only: Option<MediaType>, output: &Output) -> Result<()> {
    let store = IdStore::new(&paths.id_store_dir());
    let ids = store.load();
    let media_types: Vec<MediaType> = match only {
        Some(media_type) => vec![media_type],
        None => MediaType::ALL.to_vec(),
    };

    let mut rows = Vec::new();
    for media_type in &media_types {
        for library_id in ids.library_ids(*media_type) {
            let count = ids.library(*media_type, library_id).map(|set| set.len()).unwrap_or(0);
            rows.push((*media_type, library_id.to_string(), count));
        }
    }

    if !output.is_human() {
        let entries: Vec<_> = rows
            .iter()
            .map(|(media_type, library_id, count)| {
                json!({ "media_type": media_type, "library_id": library_id, "ids": count })
            })
            .collect();
        output.json(&json!({
            "path": store.path().display().to_string(),
            "size_bytes": store.size(),
            "entries": entries,
        }));
        return Ok(());
    }
    if output.is_quiet() {
        return Ok(());
    }

    if rows.is_empty() {
        output.info(format!("No ids stored yet in {}", store.path().display()));
        return Ok(());
    }
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL);
    table.set_header(
        ["Media type", "Library id", "Ids"]
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
    );
    for (media_type, library_id, count) in &rows {
        table.add_row(vec![Cell::new(media_type), Cell::new(library_id), Cell::new(count)]);
    }
    println!("{}", table);
    output.info(format!("{} ({} bytes)", store.path().display(), store.size()));
    Ok(())
}

fn clear_ids(
    paths: &PathManager,
    media_type: MediaType,
    library: Option<String>,
    yes: bool,
    output: &Output,
) -> Result<()> {
    let target = match &library {
        Some(id) => format!("{} ids of library {}", media_type, id),
        None => format!("all {} ids", media_type),
    };
    if !yes && !prompts::prompt_yes_no(&format!("Remove {}?", target), false)? {
        output.info("Nothing removed");
        return Ok(());
    }

    // Never clear underneath a running sweep
    let scheduler = AutoImportScheduler::new(paths.scheduler_dir(), "24h", false);
    let Some(_lock) = scheduler.acquire_lock(Utc::now())? else {
        return Err(eyre!("An import is running; try again when it has finished"));
    };

    let mut registry = IdRegistry::new(IdStore::new(&paths.id_store_dir()));
    registry.clear(media_type, library.as_deref())?;
    output.success(format!("Removed {}", target));
    Ok(())
}
