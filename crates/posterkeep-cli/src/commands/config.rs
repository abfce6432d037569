use super::prompts;
use crate::output::Output;
use crate::ConfigCommands;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::{presets, Attribute, Cell, Color, Table};
use owo_colors::OwoColorize;
use poster_sync_config::{default_scheduler_config, Config, PathManager};
use poster_sync_core::parse_interval;
use poster_sync_models::ServerKind;
use serde_json::json;

pub fn run_config(cmd: ConfigCommands, output: &Output) -> Result<()> {
    let paths = super::paths();
    match cmd {
        ConfigCommands::Show => show_config(&paths, output),
        ConfigCommands::Server { kind, url } => configure_server(&paths, kind, url, output),
        ConfigCommands::Token { token } => configure_token(&paths, token, output),
        ConfigCommands::Auto { enabled, interval } => configure_auto(&paths, enabled, interval, output),
    }
}

fn mask_string(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

fn load_existing(paths: &PathManager) -> Result<Option<Config>> {
    let config_file = paths.config_file();
    if !config_file.exists() {
        return Ok(None);
    }
    Config::load_from_file(&config_file)
        .map(Some)
        .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))
}

fn save(paths: &PathManager, config: &Config) -> Result<()> {
    let config_file = paths.config_file();
    config
        .save_to_file(&config_file)
        .map_err(|e| eyre!("Failed to save config to {}: {}", config_file.display(), e))
}

fn show_config(paths: &PathManager, output: &Output) -> Result<()> {
    let Some(config) = load_existing(paths)? else {
        output.warn(format!("Configuration file not found at: {}", paths.config_file().display()));
        output.info("Create it with 'posterkeep config server --kind plex --url <URL>'");
        return Ok(());
    };
    let credentials = super::load_credentials(paths)?;
    let token = credentials.get_server_token(config.server.kind).map(|t| mask_string(t));
    let scheduler = config.scheduler_or_default();

    if !output.is_human() {
        output.json(&json!({
            "config_file": paths.config_file().display().to_string(),
            "server": {
                "kind": config.server.kind,
                "url": config.server.url,
                "token": token,
            },
            "import": config.import,
            "scheduler": scheduler,
            "posters_dir": paths.posters_dir().display().to_string(),
            "log_dir": paths.log_dir().display().to_string(),
        }));
        return Ok(());
    }
    if output.is_quiet() {
        return Ok(());
    }

    println!("\n{}", "Configuration".bright_cyan().bold());
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table.set_header(vec![
        Cell::new("Setting").add_attribute(Attribute::Bold),
        Cell::new("Value").add_attribute(Attribute::Bold),
    ]);
    let media_types: Vec<String> = config.import.media_types.iter().map(ToString::to_string).collect();
    let rows: Vec<(&str, String)> = vec![
        ("Config file", paths.config_file().display().to_string()),
        ("Server", format!("{} ({})", config.server.url, config.server.kind)),
        ("Token", token.clone().unwrap_or_else(|| "not set".to_string())),
        ("Media types", media_types.join(", ")),
        ("Overwrite", config.import.overwrite.to_string()),
        (
            "Libraries",
            if config.import.libraries.is_empty() {
                "all".to_string()
            } else {
                config.import.libraries.join(", ")
            },
        ),
        ("Page size", config.import.page_size.to_string()),
        ("Write batch", config.import.write_batch_size.to_string()),
        ("Batch delay", format!("{} ms", config.import.batch_delay_ms)),
        ("Auto import", if scheduler.enabled { "enabled" } else { "disabled" }.to_string()),
        ("Interval", scheduler.interval.clone()),
        ("Tick schedule", scheduler.tick_schedule.clone()),
        ("Posters", paths.posters_dir().display().to_string()),
        ("Logs", paths.log_dir().display().to_string()),
    ];
    for (name, value) in rows {
        let cell = Cell::new(&value);
        let cell = if name == "Token" && token.is_none() { cell.fg(Color::Red) } else { cell };
        table.add_row(vec![Cell::new(name), cell]);
    }
    println!("{}", table);
    Ok(())
}

fn configure_server(
    paths: &PathManager,
    kind: Option<ServerKind>,
    url: Option<String>,
    output: &Output,
) -> Result<()> {
    let existing = load_existing(paths)?;
    let kind = match kind {
        Some(kind) => kind,
        None => {
            let default = existing.as_ref().map(|c| c.server.kind.as_str()).unwrap_or("plex");
            prompts::prompt_string("Server kind (plex/jellyfin)", Some(default))?
                .parse::<ServerKind>()
                .map_err(|e| eyre!(e))?
        }
    };
    let url = match url {
        Some(url) => url,
        None => {
            let default = existing.as_ref().map(|c| c.server.url.clone());
            prompts::prompt_string("Server URL", default.as_deref())?
        }
    };
    let url = url.trim().trim_end_matches('/').to_string();

    let mut config = existing.unwrap_or_else(|| Config::new(kind, url.clone()));
    config.server.kind = kind;
    config.server.url = url;
    config.validate().map_err(|e| eyre!("{}", e))?;
    save(paths, &config)?;

    output.success(format!("Server set to {} ({})", config.server.url, kind));
    let credentials = super::load_credentials(paths)?;
    if credentials.get_server_token(kind).is_none() {
        output.info("Store the API token next with 'posterkeep config token'");
    }
    Ok(())
}

fn configure_token(paths: &PathManager, token: Option<String>, output: &Output) -> Result<()> {
    let config = super::load_config(paths)?;
    let kind = config.server.kind;
    let token = match token {
        Some(token) => token.trim().to_string(),
        None => prompts::prompt_secret(&format!("{} token", kind))?,
    };
    if token.is_empty() {
        return Err(eyre!("Token cannot be empty"));
    }

    let mut credentials = super::load_credentials(paths)?;
    credentials.set_server_token(kind, token);
    credentials
        .save()
        .map_err(|e| eyre!("Failed to save credentials to {}: {}", paths.credentials_file().display(), e))?;
    output.success(format!("{} token saved to {}", kind, paths.credentials_file().display()));
    Ok(())
}

fn configure_auto(
    paths: &PathManager,
    enabled: Option<bool>,
    interval: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut config = super::load_config(paths)?;
    let mut scheduler = config.scheduler.take().unwrap_or_else(default_scheduler_config);
    if let Some(enabled) = enabled {
        scheduler.enabled = enabled;
    }
    if let Some(interval) = interval {
        scheduler.interval = interval.trim().to_string();
    }
    let effective = parse_interval(&scheduler.interval);
    let enabled = scheduler.enabled;
    config.scheduler = Some(scheduler);
    save(paths, &config)?;

    output.success(format!(
        "Automatic import {} (every {} minutes)",
        if enabled { "enabled" } else { "disabled" },
        effective.num_minutes()
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_string() {
        assert_eq!(mask_string("short"), "*****");
        assert_eq!(mask_string("abcd1234efgh"), "abcd...efgh");
    }
}
