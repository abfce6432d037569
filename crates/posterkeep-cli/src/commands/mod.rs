pub mod auto;
pub mod config;
pub mod daemon;
pub mod ids;
pub mod import;
pub mod import_show;
pub mod progress;
pub mod prompts;

use color_eyre::eyre::{eyre, Result};
use poster_sync_config::{Config, CredentialStore, PathManager};
use poster_sync_sources::{PosterSource, SourceFactoryRegistry};

/// Path layout with the `[storage]` overrides of an existing config applied
pub fn paths() -> PathManager {
    let paths = PathManager::default();
    match Config::load_from_file(&paths.config_file()) {
        Ok(config) => config.apply_storage(paths),
        Err(_) => paths,
    }
}

/// Load and validate config.toml
pub fn load_config(paths: &PathManager) -> Result<Config> {
    let config_file = paths.config_file();
    if !config_file.exists() {
        return Err(eyre!(
            "Configuration file not found at {}. Run 'posterkeep config server --kind plex --url <URL>' first",
            config_file.display()
        ));
    }
    let config = Config::load_from_file(&config_file)
        .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))?;
    config
        .validate()
        .map_err(|e| eyre!("Invalid configuration in {}: {}", config_file.display(), e))?;
    Ok(config)
}

pub fn load_credentials(paths: &PathManager) -> Result<CredentialStore> {
    let credentials_file = paths.credentials_file();
    let mut store = CredentialStore::new(credentials_file.clone());
    store
        .load()
        .map_err(|e| eyre!("Failed to load credentials from {}: {}", credentials_file.display(), e))?;
    Ok(store)
}

/// Config, credentials and a connected client in one step
pub fn open_source(paths: &PathManager) -> Result<(Config, Box<dyn PosterSource>)> {
    let config = load_config(paths)?;
    let credentials = load_credentials(paths)?;
    let source = SourceFactoryRegistry::new()
        .create_source(&config, &credentials)
        .map_err(|e| eyre!("Failed to create {} client: {}", config.server.kind, e))?;
    Ok((config, source))
}
