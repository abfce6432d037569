use poster_sync_models::{MediaType, OverwriteOption, ServerKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::PathManager;

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub scheduler: Option<SchedulerConfig>,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub kind: ServerKind,
    pub url: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImportConfig {
    #[serde(default = "default_media_types")]
    pub media_types: Vec<MediaType>,
    /// Items requested per remote page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Items written to disk between two pauses
    #[serde(default = "default_write_batch_size")]
    pub write_batch_size: usize,
    /// Pause between write batches and remote pages
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default)]
    pub overwrite: OverwriteOption,
    /// Library titles to import; empty means every library
    #[serde(default)]
    pub libraries: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Compact duration between sweeps: "30m", "6h", "1d", "2w"
    #[serde(default = "default_interval")]
    pub interval: String,
    /// Cron expression (with seconds) the daemon uses to check whether a sweep is due
    #[serde(default = "default_tick_schedule")]
    pub tick_schedule: String,
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub posters_dir: Option<PathBuf>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            media_types: default_media_types(),
            page_size: default_page_size(),
            write_batch_size: default_write_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            overwrite: OverwriteOption::default(),
            libraries: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_media_types() -> Vec<MediaType> {
    MediaType::ALL.to_vec()
}

fn default_page_size() -> usize {
    25
}

fn default_write_batch_size() -> usize {
    10
}

fn default_batch_delay_ms() -> u64 {
    500
}

fn default_interval() -> String {
    "24h".to_string()
}

fn default_tick_schedule() -> String {
    "0 */15 * * * *".to_string() // Every 15 minutes
}

pub fn default_scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        enabled: false,
        interval: default_interval(),
        tick_schedule: default_tick_schedule(),
        run_on_startup: default_true(),
    }
}

impl Config {
    pub fn new(kind: ServerKind, url: String) -> Self {
        Self {
            server: ServerConfig {
                kind,
                url,
                connect_timeout_secs: default_connect_timeout_secs(),
                request_timeout_secs: default_request_timeout_secs(),
            },
            import: ImportConfig::default(),
            scheduler: None,
            storage: StorageConfig::default(),
        }
    }

    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = self.server.url.trim();
        if url.is_empty() {
            return Err(anyhow::anyhow!("server.url is required"));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(anyhow::anyhow!("server.url must start with http:// or https://: {}", url));
        }
        if self.import.page_size == 0 {
            return Err(anyhow::anyhow!("import.page_size must be greater than zero"));
        }
        if self.import.write_batch_size == 0 {
            return Err(anyhow::anyhow!("import.write_batch_size must be greater than zero"));
        }
        if self.import.media_types.is_empty() {
            return Err(anyhow::anyhow!("import.media_types cannot be empty"));
        }
        Ok(())
    }

    /// Scheduler section, falling back to defaults
    pub fn scheduler_or_default(&self) -> SchedulerConfig {
        self.scheduler.clone().unwrap_or_else(default_scheduler_config)
    }

    /// Apply storage overrides to a path manager
    pub fn apply_storage(&self, paths: PathManager) -> PathManager {
        match &self.storage.posters_dir {
            Some(dir) => paths.with_posters_dir(dir.clone()),
            None => paths,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_load_and_save() {
        let file = NamedTempFile::new().unwrap();
        let mut config = Config::new(ServerKind::Jellyfin, "http://jf.local:8096".to_string());
        config.import.overwrite = OverwriteOption::Skip;
        config.import.media_types = vec![MediaType::Movie, MediaType::Collection];
        config.scheduler = Some(SchedulerConfig {
            enabled: true,
            interval: "6h".to_string(),
            tick_schedule: default_tick_schedule(),
            run_on_startup: false,
        });

        let path = file.path().to_path_buf();
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.server.kind, ServerKind::Jellyfin);
        assert_eq!(loaded.import.overwrite, OverwriteOption::Skip);
        assert_eq!(loaded.import.media_types, vec![MediaType::Movie, MediaType::Collection]);
        assert_eq!(loaded.scheduler.unwrap().interval, "6h");
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            kind = "plex"
            url = "http://plex.local:32400"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.connect_timeout_secs, 10);
        assert_eq!(config.import.page_size, 25);
        assert_eq!(config.import.write_batch_size, 10);
        assert_eq!(config.import.media_types.len(), 4);
        assert_eq!(config.import.overwrite, OverwriteOption::Overwrite);
        assert!(!config.scheduler_or_default().enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validate() {
        let mut config = Config::new(ServerKind::Plex, "".to_string());
        assert!(config.validate().is_err());

        config.server.url = "plex.local".to_string();
        assert!(config.validate().is_err());

        config.server.url = "https://plex.local".to_string();
        assert!(config.validate().is_ok());

        config.import.page_size = 0;
        assert!(config.validate().is_err());
    }
}
