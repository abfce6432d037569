use poster_sync_config::{Config, ImportConfig, PathManager};
use poster_sync_models::{MediaType, OverwriteOption};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::filename::validate_filename;
use crate::{FilenameCodec, IdRegistry, IdStore, ImportError, ReconcileTracker, SessionIdCache};

/// Poster directories, one per media type under a common root
#[derive(Debug, Clone)]
pub struct PosterDirs {
    root: PathBuf,
}

impl PosterDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, media_type: MediaType) -> PathBuf {
        self.root.join(media_type.dir_name())
    }

    pub fn ensure(&self, media_type: MediaType) -> Result<PathBuf, ImportError> {
        let dir = self.dir(media_type);
        std::fs::create_dir_all(&dir).map_err(|e| ImportError::filesystem(&dir, e))?;
        Ok(dir)
    }

    /// Join a filename onto its media-type directory, refusing anything that is not a plain name
    pub fn resolve(&self, media_type: MediaType, filename: &str) -> Result<PathBuf, ImportError> {
        let name = validate_filename(filename)?;
        Ok(self.dir(media_type).join(name))
    }
}

/// Tunables for one sweep
#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub media_types: Vec<MediaType>,
    pub page_size: usize,
    pub write_batch_size: usize,
    pub batch_delay: Duration,
    pub overwrite: OverwriteOption,
    /// Restrict the sweep to these library titles; empty means all
    pub libraries: Vec<String>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self::from(&ImportConfig::default())
    }
}

impl From<&ImportConfig> for ImportSettings {
    fn from(config: &ImportConfig) -> Self {
        Self {
            media_types: config.media_types.clone(),
            page_size: config.page_size.max(1),
            write_batch_size: config.write_batch_size.max(1),
            batch_delay: Duration::from_millis(config.batch_delay_ms),
            overwrite: config.overwrite,
            libraries: config.libraries.clone(),
        }
    }
}

/// Everything a run needs besides the remote source
pub struct RunContext {
    pub settings: ImportSettings,
    pub codec: FilenameCodec,
    pub dirs: PosterDirs,
    pub registry: IdRegistry,
    pub tracker: ReconcileTracker,
}

impl RunContext {
    pub fn new(settings: ImportSettings, codec: FilenameCodec, dirs: PosterDirs, registry: IdRegistry) -> Self {
        Self {
            settings,
            codec,
            dirs,
            registry,
            tracker: ReconcileTracker::new(),
        }
    }

    /// Carry the reconciliation state of an earlier call of the same sweep
    pub fn with_tracker(mut self, tracker: ReconcileTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Build a fresh session from configuration and resolved paths
    pub fn from_config(config: &Config, paths: &PathManager) -> Self {
        Self::resume(config, paths, SessionIdCache::new())
    }

    pub fn resume(config: &Config, paths: &PathManager, session: SessionIdCache) -> Self {
        let store = IdStore::new(&paths.id_store_dir());
        Self::new(
            ImportSettings::from(&config.import),
            FilenameCodec::new(config.server.kind),
            PosterDirs::new(paths.posters_dir()),
            IdRegistry::with_session(store, session),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poster_sync_models::ServerKind;

    #[test]
    fn test_resolve_rejects_traversal() {
        let dirs = PosterDirs::new("/posters");
        assert_eq!(
            dirs.resolve(MediaType::Movie, "Heat [1] **Plex**.jpg").unwrap(),
            PathBuf::from("/posters/movies/Heat [1] **Plex**.jpg")
        );
        assert!(dirs.resolve(MediaType::Movie, "../escape.jpg").is_err());
        assert!(dirs.resolve(MediaType::Movie, "").is_err());
    }

    #[test]
    fn test_context_from_config() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let paths = PathManager::from_base(temp_dir.path().to_path_buf());
        let mut config = Config::new(ServerKind::Jellyfin, "http://jf:8096".to_string());
        config.import.batch_delay_ms = 0;

        let ctx = RunContext::from_config(&config, &paths);
        assert_eq!(ctx.codec.source_tag(), "**Jellyfin**");
        assert_eq!(ctx.dirs.root(), paths.posters_dir());
        assert_eq!(ctx.settings.batch_delay, Duration::ZERO);
        assert_eq!(ctx.settings.media_types.len(), 4);
    }
}
