use anyhow::Result;
use poster_sync_models::MediaType;
use std::path::{Path, PathBuf};

/// Get the container base path from environment variable, defaulting to "/app"
pub fn container_base_path() -> PathBuf {
    std::env::var("POSTERKEEP_BASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/app"))
}

pub struct PathManager {
    config_dir: PathBuf,
    data_dir: PathBuf,
    log_dir: PathBuf,
    posters_dir: PathBuf,
}

impl PathManager {
    pub fn new() -> Result<Self> {
        let base_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("posterkeep");

        Ok(Self::from_base(base_dir))
    }

    pub fn from_docker_env() -> Self {
        // Config files at base level, data/logs in subdirs
        Self::from_base(container_base_path())
    }

    /// Lay out every directory under one root (also used by tests)
    pub fn from_base(base: PathBuf) -> Self {
        let data_dir = base.join("data");
        Self {
            config_dir: base.clone(),
            posters_dir: data_dir.join("posters"),
            log_dir: base.join("logs"),
            data_dir,
        }
    }

    /// Point poster storage somewhere other than `<data>/posters`
    pub fn with_posters_dir(mut self, posters_dir: PathBuf) -> Self {
        self.posters_dir = posters_dir;
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn posters_dir(&self) -> &Path {
        &self.posters_dir
    }

    pub fn poster_dir(&self, media_type: MediaType) -> PathBuf {
        self.posters_dir.join(media_type.dir_name())
    }

    pub fn id_store_dir(&self) -> PathBuf {
        self.data_dir.join("ids")
    }

    pub fn scheduler_dir(&self) -> PathBuf {
        self.data_dir.join("scheduler")
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.config_dir.join("credentials.toml")
    }

    pub fn daemon_log_file(&self) -> PathBuf {
        self.log_dir.join("posterkeep.log")
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        std::fs::create_dir_all(self.id_store_dir())?;
        std::fs::create_dir_all(self.scheduler_dir())?;
        for media_type in MediaType::ALL {
            std::fs::create_dir_all(self.poster_dir(media_type))?;
        }
        Ok(())
    }
}

impl Default for PathManager {
    fn default() -> Self {
        // The container base directory is created in the Containerfile; its presence indicates Docker
        let base = container_base_path();
        if base.exists() {
            return Self::from_docker_env();
        }

        // Otherwise, use platform-specific paths (e.g., ~/.config/posterkeep on Linux)
        Self::new().unwrap_or_else(|_| Self::from_docker_env())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_directories_creates_poster_tree() {
        let dir = TempDir::new().unwrap();
        let paths = PathManager::from_base(dir.path().to_path_buf());
        paths.ensure_directories().unwrap();

        assert!(paths.poster_dir(MediaType::Movie).ends_with("posters/movies"));
        for media_type in MediaType::ALL {
            assert!(paths.poster_dir(media_type).is_dir());
        }
        assert!(paths.id_store_dir().is_dir());
    }

    #[test]
    fn test_posters_dir_override() {
        let paths = PathManager::from_base(PathBuf::from("/base"))
            .with_posters_dir(PathBuf::from("/mnt/art"));
        assert_eq!(paths.poster_dir(MediaType::Season), PathBuf::from("/mnt/art/tv-seasons"));
        assert_eq!(paths.id_store_dir(), PathBuf::from("/base/data/ids"));
    }
}
