use anyhow::{Context, Result};
use poster_sync_models::ServerKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// On-disk layout of `credentials.toml`
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
struct Tokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    plex_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jellyfin_api_key: Option<String>,
}

/// Server tokens, kept apart from `config.toml`
pub struct CredentialStore {
    path: PathBuf,
    tokens: Tokens,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            tokens: Tokens::default(),
        }
    }

    /// A missing file leaves the store empty
    pub fn load(&mut self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        self.tokens = toml::from_str(&content).with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&self.tokens)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    fn slot(&mut self, kind: ServerKind) -> &mut Option<String> {
        match kind {
            ServerKind::Plex => &mut self.tokens.plex_token,
            ServerKind::Jellyfin => &mut self.tokens.jellyfin_api_key,
        }
    }

    /// Token for the given server kind; blank values count as missing
    pub fn get_server_token(&self, kind: ServerKind) -> Option<&String> {
        let token = match kind {
            ServerKind::Plex => self.tokens.plex_token.as_ref(),
            ServerKind::Jellyfin => self.tokens.jellyfin_api_key.as_ref(),
        };
        token.filter(|t| !t.trim().is_empty())
    }

    pub fn set_server_token(&mut self, kind: ServerKind, token: String) {
        *self.slot(kind) = Some(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_tokens_survive_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.toml");

        let mut store = CredentialStore::new(path.clone());
        store.set_server_token(ServerKind::Plex, "plex-secret".to_string());
        store.set_server_token(ServerKind::Jellyfin, "jf-secret".to_string());
        store.save().unwrap();

        let mut reloaded = CredentialStore::new(path);
        reloaded.load().unwrap();
        assert_eq!(reloaded.get_server_token(ServerKind::Plex).map(String::as_str), Some("plex-secret"));
        assert_eq!(reloaded.get_server_token(ServerKind::Jellyfin).map(String::as_str), Some("jf-secret"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let mut store = CredentialStore::new(dir.path().join("absent.toml"));
        store.load().unwrap();
        assert!(store.get_server_token(ServerKind::Plex).is_none());
    }

    #[test]
    fn test_blank_token_is_missing() {
        let mut store = CredentialStore::new(PathBuf::from("/tmp/unused.toml"));
        store.set_server_token(ServerKind::Plex, "   ".to_string());
        assert!(store.get_server_token(ServerKind::Plex).is_none());
    }
}
