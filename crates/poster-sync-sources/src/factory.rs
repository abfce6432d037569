//! Source factory pattern for creating the media-server client from configuration

use poster_sync_config::{Config, CredentialStore};
use poster_sync_models::ServerKind;
use std::collections::HashMap;
use std::time::Duration;

use crate::{JellyfinClient, PlexClient, PosterSource, SourceError};

/// Factory trait for creating a poster source from configuration
pub trait SourceFactory: Send + Sync {
    /// The server kind this factory creates clients for
    fn server_kind(&self) -> ServerKind;

    /// Create a client; fails with `SourceError::Config` when the token is missing
    fn create_source(
        &self,
        config: &Config,
        credentials: &CredentialStore,
    ) -> Result<Box<dyn PosterSource>, SourceError>;
}

fn timeouts(config: &Config) -> (Duration, Duration) {
    (
        Duration::from_secs(config.server.connect_timeout_secs),
        Duration::from_secs(config.server.request_timeout_secs),
    )
}

fn required_token<'a>(kind: ServerKind, credentials: &'a CredentialStore) -> Result<&'a String, SourceError> {
    credentials.get_server_token(kind).ok_or_else(|| {
        SourceError::Config(format!(
            "{} token not found in credentials. Run 'posterkeep config token' first",
            kind
        ))
    })
}

struct PlexSourceFactory;

impl SourceFactory for PlexSourceFactory {
    fn server_kind(&self) -> ServerKind {
        ServerKind::Plex
    }

    fn create_source(
        &self,
        config: &Config,
        credentials: &CredentialStore,
    ) -> Result<Box<dyn PosterSource>, SourceError> {
        let token = required_token(ServerKind::Plex, credentials)?;
        let (connect, request) = timeouts(config);
        Ok(Box::new(PlexClient::new(token, &config.server.url, connect, request)?))
    }
}

struct JellyfinSourceFactory;

impl SourceFactory for JellyfinSourceFactory {
    fn server_kind(&self) -> ServerKind {
        ServerKind::Jellyfin
    }

    fn create_source(
        &self,
        config: &Config,
        credentials: &CredentialStore,
    ) -> Result<Box<dyn PosterSource>, SourceError> {
        let api_key = required_token(ServerKind::Jellyfin, credentials)?;
        let (connect, request) = timeouts(config);
        Ok(Box::new(JellyfinClient::new(api_key, &config.server.url, connect, request)?))
    }
}

/// Registry of source factories
pub struct SourceFactoryRegistry {
    factories: HashMap<ServerKind, Box<dyn SourceFactory>>,
}

impl SourceFactoryRegistry {
    /// Create a new registry with all built-in factories registered
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register(Box::new(PlexSourceFactory));
        registry.register(Box::new(JellyfinSourceFactory));
        registry
    }

    pub fn register(&mut self, factory: Box<dyn SourceFactory>) {
        self.factories.insert(factory.server_kind(), factory);
    }

    /// Validate the config and create the client for its server kind
    pub fn create_source(
        &self,
        config: &Config,
        credentials: &CredentialStore,
    ) -> Result<Box<dyn PosterSource>, SourceError> {
        config
            .validate()
            .map_err(|e| SourceError::Config(e.to_string()))?;
        let factory = self.factories.get(&config.server.kind).ok_or_else(|| {
            SourceError::Config(format!("No source registered for {}", config.server.kind))
        })?;
        factory.create_source(config, credentials)
    }
}

impl Default for SourceFactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_token_is_config_error() {
        let config = Config::new(ServerKind::Plex, "http://plex.local:32400".to_string());
        let credentials = CredentialStore::new(PathBuf::from("/nonexistent/credentials.toml"));
        let result = SourceFactoryRegistry::new().create_source(&config, &credentials);
        assert!(matches!(result, Err(SourceError::Config(_))));
    }

    #[test]
    fn test_creates_client_for_configured_kind() {
        let config = Config::new(ServerKind::Jellyfin, "http://jf.local:8096".to_string());
        let mut credentials = CredentialStore::new(PathBuf::from("/nonexistent/credentials.toml"));
        credentials.set_server_token(ServerKind::Jellyfin, "key".to_string());
        let source = SourceFactoryRegistry::new()
            .create_source(&config, &credentials)
            .unwrap();
        assert_eq!(source.server_kind(), ServerKind::Jellyfin);
        assert_eq!(source.source_name(), "jellyfin");
    }

    #[test]
    fn test_invalid_url_rejected_before_client() {
        let config = Config::new(ServerKind::Plex, "plex.local".to_string());
        let mut credentials = CredentialStore::new(PathBuf::from("/nonexistent/credentials.toml"));
        credentials.set_server_token(ServerKind::Plex, "token".to_string());
        assert!(SourceFactoryRegistry::new().create_source(&config, &credentials).is_err());
    }
}
