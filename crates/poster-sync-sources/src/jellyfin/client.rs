use crate::jellyfin::api::JellyfinHttpClient;
use crate::{PosterSource, SourceError};
use async_trait::async_trait;
use poster_sync_models::{ItemPage, Library, LibraryType, MediaType, ServerKind};
use std::time::Duration;
use tracing::{debug, info};

pub struct JellyfinClient {
    api: JellyfinHttpClient,
}

impl JellyfinClient {
    pub fn new(
        api_key: &str,
        server_url: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            api: JellyfinHttpClient::new(api_key, server_url, connect_timeout, request_timeout)?,
        })
    }

    fn item_types(library: &Library, media_type: MediaType) -> Result<&'static str, SourceError> {
        match (media_type, library.library_type) {
            (MediaType::Movie, LibraryType::Movie) => Ok("Movie"),
            (MediaType::Show, LibraryType::Show) | (MediaType::Season, LibraryType::Show) => Ok("Series"),
            (MediaType::Collection, _) => Ok("BoxSet"),
            (media_type, library_type) => Err(SourceError::Config(format!(
                "Jellyfin library '{}' ({}) has no {} items",
                library.title,
                library_type.as_str(),
                media_type
            ))),
        }
    }
}

#[async_trait]
impl PosterSource for JellyfinClient {
    fn source_name(&self) -> &str {
        "jellyfin"
    }

    fn server_kind(&self) -> ServerKind {
        ServerKind::Jellyfin
    }

    async fn list_libraries(&self) -> Result<Vec<Library>, SourceError> {
        let folders = self.api.get_virtual_folders().await?;
        let mut libraries = Vec::new();
        for folder in folders {
            let kind = folder.collection_type.as_deref().unwrap_or("");
            match LibraryType::from_server_type(kind) {
                Some(library_type) => libraries.push(Library {
                    id: folder.item_id,
                    title: folder.name,
                    library_type,
                }),
                None => debug!("Jellyfin: ignoring library '{}' of type '{}'", folder.name, kind),
            }
        }
        info!("Jellyfin: {} poster libraries", libraries.len());
        Ok(libraries)
    }

    async fn list_items(
        &self,
        library: &Library,
        media_type: MediaType,
        offset: usize,
        page_size: usize,
    ) -> Result<ItemPage, SourceError> {
        let item_types = Self::item_types(library, media_type)?;
        self.api
            .get_items_page(&library.id, item_types, offset, page_size)
            .await
    }

    async fn list_children(
        &self,
        parent_id: &str,
        offset: usize,
        page_size: usize,
    ) -> Result<ItemPage, SourceError> {
        self.api.get_seasons_page(parent_id, offset, page_size).await
    }

    async fn fetch_image_bytes(&self, thumb_ref: &str) -> Result<Vec<u8>, SourceError> {
        self.api.get_primary_image(thumb_ref).await
    }
}
