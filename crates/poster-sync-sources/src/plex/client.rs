use crate::plex::api::{PlexHttpClient, SectionListing};
use crate::{PosterSource, SourceError};
use async_trait::async_trait;
use poster_sync_models::{ItemPage, Library, LibraryType, MediaType, ServerKind};
use std::time::Duration;
use tracing::{debug, info};

pub struct PlexClient {
    api: PlexHttpClient,
    server_url: String,
}

impl PlexClient {
    pub fn new(
        token: &str,
        server_url: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, SourceError> {
        let api = PlexHttpClient::new(token, server_url, connect_timeout, request_timeout)?;
        Ok(Self {
            api,
            server_url: server_url.to_string(),
        })
    }

    fn listing_for(library: &Library, media_type: MediaType) -> Result<SectionListing, SourceError> {
        match (media_type, library.library_type) {
            (MediaType::Movie, LibraryType::Movie) => Ok(SectionListing::Movies),
            (MediaType::Show, LibraryType::Show) => Ok(SectionListing::Shows),
            // Season runs page through the shows and ask for their children
            (MediaType::Season, LibraryType::Show) => Ok(SectionListing::Shows),
            (MediaType::Collection, _) => Ok(SectionListing::Collections),
            (media_type, library_type) => Err(SourceError::Config(format!(
                "Plex library '{}' ({}) has no {} items",
                library.title,
                library_type.as_str(),
                media_type
            ))),
        }
    }
}

#[async_trait]
impl PosterSource for PlexClient {
    fn source_name(&self) -> &str {
        "plex"
    }

    fn server_kind(&self) -> ServerKind {
        ServerKind::Plex
    }

    async fn list_libraries(&self) -> Result<Vec<Library>, SourceError> {
        let sections = self.api.get_libraries().await?;
        let mut libraries = Vec::new();
        for section in sections {
            match LibraryType::from_server_type(&section.type_) {
                Some(library_type) => libraries.push(Library {
                    id: section.key,
                    title: section.title,
                    library_type,
                }),
                None => debug!(
                    "Plex: ignoring library '{}' of type '{}'",
                    section.title, section.type_
                ),
            }
        }
        info!(
            "Plex: {} poster libraries on {}",
            libraries.len(),
            self.server_url
        );
        Ok(libraries)
    }

    async fn list_items(
        &self,
        library: &Library,
        media_type: MediaType,
        offset: usize,
        page_size: usize,
    ) -> Result<ItemPage, SourceError> {
        let listing = Self::listing_for(library, media_type)?;
        self.api
            .get_section_page(&library.id, listing, offset, page_size)
            .await
    }

    async fn list_children(
        &self,
        parent_id: &str,
        offset: usize,
        page_size: usize,
    ) -> Result<ItemPage, SourceError> {
        self.api.get_children_page(parent_id, offset, page_size).await
    }

    async fn fetch_image_bytes(&self, thumb_ref: &str) -> Result<Vec<u8>, SourceError> {
        self.api.get_image(thumb_ref).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library(library_type: LibraryType) -> Library {
        Library {
            id: "1".to_string(),
            title: "Lib".to_string(),
            library_type,
        }
    }

    #[test]
    fn test_listing_for_media_types() {
        assert_eq!(
            PlexClient::listing_for(&library(LibraryType::Movie), MediaType::Movie).unwrap(),
            SectionListing::Movies
        );
        assert_eq!(
            PlexClient::listing_for(&library(LibraryType::Show), MediaType::Season).unwrap(),
            SectionListing::Shows
        );
        assert_eq!(
            PlexClient::listing_for(&library(LibraryType::Show), MediaType::Collection).unwrap(),
            SectionListing::Collections
        );
        assert!(PlexClient::listing_for(&library(LibraryType::Movie), MediaType::Show).is_err());
    }
}
