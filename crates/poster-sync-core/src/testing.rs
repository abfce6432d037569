//! In-memory media server for pipeline tests

use async_trait::async_trait;
use poster_sync_models::{ItemPage, Library, LibraryType, MediaType, RemoteItem, ServerKind};
use poster_sync_sources::{PosterSource, SourceError};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::{FilenameCodec, IdRegistry, IdStore, ImportSettings, PosterDirs, RunContext};

#[derive(Default)]
pub(crate) struct FakeSource {
    libraries: Vec<Library>,
    items: HashMap<(String, MediaType), Vec<RemoteItem>>,
    children: HashMap<String, Vec<RemoteItem>>,
    images: HashMap<String, Vec<u8>>,
    failing_images: HashSet<String>,
    /// Listings fail from this offset on
    failing_listings: HashMap<(String, MediaType), usize>,
    fail_libraries: bool,
    fetches: AtomicUsize,
}

pub(crate) fn item(id: &str, title: &str) -> RemoteItem {
    RemoteItem {
        id: id.to_string(),
        title: title.to_string(),
        thumb_ref: Some(format!("/thumb/{}", id)),
        parent_title: None,
    }
}

impl FakeSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_library(mut self, id: &str, title: &str, library_type: LibraryType) -> Self {
        self.libraries.push(Library {
            id: id.to_string(),
            title: title.to_string(),
            library_type,
        });
        self
    }

    /// Register items and give each a distinct image
    pub(crate) fn with_items(mut self, library_id: &str, media_type: MediaType, items: Vec<RemoteItem>) -> Self {
        for item in &items {
            if let Some(thumb) = &item.thumb_ref {
                self.images
                    .entry(thumb.clone())
                    .or_insert_with(|| format!("poster-{}", item.id).into_bytes());
            }
        }
        self.items.insert((library_id.to_string(), media_type), items);
        self
    }

    pub(crate) fn with_children(mut self, parent_id: &str, seasons: Vec<RemoteItem>) -> Self {
        for season in &seasons {
            if let Some(thumb) = &season.thumb_ref {
                self.images
                    .entry(thumb.clone())
                    .or_insert_with(|| format!("poster-{}", season.id).into_bytes());
            }
        }
        self.children.insert(parent_id.to_string(), seasons);
        self
    }

    pub(crate) fn set_image(&mut self, thumb_ref: &str, bytes: &[u8]) {
        self.images.insert(thumb_ref.to_string(), bytes.to_vec());
    }

    pub(crate) fn fail_image(mut self, thumb_ref: &str) -> Self {
        self.failing_images.insert(thumb_ref.to_string());
        self
    }

    pub(crate) fn fail_listing(self, library_id: &str, media_type: MediaType) -> Self {
        self.fail_listing_from(library_id, media_type, 0)
    }

    pub(crate) fn fail_listing_from(mut self, library_id: &str, media_type: MediaType, offset: usize) -> Self {
        self.failing_listings.insert((library_id.to_string(), media_type), offset);
        self
    }

    pub(crate) fn fail_libraries(mut self) -> Self {
        self.fail_libraries = true;
        self
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

fn slice(items: &[RemoteItem], offset: usize, page_size: usize) -> ItemPage {
    ItemPage {
        items: items.iter().skip(offset).take(page_size).cloned().collect(),
        total_count: Some(items.len()),
    }
}

#[async_trait]
impl PosterSource for FakeSource {
    fn source_name(&self) -> &str {
        "fake"
    }

    fn server_kind(&self) -> ServerKind {
        ServerKind::Plex
    }

    async fn list_libraries(&self) -> Result<Vec<Library>, SourceError> {
        if self.fail_libraries {
            return Err(SourceError::Status {
                url: "fake://libraries".to_string(),
                status: 500,
            });
        }
        Ok(self.libraries.clone())
    }

    async fn list_items(
        &self,
        library: &Library,
        media_type: MediaType,
        offset: usize,
        page_size: usize,
    ) -> Result<ItemPage, SourceError> {
        // Season runs list the shows of the library, like the real servers
        let listed = match media_type {
            MediaType::Season => MediaType::Show,
            other => other,
        };
        let failing_from = self.failing_listings.get(&(library.id.clone(), media_type));
        if failing_from.is_some_and(|from| offset >= *from) {
            return Err(SourceError::data("fake://items", "missing MediaContainer"));
        }
        let items = self
            .items
            .get(&(library.id.clone(), listed))
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        Ok(slice(items, offset, page_size))
    }

    async fn list_children(
        &self,
        parent_id: &str,
        offset: usize,
        page_size: usize,
    ) -> Result<ItemPage, SourceError> {
        let seasons = self.children.get(parent_id).map(Vec::as_slice).unwrap_or(&[]);
        Ok(slice(seasons, offset, page_size))
    }

    async fn fetch_image_bytes(&self, thumb_ref: &str) -> Result<Vec<u8>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing_images.contains(thumb_ref) {
            return Err(SourceError::Status {
                url: format!("fake:/{}", thumb_ref),
                status: 404,
            });
        }
        self.images
            .get(thumb_ref)
            .cloned()
            .ok_or_else(|| SourceError::data(thumb_ref, "no such image"))
    }
}

/// Context rooted in a temp dir: small pages, single-item write batches, no delays
pub(crate) fn test_context(root: &Path) -> RunContext {
    let settings = ImportSettings {
        page_size: 2,
        write_batch_size: 1,
        batch_delay: Duration::ZERO,
        ..ImportSettings::default()
    };
    RunContext::new(
        settings,
        FilenameCodec::new(ServerKind::Plex),
        PosterDirs::new(root.join("posters")),
        IdRegistry::new(IdStore::new(&root.join("ids"))),
    )
}
