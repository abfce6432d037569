use async_trait::async_trait;
use poster_sync_models::{ItemPage, Library, MediaType, ServerKind};

use crate::SourceError;

/// Remote media server seen by the import pipeline
///
/// Listings are paginated with an explicit offset so a caller can resume a
/// run from any page. A page shorter than `page_size` ends the listing.
#[async_trait]
pub trait PosterSource: Send + Sync {
    fn source_name(&self) -> &str;

    fn server_kind(&self) -> ServerKind;

    async fn list_libraries(&self) -> Result<Vec<Library>, SourceError>;

    /// Movies, shows or collections of one library
    async fn list_items(
        &self,
        library: &Library,
        media_type: MediaType,
        offset: usize,
        page_size: usize,
    ) -> Result<ItemPage, SourceError>;

    /// Seasons of one show
    async fn list_children(
        &self,
        parent_id: &str,
        offset: usize,
        page_size: usize,
    ) -> Result<ItemPage, SourceError>;

    async fn fetch_image_bytes(&self, thumb_ref: &str) -> Result<Vec<u8>, SourceError>;
}
