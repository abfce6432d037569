pub mod traits;
pub mod factory;
pub mod plex;
pub mod jellyfin;
pub mod error;

pub use traits::PosterSource;
pub use factory::{SourceFactory, SourceFactoryRegistry};
pub use error::SourceError;
pub use plex::PlexClient;
pub use jellyfin::JellyfinClient;
