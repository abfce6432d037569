pub mod media;
pub mod library;
pub mod server;
pub mod overwrite;
pub mod valid_ids;

pub use media::{MediaType, ParseMediaTypeError};
pub use library::{ItemPage, Library, LibraryType, RemoteItem};
pub use server::ServerKind;
pub use overwrite::OverwriteOption;
pub use valid_ids::ValidIdSet;
