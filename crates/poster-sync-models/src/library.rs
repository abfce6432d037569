use serde::{Deserialize, Serialize};

/// Type of a remote library section
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LibraryType {
    Movie,
    Show,
}

impl LibraryType {
    /// Map a server-reported library type ("movie", "show", "movies", "tvshows", ...)
    pub fn from_server_type(type_: &str) -> Option<Self> {
        match type_.to_lowercase().as_str() {
            "movie" | "movies" => Some(LibraryType::Movie),
            "show" | "shows" | "tvshows" | "series" => Some(LibraryType::Show),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryType::Movie => "movie",
            LibraryType::Show => "show",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Library {
    pub id: String,
    pub title: String,
    pub library_type: LibraryType,
}

/// One item returned by a media server listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteItem {
    pub id: String,
    pub title: String,
    /// Opaque reference passed back to the source to download artwork
    pub thumb_ref: Option<String>,
    /// Title of the parent show (seasons only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_title: Option<String>,
}

/// One page of a paginated listing
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemPage {
    pub items: Vec<RemoteItem>,
    /// Total size of the listing if the server reports it
    pub total_count: Option<usize>,
}
