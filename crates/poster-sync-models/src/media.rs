use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of artwork a poster file represents
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Show,
    Season,
    Collection,
}

impl MediaType {
    pub const ALL: [MediaType; 4] = [
        MediaType::Movie,
        MediaType::Show,
        MediaType::Season,
        MediaType::Collection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Show => "show",
            MediaType::Season => "season",
            MediaType::Collection => "collection",
        }
    }

    /// Directory (relative to the poster root) holding this media type
    pub fn dir_name(&self) -> &'static str {
        match self {
            MediaType::Movie => "movies",
            MediaType::Show => "tv-shows",
            MediaType::Season => "tv-seasons",
            MediaType::Collection => "collections",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMediaTypeError(pub String);

impl fmt::Display for ParseMediaTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid media type: {}. Use 'movie', 'show', 'season' or 'collection'",
            self.0
        )
    }
}

impl std::error::Error for ParseMediaTypeError {}

impl FromStr for MediaType {
    type Err = ParseMediaTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "movie" | "movies" => Ok(MediaType::Movie),
            "show" | "shows" | "tv-shows" => Ok(MediaType::Show),
            "season" | "seasons" | "tv-seasons" => Ok(MediaType::Season),
            "collection" | "collections" => Ok(MediaType::Collection),
            other => Err(ParseMediaTypeError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_media_type_aliases() {
        assert_eq!("Movies".parse::<MediaType>().unwrap(), MediaType::Movie);
        assert_eq!("tv-seasons".parse::<MediaType>().unwrap(), MediaType::Season);
        assert!("episode".parse::<MediaType>().is_err());
    }

    #[test]
    fn test_dir_names_are_distinct() {
        let mut names: Vec<_> = MediaType::ALL.iter().map(|m| m.dir_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&MediaType::Collection).unwrap();
        assert_eq!(json, "\"collection\"");
    }
}
