//! Poster filename encoding
//!
//! A managed poster file carries everything needed to reconcile it later:
//! `<title> [<id>] [[<library>]] <tag>.jpg` for movies, shows and seasons and
//! `<title> [<id>] Collection (<Movies|TV>) <tag>.jpg` for collections. The tag
//! is either the source tag of the server that produced the file or the orphan
//! tag, never both.

use poster_sync_models::{LibraryType, MediaType, ServerKind};
use thiserror::Error;

pub const ORPHAN_TAG: &str = "**Orphaned**";
pub const POSTER_EXTENSION: &str = "jpg";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("empty filename")]
    Empty,
    #[error("filename '{0}' contains a path separator")]
    PathSeparator(String),
    #[error("filename '{0}' is not a plain file name")]
    NotPlain(String),
}

/// Reject anything that could escape the poster directory it is joined onto
pub fn validate_filename(name: &str) -> Result<&str, CodecError> {
    if name.is_empty() {
        return Err(CodecError::Empty);
    }
    if name.contains('/') || name.contains('\\') {
        return Err(CodecError::PathSeparator(name.to_string()));
    }
    if name == "." || name == ".." || name.contains("..") || name.contains('\0') {
        return Err(CodecError::NotPlain(name.to_string()));
    }
    Ok(name)
}

/// Keep ASCII letters, digits, space, underscore, hyphen and dot; collapse runs of whitespace
pub fn sanitize_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-' | '.'))
        .collect();
    let collapsed = kept.split_whitespace().collect::<Vec<_>>().join(" ");
    // A title may not smuggle a parent-directory reference into the name
    let mut out = collapsed;
    while out.contains("..") {
        out = out.replace("..", ".");
    }
    out.trim_matches(|c: char| c == '.' || c == ' ').to_string()
}

fn sanitize_id(item_id: &str) -> String {
    item_id.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Lower-cased, entity-decoded, sanitized form used to compare show titles with filenames
pub fn normalize_for_match(text: &str) -> String {
    sanitize_title(&decode_entities(text)).to_lowercase()
}

fn decode_entities(text: &str) -> String {
    const ENTITIES: [(&str, &str); 8] = [
        ("&amp;", "&"),
        ("&quot;", "\""),
        ("&#39;", "'"),
        ("&#039;", "'"),
        ("&apos;", "'"),
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&nbsp;", " "),
    ];
    let mut out = text.to_string();
    for (entity, plain) in ENTITIES {
        out = out.replace(entity, plain);
    }
    out
}

#[derive(Debug, Clone)]
pub struct FilenameCodec {
    source_tag: String,
}

impl FilenameCodec {
    pub fn new(kind: ServerKind) -> Self {
        Self::with_tag(kind.source_tag())
    }

    pub fn with_tag(tag: impl Into<String>) -> Self {
        Self {
            source_tag: tag.into(),
        }
    }

    pub fn source_tag(&self) -> &str {
        &self.source_tag
    }

    pub fn orphan_tag(&self) -> &str {
        ORPHAN_TAG
    }

    /// Build the managed filename for one item
    ///
    /// `library_type` is only used for collections, `library_name` for everything else.
    pub fn encode(
        &self,
        title: &str,
        item_id: &str,
        media_type: MediaType,
        library_type: Option<LibraryType>,
        library_name: &str,
    ) -> String {
        self.encode_with_extension(title, item_id, media_type, library_type, library_name, POSTER_EXTENSION)
    }

    /// Same as [`encode`](Self::encode) with another file extension; a leading dot is ignored
    pub fn encode_with_extension(
        &self,
        title: &str,
        item_id: &str,
        media_type: MediaType,
        library_type: Option<LibraryType>,
        library_name: &str,
        extension: &str,
    ) -> String {
        let mut parts: Vec<String> = Vec::new();

        let title = sanitize_title(title);
        if !title.is_empty() {
            parts.push(title.clone());
        }

        let id = sanitize_id(item_id);
        if !id.is_empty() {
            parts.push(format!("[{}]", id));
        }

        match media_type {
            MediaType::Collection => {
                if !title.to_lowercase().contains("collection") {
                    parts.push("Collection".to_string());
                }
                match library_type {
                    Some(LibraryType::Movie) => parts.push("(Movies)".to_string()),
                    Some(LibraryType::Show) => parts.push("(TV)".to_string()),
                    None => {}
                }
            }
            _ => {
                let library = sanitize_title(library_name);
                if !library.is_empty() {
                    parts.push(format!("[[{}]]", library));
                }
            }
        }

        parts.push(self.source_tag.clone());
        let extension = extension.trim_start_matches('.');
        if extension.is_empty() {
            return parts.join(" ");
        }
        format!("{}.{}", parts.join(" "), extension)
    }

    /// First single-bracketed alphanumeric token, ignoring `[[library]]` segments
    pub fn decode_item_id(filename: &str) -> Option<String> {
        let bytes = filename.as_bytes();
        let mut i = 0;
        while let Some(pos) = filename[i..].find('[') {
            let start = i + pos;
            if bytes.get(start + 1) == Some(&b'[') {
                match filename[start..].find("]]") {
                    Some(end) => {
                        i = start + end + 2;
                        continue;
                    }
                    None => return None,
                }
            }
            let rest = &filename[start + 1..];
            let len = rest.bytes().take_while(|b| b.is_ascii_alphanumeric()).count();
            if len > 0 && rest.as_bytes().get(len) == Some(&b']') {
                return Some(rest[..len].to_string());
            }
            i = start + 1;
        }
        None
    }

    /// Library type recorded in a collection filename
    pub fn decode_library_type(filename: &str) -> Option<LibraryType> {
        if filename.contains("(Movies)") {
            Some(LibraryType::Movie)
        } else if filename.contains("(TV)") {
            Some(LibraryType::Show)
        } else {
            None
        }
    }

    pub fn has_source_tag(&self, filename: &str) -> bool {
        filename.contains(&self.source_tag)
    }

    pub fn has_orphan_tag(&self, filename: &str) -> bool {
        filename.contains(ORPHAN_TAG)
    }

    /// Swap the last occurrence of `from` for `to`; `None` when `from` is absent
    pub fn retag(filename: &str, from: &str, to: &str) -> Option<String> {
        let pos = filename.rfind(from)?;
        let mut out = String::with_capacity(filename.len() + to.len());
        out.push_str(&filename[..pos]);
        out.push_str(to);
        out.push_str(&filename[pos + from.len()..]);
        Some(out)
    }

    pub fn orphan(&self, filename: &str) -> Option<String> {
        Self::retag(filename, &self.source_tag, ORPHAN_TAG)
    }

    pub fn restore(&self, filename: &str) -> Option<String> {
        Self::retag(filename, ORPHAN_TAG, &self.source_tag)
    }

    /// `name (n).ext`, used when existing files must be kept
    pub fn copy_variant(filename: &str, n: usize) -> String {
        match filename.rsplit_once('.') {
            Some((stem, ext)) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", filename, n),
        }
    }
}
