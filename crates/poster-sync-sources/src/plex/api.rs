use poster_sync_models::{ItemPage, RemoteItem};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::SourceError;

#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub key: String,
    pub type_: String,
    pub title: String,
}

/// Plex listing filter for `/library/sections/{key}/all`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionListing {
    Movies,
    Shows,
    Collections,
}

pub struct PlexHttpClient {
    client: Client,
    server_url: String,
}

impl PlexHttpClient {
    pub fn new(
        token: &str,
        server_url: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, SourceError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            reqwest::header::HeaderName::from_static("x-plex-token"),
            reqwest::header::HeaderValue::from_str(token)
                .map_err(|_| SourceError::Config("Invalid Plex token format".to_string()))?,
        );
        headers.insert(
            reqwest::header::HeaderName::from_static("x-plex-client-identifier"),
            reqwest::header::HeaderValue::from_static("posterkeep-cli"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| SourceError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            server_url: server_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, path: &str, start: Option<(usize, usize)>) -> Result<Value, SourceError> {
        let url = format!("{}{}", self.server_url, path);
        let mut request = self.client.get(&url);
        if let Some((offset, size)) = start {
            request = request
                .header("X-Plex-Container-Start", offset.to_string())
                .header("X-Plex-Container-Size", size.to_string());
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::transport(&url, e))?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SourceError::data(&url, format!("invalid JSON: {}", e)))
    }

    pub async fn get_libraries(&self) -> Result<Vec<LibraryInfo>, SourceError> {
        let json = self.get_json("/library/sections", None).await?;
        parse_libraries(&json)
    }

    pub async fn get_section_page(
        &self,
        library_key: &str,
        listing: SectionListing,
        offset: usize,
        size: usize,
    ) -> Result<ItemPage, SourceError> {
        let path = match listing {
            SectionListing::Movies => format!("/library/sections/{}/all?type=1", library_key),
            SectionListing::Shows => format!("/library/sections/{}/all?type=2", library_key),
            SectionListing::Collections => format!("/library/sections/{}/collections", library_key),
        };
        let json = self.get_json(&path, Some((offset, size))).await?;
        let page = parse_item_page(&json, &path)?;
        debug!(
            "Plex {:?} page: library={}, offset={}, returned={}, total={:?}",
            listing,
            library_key,
            offset,
            page.items.len(),
            page.total_count
        );
        Ok(page)
    }

    pub async fn get_children_page(
        &self,
        rating_key: &str,
        offset: usize,
        size: usize,
    ) -> Result<ItemPage, SourceError> {
        let path = format!("/library/metadata/{}/children", rating_key);
        let json = self.get_json(&path, Some((offset, size))).await?;
        parse_item_page(&json, &path)
    }

    /// Download artwork; `thumb` is the server-relative path Plex reports
    pub async fn get_image(&self, thumb: &str) -> Result<Vec<u8>, SourceError> {
        let url = if thumb.starts_with("http://") || thumb.starts_with("https://") {
            thumb.to_string()
        } else {
            format!("{}{}", self.server_url, thumb)
        };

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "image/*")
            .send()
            .await
            .map_err(|e| SourceError::transport(&url, e))?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::transport(&url, e))?;
        if bytes.is_empty() {
            return Err(SourceError::data(&url, "empty image body"));
        }
        Ok(bytes.to_vec())
    }
}

fn media_container<'a>(json: &'a Value, context: &str) -> Result<&'a Value, SourceError> {
    json.get("MediaContainer")
        .ok_or_else(|| SourceError::data(context, "missing MediaContainer"))
}

pub(crate) fn parse_libraries(json: &Value) -> Result<Vec<LibraryInfo>, SourceError> {
    let container = media_container(json, "/library/sections")?;
    let mut libraries = Vec::new();
    if let Some(dir_array) = container.get("Directory").and_then(|d| d.as_array()) {
        for dir in dir_array {
            let key = dir.get("key").and_then(|k| k.as_str()).unwrap_or("").to_string();
            if key.is_empty() {
                continue;
            }
            let type_ = dir.get("type").and_then(|t| t.as_str()).unwrap_or("").to_string();
            let title = dir.get("title").and_then(|t| t.as_str()).unwrap_or("").to_string();
            libraries.push(LibraryInfo { key, type_, title });
        }
    }
    Ok(libraries)
}

/// Plex sends ratingKey as a string, some proxies as a number
fn rating_key(item: &Value) -> Option<String> {
    match item.get("ratingKey")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn parse_item_page(json: &Value, context: &str) -> Result<ItemPage, SourceError> {
    let container = media_container(json, context)?;
    let total_count = container
        .get("totalSize")
        .and_then(|t| t.as_u64())
        .map(|t| t as usize);

    let mut items = Vec::new();
    if let Some(meta_array) = container.get("Metadata").and_then(|m| m.as_array()) {
        for item in meta_array {
            let Some(id) = rating_key(item) else {
                let title = item.get("title").and_then(|t| t.as_str()).unwrap_or("unknown");
                return Err(SourceError::data(context, format!("item '{}' has no ratingKey", title)));
            };
            let title = item.get("title").and_then(|t| t.as_str()).unwrap_or("").to_string();
            let thumb_ref = item
                .get("thumb")
                .and_then(|t| t.as_str())
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            let parent_title = item
                .get("parentTitle")
                .and_then(|t| t.as_str())
                .map(str::to_string);
            items.push(RemoteItem {
                id,
                title,
                thumb_ref,
                parent_title,
            });
        }
    }

    Ok(ItemPage { items, total_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_item_page() {
        let json = json!({
            "MediaContainer": {
                "size": 2,
                "totalSize": 40,
                "Metadata": [
                    {"ratingKey": "5821", "title": "The Matrix", "thumb": "/library/metadata/5821/thumb/1"},
                    {"ratingKey": 77, "title": "Heat"}
                ]
            }
        });
        let page = parse_item_page(&json, "test").unwrap();
        assert_eq!(page.total_count, Some(40));
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].thumb_ref.as_deref(), Some("/library/metadata/5821/thumb/1"));
        assert_eq!(page.items[1].id, "77");
        assert!(page.items[1].thumb_ref.is_none());
    }

    #[test]
    fn test_parse_empty_page() {
        let json = json!({"MediaContainer": {"size": 0, "totalSize": 0}});
        let page = parse_item_page(&json, "test").unwrap();
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_missing_container_is_data_error() {
        let err = parse_item_page(&json!({"errors": []}), "test").unwrap_err();
        assert!(matches!(err, SourceError::Data { .. }));
        assert!(!err.is_transport());
    }

    #[test]
    fn test_item_without_rating_key_is_data_error() {
        let json = json!({"MediaContainer": {"Metadata": [{"title": "Broken"}]}});
        assert!(parse_item_page(&json, "test").is_err());
    }

    #[test]
    fn test_parse_libraries() {
        let json = json!({
            "MediaContainer": {
                "Directory": [
                    {"key": "1", "type": "movie", "title": "Movies"},
                    {"key": "2", "type": "show", "title": "TV Shows"},
                    {"key": "", "type": "artist", "title": "Broken"}
                ]
            }
        });
        let libraries = parse_libraries(&json).unwrap();
        assert_eq!(libraries.len(), 2);
        assert_eq!(libraries[1].type_, "show");
    }
}
