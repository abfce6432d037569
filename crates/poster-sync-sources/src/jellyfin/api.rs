use poster_sync_models::{ItemPage, RemoteItem};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::SourceError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VirtualFolder {
    pub name: String,
    pub item_id: String,
    #[serde(default)]
    pub collection_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BaseItem {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    series_name: Option<String>,
    #[serde(default)]
    image_tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemsResponse {
    items: Vec<BaseItem>,
    #[serde(default)]
    total_record_count: Option<usize>,
}

pub struct JellyfinHttpClient {
    client: Client,
    server_url: String,
}

impl JellyfinHttpClient {
    pub fn new(
        api_key: &str,
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
            reqwest::header::HeaderName::from_static("x-emby-token"),
            reqwest::header::HeaderValue::from_str(api_key)
                .map_err(|_| SourceError::Config("Invalid Jellyfin API key format".to_string()))?,
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

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, SourceError> {
        let url = format!("{}{}", self.server_url, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| SourceError::transport(&url, e))?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::transport(&url, e))?;
        serde_json::from_str(&body).map_err(|e| SourceError::data(&url, e.to_string()))
    }

    pub async fn get_virtual_folders(&self) -> Result<Vec<VirtualFolder>, SourceError> {
        self.get("/Library/VirtualFolders", &[]).await
    }

    pub async fn get_items_page(
        &self,
        parent_id: &str,
        item_types: &str,
        offset: usize,
        size: usize,
    ) -> Result<ItemPage, SourceError> {
        let query = [
            ("ParentId", parent_id.to_string()),
            ("IncludeItemTypes", item_types.to_string()),
            ("Recursive", "true".to_string()),
            ("SortBy", "SortName".to_string()),
            ("StartIndex", offset.to_string()),
            ("Limit", size.to_string()),
        ];
        let response: ItemsResponse = self.get("/Items", &query).await?;
        Ok(into_page(response))
    }

    pub async fn get_seasons_page(
        &self,
        series_id: &str,
        offset: usize,
        size: usize,
    ) -> Result<ItemPage, SourceError> {
        let query = [
            ("StartIndex", offset.to_string()),
            ("Limit", size.to_string()),
        ];
        let response: ItemsResponse = self
            .get(&format!("/Shows/{}/Seasons", series_id), &query)
            .await?;
        Ok(slice_page(into_page(response), offset, size))
    }

    pub async fn get_primary_image(&self, item_id: &str) -> Result<Vec<u8>, SourceError> {
        let url = format!("{}/Items/{}/Images/Primary", self.server_url, item_id);
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

fn into_page(response: ItemsResponse) -> ItemPage {
    let items = response
        .items
        .into_iter()
        .map(|item| {
            // Artwork is addressed by item id; only items with a primary image have one
            let thumb_ref = item.image_tags.contains_key("Primary").then(|| item.id.clone());
            RemoteItem {
                id: item.id,
                title: item.name,
                thumb_ref,
                parent_title: item.series_name,
            }
        })
        .collect();
    ItemPage {
        items,
        total_count: response.total_record_count,
    }
}

/// Older servers ignore paging on the seasons endpoint and return everything
fn slice_page(page: ItemPage, offset: usize, size: usize) -> ItemPage {
    match page.total_count {
        Some(total) if page.items.len() == total && total > size => ItemPage {
            items: page.items.into_iter().skip(offset).take(size).collect(),
            total_count: Some(total),
        },
        _ => page,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_response_to_page() {
        let body = r#"{
            "Items": [
                {"Id": "a1b2", "Name": "Alien", "ImageTags": {"Primary": "tag"}},
                {"Id": "c3d4", "Name": "Season 1", "SeriesName": "Dark", "ImageTags": {}}
            ],
            "TotalRecordCount": 2
        }"#;
        let response: ItemsResponse = serde_json::from_str(body).unwrap();
        let page = into_page(response);
        assert_eq!(page.total_count, Some(2));
        assert_eq!(page.items[0].thumb_ref.as_deref(), Some("a1b2"));
        assert!(page.items[1].thumb_ref.is_none());
        assert_eq!(page.items[1].parent_title.as_deref(), Some("Dark"));
    }

    #[test]
    fn test_slice_unpaged_seasons() {
        let items: Vec<RemoteItem> = (0..5)
            .map(|i| RemoteItem {
                id: format!("s{}", i),
                title: format!("Season {}", i),
                thumb_ref: None,
                parent_title: None,
            })
            .collect();
        let page = ItemPage { items, total_count: Some(5) };
        let sliced = slice_page(page, 2, 2);
        let ids: Vec<_> = sliced.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s3"]);
    }

    #[test]
    fn test_virtual_folder_parse() {
        let body = r#"[{"Name": "Movies", "ItemId": "f00d", "CollectionType": "movies"}]"#;
        let folders: Vec<VirtualFolder> = serde_json::from_str(body).unwrap();
        assert_eq!(folders[0].item_id, "f00d");
        assert_eq!(folders[0].collection_type.as_deref(), Some("movies"));
    }
}
