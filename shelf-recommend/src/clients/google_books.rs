//! Google Books search backend
//!
//! `GET {base}/volumes?q=...&printType=books&maxResults=...&orderBy=...`
//! with optional `langRestrict` and `key`. Each volume maps to one
//! [`CatalogRecord`] with `source = google` and `source_id` = volume id.

use crate::clients::{http_client, rate_limiter, search_timeout, RateLimiter};
use crate::types::{
    BackendError, BookSource, CatalogRecord, SearchBackend, SearchOptions, SearchQuery,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map};
use shelf_common::config::GoogleBooksConfig;
use tracing::debug;

/// The volumes endpoint rejects larger pages
const MAX_RESULTS_CAP: u32 = 40;

#[derive(Debug, Default, Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
struct Volume {
    id: String,
    #[serde(rename = "volumeInfo", default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    #[serde(default)]
    title: String,
    #[serde(default)]
    authors: Vec<String>,
    published_date: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    industry_identifiers: Vec<IndustryIdentifier>,
    image_links: Option<ImageLinks>,
    language: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
    page_count: Option<u32>,
    info_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

#[derive(Debug, Deserialize)]
struct ImageLinks {
    thumbnail: Option<String>,
}

pub struct GoogleBooksClient {
    client: reqwest::Client,
    rate_limiter: RateLimiter,
    config: GoogleBooksConfig,
}

impl GoogleBooksClient {
    pub fn new(config: GoogleBooksConfig) -> Result<Self, BackendError> {
        let client =
            http_client(search_timeout()).map_err(|e| BackendError::Network(e.to_string()))?;
        Ok(Self {
            client,
            rate_limiter: rate_limiter(config.rate_per_second),
            config,
        })
    }

    fn query_params(&self, query: &SearchQuery, opts: &SearchOptions) -> Vec<(&'static str, String)> {
        let max = opts.max.unwrap_or(self.config.max_results).min(MAX_RESULTS_CAP);
        let mut params = vec![
            ("q", query.to_string()),
            ("printType", "books".to_string()),
            ("maxResults", max.to_string()),
            ("orderBy", opts.order_by.as_str().to_string()),
        ];
        if let Some(lang) = opts.language_restrict.as_deref().filter(|l| !l.is_empty()) {
            params.push(("langRestrict", lang.to_string()));
        }
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            params.push(("key", key.to_string()));
        }
        params
    }
}

#[async_trait]
impl SearchBackend for GoogleBooksClient {
    fn name(&self) -> &'static str {
        "google_books"
    }

    async fn search(
        &self,
        query: &SearchQuery,
        opts: &SearchOptions,
    ) -> Result<Vec<CatalogRecord>, BackendError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/volumes", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&self.query_params(query, opts))
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body: VolumesResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        debug!(query = %query, hits = body.items.len(), "Google Books response");
        Ok(body.items.into_iter().map(into_record).collect())
    }
}

fn into_record(volume: Volume) -> CatalogRecord {
    let info = volume.volume_info;

    let mut metadata = Map::new();
    metadata.insert("categories".to_string(), json!(info.categories));
    metadata.insert("pageCount".to_string(), json!(info.page_count.unwrap_or(0)));
    metadata.insert("infoLink".to_string(), json!(info.info_link.unwrap_or_default()));

    CatalogRecord {
        title: info.title,
        authors: info.authors,
        isbn13: info
            .industry_identifiers
            .into_iter()
            .find(|id| id.kind.contains("ISBN_13"))
            .map(|id| id.identifier),
        language: info.language.filter(|l| !l.is_empty()),
        published_year: info.published_date.as_deref().and_then(parse_year),
        description: info.description,
        cover_url: info.image_links.and_then(|l| l.thumbnail).unwrap_or_default(),
        source: BookSource::Google,
        source_id: Some(volume.id),
        metadata,
    }
}

/// Year from the leading four characters of `publishedDate` ("2016", "2016-11-18")
fn parse_year(date: &str) -> Option<i32> {
    date.get(..4).and_then(|y| y.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderBy;

    #[test]
    fn test_volume_mapping() {
        let body: VolumesResponse = serde_json::from_value(json!({
            "items": [{
                "id": "Np9SDQAAQBAJ",
                "volumeInfo": {
                    "title": "Deep Learning",
                    "authors": ["Ian Goodfellow", "Yoshua Bengio"],
                    "publishedDate": "2016-11-18",
                    "industryIdentifiers": [
                        { "type": "ISBN_10", "identifier": "0262035618" },
                        { "type": "ISBN_13", "identifier": "9780262035613" }
                    ],
                    "imageLinks": { "thumbnail": "http://books.google.com/thumb" },
                    "language": "en",
                    "pageCount": 800,
                    "infoLink": "https://books.google.com/books?id=Np9SDQAAQBAJ&hl=en"
                }
            }]
        }))
        .unwrap();

        let record = into_record(body.items.into_iter().next().unwrap());
        assert_eq!(record.isbn13.as_deref(), Some("9780262035613"));
        assert_eq!(record.published_year, Some(2016));
        assert_eq!(record.cover_url, "http://books.google.com/thumb");
        assert_eq!(record.source_id.as_deref(), Some("Np9SDQAAQBAJ"));
        assert_eq!(record.metadata["pageCount"], json!(800));
        assert_eq!(record.dedup_key(), "google:Np9SDQAAQBAJ");
    }

    #[test]
    fn test_sparse_volume_mapping() {
        let volume: Volume = serde_json::from_value(json!({ "id": "x" })).unwrap();
        let record = into_record(volume);
        assert_eq!(record.title, "");
        assert!(record.isbn13.is_none());
        assert!(record.published_year.is_none());
        assert_eq!(record.metadata["infoLink"], json!(""));
    }

    #[test]
    fn test_query_params() {
        let client = GoogleBooksClient::new(GoogleBooksConfig {
            api_key: Some("k".into()),
            ..Default::default()
        })
        .unwrap();
        let opts = SearchOptions {
            max: Some(100),
            order_by: OrderBy::Newest,
            language_restrict: Some("ja".into()),
        };
        let params = client.query_params(&SearchQuery::Title("Rust".into()), &opts);
        assert!(params.contains(&("q", "intitle:\"Rust\"".to_string())));
        assert!(params.contains(&("maxResults", "40".to_string())));
        assert!(params.contains(&("orderBy", "newest".to_string())));
        assert!(params.contains(&("langRestrict", "ja".to_string())));
        assert!(params.contains(&("key", "k".to_string())));
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2016-11-18"), Some(2016));
        assert_eq!(parse_year("19"), None);
        assert_eq!(parse_year("n.d."), None);
    }
}
