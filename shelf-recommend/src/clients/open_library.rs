//! Open Library search backend
//!
//! `GET {base}/search.json` with the query variant mapped onto Open Library's
//! own parameters (`title`, `author`, `q`). Ordering and language options are
//! ignored.

use crate::clients::{http_client, rate_limiter, search_timeout, RateLimiter};
use crate::types::{
    BackendError, BookSource, CatalogRecord, SearchBackend, SearchOptions, SearchQuery,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map};
use shelf_common::config::OpenLibraryConfig;
use tracing::debug;

const COVERS_URL: &str = "https://covers.openlibrary.org/b/id";

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<Doc>,
}

#[derive(Debug, Default, Deserialize)]
struct Doc {
    key: Option<String>,
    #[serde(default)]
    title: String,
    subtitle: Option<String>,
    #[serde(default)]
    author_name: Vec<String>,
    #[serde(default)]
    isbn: Vec<String>,
    #[serde(default)]
    language: Vec<String>,
    first_publish_year: Option<i32>,
    cover_i: Option<i64>,
}

pub struct OpenLibraryClient {
    client: reqwest::Client,
    rate_limiter: RateLimiter,
    config: OpenLibraryConfig,
}

impl OpenLibraryClient {
    pub fn new(config: OpenLibraryConfig) -> Result<Self, BackendError> {
        let client =
            http_client(search_timeout()).map_err(|e| BackendError::Network(e.to_string()))?;
        Ok(Self {
            client,
            rate_limiter: rate_limiter(config.rate_per_second),
            config,
        })
    }

    fn query_params(&self, query: &SearchQuery, opts: &SearchOptions) -> Vec<(&'static str, String)> {
        let limit = opts.max.unwrap_or(self.config.limit);
        let mut params = match query {
            SearchQuery::Title(title) => vec![("title", title.clone())],
            SearchQuery::Author(author) => vec![("author", author.clone())],
            SearchQuery::TitleAuthor { title, author } => {
                vec![("title", title.clone()), ("author", author.clone())]
            }
            SearchQuery::Isbn(isbn) => vec![("q", format!("isbn:{}", isbn))],
            SearchQuery::Keywords(keywords) => vec![("q", keywords.clone())],
        };
        params.push(("limit", limit.to_string()));
        params
    }
}

#[async_trait]
impl SearchBackend for OpenLibraryClient {
    fn name(&self) -> &'static str {
        "open_library"
    }

    async fn search(
        &self,
        query: &SearchQuery,
        opts: &SearchOptions,
    ) -> Result<Vec<CatalogRecord>, BackendError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/search.json", self.config.base_url.trim_end_matches('/'));
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

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        debug!(query = %query, hits = body.docs.len(), "Open Library response");
        Ok(body.docs.into_iter().map(into_record).collect())
    }
}

fn into_record(doc: Doc) -> CatalogRecord {
    let key = doc.key.filter(|k| !k.is_empty());

    let mut metadata = Map::new();
    let info_url = key
        .as_deref()
        .map(|k| format!("https://openlibrary.org{}", k))
        .unwrap_or_default();
    metadata.insert("info_url".to_string(), json!(info_url));

    CatalogRecord {
        title: doc.title,
        authors: doc.author_name,
        isbn13: doc.isbn.into_iter().find(|i| i.len() == 13),
        language: doc.language.into_iter().next(),
        published_year: doc.first_publish_year,
        description: doc.subtitle.unwrap_or_default(),
        cover_url: doc
            .cover_i
            .map(|id| format!("{}/{}-M.jpg", COVERS_URL, id))
            .unwrap_or_default(),
        source: BookSource::OpenLibrary,
        source_id: key.map(|k| k.trim_start_matches("/works/").to_string()),
        metadata,
    }
}
