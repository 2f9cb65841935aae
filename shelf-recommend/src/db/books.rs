//! Catalog record persistence

use crate::types::{BookSource, CatalogRecord, CatalogStore, SavedBook};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use shelf_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

pub(crate) const BOOK_COLUMNS: &str = "b.id, b.title, b.authors, b.isbn13, b.language, \
    b.published_year, b.description, b.cover_url, b.source, b.source_id, b.metadata";

/// SQLite-backed [`CatalogStore`] plus the library / recommended lists
#[derive(Clone)]
pub struct SqliteCatalogStore {
    pub(crate) pool: SqlitePool,
}

impl SqliteCatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or update one record, keyed by `(source, source_id)`
    ///
    /// Records without a source id cannot conflict and are always inserted.
    pub async fn upsert_book(&self, record: &CatalogRecord) -> Result<SavedBook> {
        let now = Utc::now();
        let authors = serde_json::to_string(&record.authors)
            .map_err(|e| Error::Internal(format!("Serialize authors: {}", e)))?;
        let metadata = serde_json::to_string(&record.metadata)
            .map_err(|e| Error::Internal(format!("Serialize metadata: {}", e)))?;

        let row = sqlx::query(
            r#"
            INSERT INTO books (
                id, title, authors, isbn13, language, published_year, description,
                cover_url, source, source_id, metadata, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source, source_id) DO UPDATE SET
                title = excluded.title,
                authors = excluded.authors,
                isbn13 = excluded.isbn13,
                language = excluded.language,
                published_year = excluded.published_year,
                description = excluded.description,
                cover_url = excluded.cover_url,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&record.title)
        .bind(authors)
        .bind(empty_as_null(record.isbn13.as_deref()))
        .bind(empty_as_null(record.language.as_deref()))
        .bind(record.published_year)
        .bind(&record.description)
        .bind(&record.cover_url)
        .bind(record.source.as_str())
        .bind(empty_as_null(record.source_id.as_deref()))
        .bind(metadata)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let id: String = row.try_get("id")?;
        Ok(SavedBook {
            id: parse_uuid(&id)?,
            record: record.clone(),
        })
    }

    /// Upsert every record, in order
    pub async fn upsert_books(&self, records: &[CatalogRecord]) -> Result<Vec<SavedBook>> {
        let mut saved = Vec::with_capacity(records.len());
        for record in records {
            saved.push(self.upsert_book(record).await?);
        }
        tracing::debug!(saved = saved.len(), "Books upserted");
        Ok(saved)
    }

    pub async fn get_book(&self, id: Uuid) -> Result<Option<SavedBook>> {
        let row = sqlx::query(&format!("SELECT {} FROM books b WHERE b.id = ?", BOOK_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(saved_book_from_row).transpose()
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn save_candidates(&self, records: &[CatalogRecord]) -> Result<Vec<SavedBook>> {
        self.upsert_books(records).await
    }
}

/// Map the [`BOOK_COLUMNS`] of a row
pub(crate) fn saved_book_from_row(row: &SqliteRow) -> Result<SavedBook> {
    let id: String = row.try_get("id")?;
    let authors: String = row.try_get("authors")?;
    let metadata: String = row.try_get("metadata")?;
    let source: String = row.try_get("source")?;

    let record = CatalogRecord {
        title: row.try_get("title")?,
        authors: serde_json::from_str(&authors).unwrap_or_default(),
        isbn13: row.try_get("isbn13")?,
        language: row.try_get("language")?,
        published_year: row.try_get("published_year")?,
        description: row.try_get("description")?,
        cover_url: row.try_get("cover_url")?,
        source: BookSource::from_db(&source),
        source_id: row.try_get("source_id")?,
        metadata: serde_json::from_str::<Map<String, Value>>(&metadata).unwrap_or_default(),
    };

    Ok(SavedBook {
        id: parse_uuid(&id)?,
        record,
    })
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Invalid stored id {}: {}", s, e)))
}

fn empty_as_null(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    fn record(source_id: Option<&str>) -> CatalogRecord {
        let mut r = CatalogRecord::new("Deep Learning", BookSource::Google);
        r.source_id = source_id.map(str::to_string);
        r.authors = vec!["Ian Goodfellow".into()];
        r
    }

    #[tokio::test]
    async fn test_upsert_keeps_id_on_conflict() {
        let store = SqliteCatalogStore::new(init_memory_pool().await.unwrap());

        let first = store.upsert_book(&record(Some("g1"))).await.unwrap();
        let mut updated = record(Some("g1"));
        updated.description = "Second edition".into();
        let second = store.upsert_book(&updated).await.unwrap();

        assert_eq!(first.id, second.id);
        let loaded = store.get_book(first.id).await.unwrap().unwrap();
        assert_eq!(loaded.record.description, "Second edition");
        assert_eq!(loaded.record.authors, vec!["Ian Goodfellow".to_string()]);
    }

    #[tokio::test]
    async fn test_records_without_source_id_never_conflict() {
        let store = SqliteCatalogStore::new(init_memory_pool().await.unwrap());
        let a = store.upsert_book(&record(None)).await.unwrap();
        let b = store.upsert_book(&record(Some(""))).await.unwrap();
        assert_ne!(a.id, b.id);
    }
}
