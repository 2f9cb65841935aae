//! Library and recommended lists
//!
//! Both lists hold at most one entry per book. Adding an existing book is a
//! no-op for the library and refreshes the reason for the recommended list.

use crate::db::books::{parse_uuid, saved_book_from_row, SqliteCatalogStore, BOOK_COLUMNS};
use crate::types::SavedBook;
use chrono::{DateTime, Utc};
use serde::Serialize;
use shelf_common::Result;
use sqlx::Row;
use uuid::Uuid;

const LIBRARY: &str = "library_items";
const RECOMMENDED: &str = "recommended_items";

/// One list entry with its book
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListEntry {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub book: SavedBook,
}

/// Result of a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleStatus {
    Added,
    Removed,
}

impl SqliteCatalogStore {
    /// Attach books to the library; returns the number of entries written
    pub async fn add_library(&self, book_ids: &[Uuid]) -> Result<usize> {
        let mut added = 0;
        for id in book_ids {
            let result = sqlx::query(
                r#"
                INSERT INTO library_items (id, book_id, reason, created_at)
                VALUES (?, ?, NULL, ?)
                ON CONFLICT(book_id) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(id.to_string())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
            added += result.rows_affected() as usize;
        }
        Ok(added)
    }

    /// Attach books to the recommended list, each with its own reason
    pub async fn add_recommended(&self, items: &[(Uuid, Option<String>)]) -> Result<usize> {
        let mut added = 0;
        for (id, reason) in items {
            let result = sqlx::query(
                r#"
                INSERT INTO recommended_items (id, book_id, reason, created_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(book_id) DO UPDATE SET reason = excluded.reason
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(id.to_string())
            .bind(reason.as_deref().filter(|r| !r.trim().is_empty()))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
            added += result.rows_affected() as usize;
        }
        Ok(added)
    }

    /// Newest first
    pub async fn list_library(&self, limit: i64) -> Result<Vec<ListEntry>> {
        self.list(LIBRARY, limit).await
    }

    /// Newest first
    pub async fn list_recommended(&self, limit: i64) -> Result<Vec<ListEntry>> {
        self.list(RECOMMENDED, limit).await
    }

    /// Delete a recommended entry by entry id; returns the number removed
    pub async fn delete_recommended(&self, entry_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM recommended_items WHERE id = ?")
            .bind(entry_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn toggle_library(&self, book_id: Uuid) -> Result<ToggleStatus> {
        self.toggle(LIBRARY, book_id).await
    }

    pub async fn toggle_recommended(&self, book_id: Uuid) -> Result<ToggleStatus> {
        self.toggle(RECOMMENDED, book_id).await
    }

    async fn list(&self, table: &str, limit: i64) -> Result<Vec<ListEntry>> {
        let sql = format!(
            "SELECT i.id AS item_id, i.reason AS item_reason, i.created_at AS item_created_at, {} \
             FROM {} i JOIN books b ON b.id = i.book_id \
             ORDER BY i.created_at DESC LIMIT ?",
            BOOK_COLUMNS, table
        );
        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> Result<ListEntry> {
                let id: String = row.try_get("item_id")?;
                Ok(ListEntry {
                    id: parse_uuid(&id)?,
                    reason: row.try_get("item_reason")?,
                    created_at: row.try_get("item_created_at")?,
                    book: saved_book_from_row(row)?,
                })
            })
            .collect()
    }

    async fn toggle(&self, table: &str, book_id: Uuid) -> Result<ToggleStatus> {
        let removed = sqlx::query(&format!("DELETE FROM {} WHERE book_id = ?", table))
            .bind(book_id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();
        if removed > 0 {
            return Ok(ToggleStatus::Removed);
        }

        sqlx::query(&format!(
            "INSERT INTO {} (id, book_id, reason, created_at) VALUES (?, ?, NULL, ?)",
            table
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(book_id.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(ToggleStatus::Added)
    }
}
