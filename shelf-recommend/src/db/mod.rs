//! SQLite persistence
//!
//! `books` holds catalog records (one row per `(source, source_id)`);
//! `library_items` and `recommended_items` each reference a book at most once.

pub mod books;
pub mod lists;

pub use books::SqliteCatalogStore;
pub use lists::{ListEntry, ToggleStatus};

use shelf_common::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{debug, info};

/// Open (creating if needed) the database file and initialize tables
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    info!("Database ready: {}", db_path.display());
    Ok(pool)
}

/// In-memory database with initialized tables
///
/// A single connection keeps every query on the same memory database.
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS books (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            authors TEXT NOT NULL DEFAULT '[]',
            isbn13 TEXT,
            language TEXT,
            published_year INTEGER,
            description TEXT NOT NULL DEFAULT '',
            cover_url TEXT NOT NULL DEFAULT '',
            source TEXT NOT NULL DEFAULT 'manual',
            source_id TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (source, source_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    for table in ["library_items", "recommended_items"] {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                book_id TEXT NOT NULL UNIQUE REFERENCES books(id) ON DELETE CASCADE,
                reason TEXT,
                created_at TEXT NOT NULL
            )
            "#,
            table
        ))
        .execute(pool)
        .await?;
    }

    debug!("Database tables initialized (books, library_items, recommended_items)");
    Ok(())
}
