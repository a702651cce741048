//! Job store
//!
//! SQLite database `tunepipe.db` in the root folder. Connections come from a
//! shared pool; each statement borrows one and returns it on drop.

pub mod jobs;

use sqlx::SqlitePool;
use std::path::Path;
use tunepipe_common::Result;

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "tunepipe.db";

/// Open (creating if needed) the database and its tables
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS download_jobs (
            uuid TEXT PRIMARY KEY,
            track_id TEXT NOT NULL,
            status TEXT NOT NULL,
            file_path TEXT,
            error TEXT,
            enrichment TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_download_jobs_status ON download_jobs(status)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (download_jobs)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(DATABASE_FILE_NAME);

        let pool = init_database_pool(&path).await.unwrap();
        init_tables(&pool).await.unwrap();
        assert!(path.exists());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM download_jobs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
