use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

use crate::error::DbError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Generate a fresh, time-ordered row id.
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

/// Handle to the SQLite store. Cheap to clone; clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database file at `path`.
    ///
    /// The file runs in WAL mode with full synchronous commits and foreign
    /// keys enforced on every connection.
    pub async fn open(path: &Path, max_connections: u32) -> Result<Self, DbError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| DbError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        tracing::debug!(path = %path.display(), max_connections, "sqlite database opened");
        Ok(Self { pool })
    }

    /// A private in-memory database, gone when the last clone is dropped.
    ///
    /// Every SQLite memory connection is its own database, so the pool is
    /// pinned to a single connection that is never recycled.
    pub async fn in_memory() -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a transaction. Dropping it without `commit` rolls back.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, DbError> {
        Ok(self.pool.begin().await?)
    }

    /// Run `statements` and record `key`, both in one transaction, unless
    /// `key` was already recorded. Returns whether the migration ran.
    pub async fn apply_migration(&self, key: &str, statements: &[&str]) -> Result<bool, DbError> {
        self.ensure_migrations_table().await?;

        let mut tx = self.pool.begin().await?;
        let applied: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM _lectern_migrations WHERE key = ?")
                .bind(key)
                .fetch_optional(&mut *tx)
                .await?;
        if applied.is_some() {
            return Ok(false);
        }

        for statement in statements {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }
        sqlx::query(
            "INSERT INTO _lectern_migrations (key, applied_at) VALUES (?, strftime('%s', 'now'))",
        )
        .bind(key)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::debug!(key, statements = statements.len(), "migration committed");
        Ok(true)
    }

    pub async fn is_applied(&self, key: &str) -> Result<bool, DbError> {
        self.ensure_migrations_table().await?;

        let applied: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM _lectern_migrations WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(applied.is_some())
    }

    pub async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Wait for open connections to finish and close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn ensure_migrations_table(&self) -> Result<(), DbError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS _lectern_migrations (
                key TEXT PRIMARY KEY NOT NULL,
                applied_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDGETS: &[&str] = &[
        "CREATE TABLE widgets (
            id TEXT PRIMARY KEY NOT NULL,
            sku TEXT NOT NULL,
            bin TEXT NOT NULL,
            UNIQUE (sku, bin)
        )",
        "CREATE TABLE parts (
            id TEXT PRIMARY KEY NOT NULL,
            widget_id TEXT NOT NULL REFERENCES widgets(id) ON DELETE CASCADE
        )",
    ];

    async fn widgets_db() -> Database {
        let db = Database::in_memory().await.unwrap();
        assert!(db.apply_migration("widgets:001_init", WIDGETS).await.unwrap());
        db
    }

    async fn insert_widget(db: &Database, sku: &str, bin: &str) -> Result<String, DbError> {
        let id = new_id();
        sqlx::query("INSERT INTO widgets (id, sku, bin) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(sku)
            .bind(bin)
            .execute(db.pool())
            .await?;
        Ok(id)
    }

    #[tokio::test]
    async fn migrations_apply_once() {
        let db = widgets_db().await;
        assert!(db.is_applied("widgets:001_init").await.unwrap());
        assert!(!db.apply_migration("widgets:001_init", WIDGETS).await.unwrap());
        assert!(!db.is_applied("widgets:002_more").await.unwrap());
    }

    #[tokio::test]
    async fn failed_migration_leaves_no_trace() {
        let db = Database::in_memory().await.unwrap();
        let broken = &["CREATE TABLE gadgets (id TEXT PRIMARY KEY)", "NOT SQL"];

        assert!(db.apply_migration("gadgets:001_init", broken).await.is_err());
        assert!(!db.is_applied("gadgets:001_init").await.unwrap());

        let tables: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE name = 'gadgets'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(tables, 0);
    }

    #[tokio::test]
    async fn unique_constraint_maps_to_violation() {
        let db = widgets_db().await;
        insert_widget(&db, "A-1", "north").await.unwrap();
        insert_widget(&db, "A-1", "south").await.unwrap();

        let err = insert_widget(&db, "A-1", "north").await.unwrap_err();
        assert!(err.violates_unique("widgets", &["sku", "bin"]), "{err:?}");
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let db = widgets_db().await;
        let err = sqlx::query("INSERT INTO parts (id, widget_id) VALUES (?, 'ghost')")
            .bind(new_id())
            .execute(db.pool())
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation), "{err:?}");
    }

    #[tokio::test]
    async fn committed_writes_survive_reopen_without_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("lectern.db");

        let db = Database::open(&path, 2).await.unwrap();
        db.apply_migration("widgets:001_init", WIDGETS).await.unwrap();
        insert_widget(&db, "A-1", "north").await.unwrap();
        drop(db);

        let reopened = Database::open(&path, 2).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM widgets")
            .fetch_one(reopened.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert!(reopened.is_applied("widgets:001_init").await.unwrap());
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let db = widgets_db().await;
        {
            let mut tx = db.begin().await.unwrap();
            sqlx::query("INSERT INTO widgets (id, sku, bin) VALUES ('w1', 'A-1', 'north')")
                .execute(&mut *tx)
                .await
                .unwrap();
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM widgets")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
