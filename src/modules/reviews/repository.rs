//! Review persistence.

use lectern_db::{Database, DbError};
use lectern_http::pagination::Pagination;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::models::{Review, ReviewChanges};
use crate::utils;

pub const TABLE: &str = "reviews";
/// At most one review per (book, user).
pub const PAIR_UNIQUE: &[&str] = &["book_id", "user_id"];

pub const SCHEMA: &[&str] = &[
    "CREATE TABLE reviews (
        id TEXT PRIMARY KEY NOT NULL,
        book_id TEXT NOT NULL REFERENCES books(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL,
        rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        is_edited INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        UNIQUE (book_id, user_id)
    )",
    "CREATE INDEX idx_reviews_user ON reviews(user_id, created_at)",
    "CREATE TABLE review_likes (
        review_id TEXT NOT NULL REFERENCES reviews(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL,
        PRIMARY KEY (review_id, user_id)
    )",
];

/// Review columns plus `likes`, a JSON array of liker ids in like order.
const COLUMNS: &str = "r.id, r.book_id, r.user_id, r.rating, r.title, r.content, \
    r.is_edited, r.created_at, r.updated_at, \
    (SELECT json_group_array(l.user_id) FROM \
        (SELECT user_id FROM review_likes WHERE review_id = r.id ORDER BY rowid) AS l) AS likes";

/// Typed access to the `reviews` and `review_likes` tables.
#[derive(Clone)]
pub struct ReviewRepository {
    db: Database,
}

impl ReviewRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a new review. A duplicate `(book, user)` pair fails with
    /// [`DbError::UniqueViolation`] on [`PAIR_UNIQUE`]; a book that no
    /// longer exists fails with [`DbError::ForeignKeyViolation`].
    pub async fn insert(&self, review: &Review) -> Result<Review, DbError> {
        sqlx::query(
            "INSERT INTO reviews (id, book_id, user_id, rating, title, content, is_edited,
                created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&review.id)
        .bind(&review.book)
        .bind(&review.user)
        .bind(i64::from(review.rating))
        .bind(&review.title)
        .bind(&review.content)
        .bind(review.is_edited)
        .bind(utils::to_unix_nanos(review.created_at))
        .bind(utils::to_unix_nanos(review.updated_at))
        .execute(self.db.pool())
        .await?;

        Ok(Review {
            likes: Vec::new(),
            ..review.clone()
        })
    }

    pub async fn get(&self, id: &str) -> Result<Option<Review>, DbError> {
        let sql = format!("SELECT {COLUMNS} FROM reviews r WHERE r.id = ?");
        sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .map(|row| review_from_row(&row))
            .transpose()
    }

    pub async fn find_by_pair(&self, book_id: &str, user_id: &str) -> Result<Option<Review>, DbError> {
        let sql = format!("SELECT {COLUMNS} FROM reviews r WHERE r.book_id = ? AND r.user_id = ?");
        sqlx::query(&sql)
            .bind(book_id)
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?
            .map(|row| review_from_row(&row))
            .transpose()
    }

    /// A page of a book's reviews, newest first, plus the total count.
    pub async fn list_for_book(
        &self,
        book_id: &str,
        pagination: Pagination,
    ) -> Result<(Vec<Review>, usize), DbError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM reviews r WHERE r.book_id = ?
             ORDER BY r.created_at DESC, r.rowid DESC LIMIT ? OFFSET ?"
        );

        let mut tx = self.db.begin().await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE book_id = ?")
            .bind(book_id)
            .fetch_one(&mut *tx)
            .await?;
        let rows = sqlx::query(&sql)
            .bind(book_id)
            .bind(i64::try_from(pagination.limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(pagination.skip()).unwrap_or(i64::MAX))
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        let reviews = rows.iter().map(review_from_row).collect::<Result<_, _>>()?;
        Ok((reviews, usize::try_from(total).unwrap_or_default()))
    }

    /// Every review written by a user, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Review>, DbError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM reviews r WHERE r.user_id = ?
             ORDER BY r.created_at DESC, r.rowid DESC"
        );
        sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?
            .iter()
            .map(review_from_row)
            .collect()
    }

    /// Apply an edit, marking the review as edited.
    pub async fn apply_changes(
        &self,
        id: &str,
        changes: &ReviewChanges,
    ) -> Result<Option<Review>, DbError> {
        let updated = sqlx::query(
            "UPDATE reviews SET
                rating = COALESCE(?, rating),
                title = COALESCE(?, title),
                content = COALESCE(?, content),
                is_edited = 1,
                updated_at = ?
             WHERE id = ?",
        )
        .bind(changes.rating.map(i64::from))
        .bind(&changes.title)
        .bind(&changes.content)
        .bind(utils::to_unix_nanos(utils::now()))
        .bind(id)
        .execute(self.db.pool())
        .await?
        .rows_affected();

        if updated == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    /// Flip a user's like in one transaction.
    pub async fn toggle_like(&self, id: &str, user_id: &str) -> Result<Option<Review>, DbError> {
        let mut tx = self.db.begin().await?;

        let removed = sqlx::query("DELETE FROM review_likes WHERE review_id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed == 0 {
            let inserted = sqlx::query(
                "INSERT INTO review_likes (review_id, user_id)
                 SELECT id, ? FROM reviews WHERE id = ?",
            )
            .bind(user_id)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if inserted == 0 {
                return Ok(None);
            }
        }

        let sql = format!("SELECT {COLUMNS} FROM reviews r WHERE r.id = ?");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *tx).await?;
        tx.commit().await?;

        row.map(|row| review_from_row(&row)).transpose()
    }

    /// Delete a review and its likes. Returns whether it existed.
    pub async fn delete(&self, id: &str) -> Result<bool, DbError> {
        let deleted = sqlx::query("DELETE FROM reviews WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    pub async fn clear(&self) -> Result<u64, DbError> {
        Ok(sqlx::query("DELETE FROM reviews")
            .execute(self.db.pool())
            .await?
            .rows_affected())
    }
}

fn review_from_row(row: &SqliteRow) -> Result<Review, DbError> {
    let rating: i64 = row.try_get("rating")?;
    let likes: String = row.try_get("likes")?;

    Ok(Review {
        id: row.try_get("id")?,
        book: row.try_get("book_id")?,
        user: row.try_get("user_id")?,
        rating: u8::try_from(rating).map_err(|e| DbError::corrupt("rating", e.to_string()))?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        likes: serde_json::from_str(&likes).map_err(|e| DbError::corrupt("likes", e.to_string()))?,
        is_edited: row.try_get("is_edited")?,
        created_at: utils::from_unix_nanos("created_at", row.try_get("created_at")?)?,
        updated_at: utils::from_unix_nanos("updated_at", row.try_get("updated_at")?)?,
    })
}
