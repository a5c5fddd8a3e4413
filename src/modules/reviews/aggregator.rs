//! Rating aggregation.
//!
//! A book's `averageRating` and `reviewCount` are a cache over its reviews.
//! They are always recomputed from the full set of the book's ratings,
//! never adjusted incrementally, so re-running [`RatingAggregator::recompute`]
//! at any time repairs drift.

use lectern_db::{Database, DbError};
use serde::Serialize;
use sqlx::Row;
use thiserror::Error;

/// Aggregate values written onto a book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub average_rating: f64,
    pub review_count: u64,
}

/// Reads the ratings and writes the aggregates in one statement, so the
/// pair always describes one consistent set of reviews.
///
/// The mean is rounded half-up to one decimal in integer tenths:
/// `round(10 * sum / n) = (20 * sum + n) / (2 * n)`, so a mean of exactly
/// 4.25 becomes 4.3. With no reviews both aggregates are 0.
const RECOMPUTE: &str = "UPDATE books SET
        review_count = (SELECT COUNT(*) FROM reviews WHERE book_id = books.id),
        average_rating = COALESCE(
            (SELECT (20 * SUM(rating) + COUNT(*)) / (2 * COUNT(*))
             FROM reviews WHERE book_id = books.id),
            0) / 10.0
    WHERE id = ?
    RETURNING average_rating, review_count";

/// Aggregation that could not complete after a review write.
///
/// Never surfaced to the client of the triggering request.
#[derive(Error, Debug)]
pub enum AggregationFailure {
    #[error("book {0} no longer exists")]
    BookMissing(String),

    #[error("store error while aggregating ratings: {0}")]
    Store(#[from] DbError),
}

impl From<sqlx::Error> for AggregationFailure {
    fn from(err: sqlx::Error) -> Self {
        AggregationFailure::Store(err.into())
    }
}

/// Outcome of a catalog-wide repair pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    pub books: usize,
    pub failed: Vec<String>,
}

#[derive(Clone)]
pub struct RatingAggregator {
    db: Database,
}

impl RatingAggregator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Recompute and store a book's aggregates from all of its reviews.
    pub async fn recompute(&self, book_id: &str) -> Result<RatingSummary, AggregationFailure> {
        let row = sqlx::query(RECOMPUTE)
            .bind(book_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AggregationFailure::BookMissing(book_id.to_string()))?;

        let review_count: i64 = row.try_get("review_count")?;
        Ok(RatingSummary {
            average_rating: row.try_get("average_rating")?,
            review_count: u64::try_from(review_count)
                .map_err(|e| DbError::corrupt("review_count", e.to_string()))?,
        })
    }

    /// [`recompute`](Self::recompute) for use after a committed review
    /// write: failures are logged and swallowed.
    pub async fn refresh(&self, book_id: &str) -> Option<RatingSummary> {
        match self.recompute(book_id).await {
            Ok(summary) => {
                tracing::debug!(
                    book_id,
                    average_rating = summary.average_rating,
                    review_count = summary.review_count,
                    "book ratings recomputed"
                );
                Some(summary)
            }
            Err(e) => {
                tracing::warn!(book_id, error = %e, "rating aggregation failed");
                None
            }
        }
    }

    /// Recompute every book in the catalog.
    pub async fn recompute_all(&self) -> Result<RepairReport, DbError> {
        let book_ids: Vec<String> = sqlx::query_scalar("SELECT id FROM books ORDER BY rowid")
            .fetch_all(self.db.pool())
            .await?;

        let mut report = RepairReport::default();
        for book_id in book_ids {
            report.books += 1;
            if self.refresh(&book_id).await.is_none() {
                report.failed.push(book_id);
            }
        }

        tracing::info!(
            books = report.books,
            failed = report.failed.len(),
            "rating aggregates repaired"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::models::{Book, Genre};
    use crate::modules::books::repository::{self as books, BookRepository};
    use crate::modules::reviews::models::Review;
    use crate::modules::reviews::repository::{self as reviews, ReviewRepository};
    use crate::utils;

    struct Fixture {
        aggregator: RatingAggregator,
        books: BookRepository,
        reviews: ReviewRepository,
        db: Database,
    }

    async fn setup() -> Fixture {
        let db = Database::in_memory().await.unwrap();
        db.apply_migration("books:001_init", books::SCHEMA).await.unwrap();
        db.apply_migration("reviews:001_init", reviews::SCHEMA).await.unwrap();
        Fixture {
            aggregator: RatingAggregator::new(db.clone()),
            books: BookRepository::new(db.clone()),
            reviews: ReviewRepository::new(db.clone()),
            db,
        }
    }

    fn book(isbn: &str) -> Book {
        let now = utils::now();
        Book {
            id: lectern_db::new_id(),
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            description: "Spice and sand.".to_string(),
            cover_image: String::new(),
            isbn: isbn.to_string(),
            genre: Genre::ScienceFiction,
            published_year: 1965,
            average_rating: 0.0,
            review_count: 0,
            added_by: "admin".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn review(book: &str, user: &str, rating: u8) -> Review {
        let now = utils::now();
        Review {
            id: lectern_db::new_id(),
            book: book.to_string(),
            user: user.to_string(),
            rating,
            title: "Review".to_string(),
            content: "Some thoughts on the book.".to_string(),
            likes: Vec::new(),
            is_edited: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Aggregates of a fresh book reviewed with `ratings`.
    async fn summary_of(f: &Fixture, isbn: &str, ratings: &[u8]) -> RatingSummary {
        let stored = f.books.insert(&book(isbn)).await.unwrap();
        for (i, rating) in ratings.iter().enumerate() {
            f.reviews
                .insert(&review(&stored.id, &format!("user{i}"), *rating))
                .await
                .unwrap();
        }
        f.aggregator.recompute(&stored.id).await.unwrap()
    }

    async fn corrupt_aggregates(f: &Fixture, book_id: &str) {
        sqlx::query("UPDATE books SET average_rating = 1.0, review_count = 42 WHERE id = ?")
            .bind(book_id)
            .execute(f.db.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn empty_ratings_reset_to_zero() {
        let f = setup().await;
        let summary = summary_of(&f, "1", &[]).await;
        assert_eq!(summary.average_rating, 0.0);
        assert_eq!(summary.review_count, 0);
    }

    #[tokio::test]
    async fn mean_rounds_half_up_to_one_decimal() {
        let f = setup().await;
        // 17 / 4 = 4.25
        assert_eq!(summary_of(&f, "1", &[5, 4, 4, 4]).await.average_rating, 4.3);
        // 23 / 20 = 1.15 exactly, which floating point would round down
        let mut ratings = vec![1u8; 17];
        ratings.extend([2, 2, 2]);
        assert_eq!(summary_of(&f, "2", &ratings).await.average_rating, 1.2);
        // 14 / 3 = 4.666...
        assert_eq!(summary_of(&f, "3", &[5, 5, 4]).await.average_rating, 4.7);
        // 13 / 3 = 4.333...
        assert_eq!(summary_of(&f, "4", &[5, 4, 4]).await.average_rating, 4.3);
        assert_eq!(summary_of(&f, "5", &[5, 4]).await.average_rating, 4.5);
        assert_eq!(summary_of(&f, "6", &[3]).await.average_rating, 3.0);
    }

    #[tokio::test]
    async fn average_stays_within_bounds() {
        let f = setup().await;
        for rating in 1..=5u8 {
            let summary = summary_of(&f, &format!("isbn-{rating}"), &[rating; 7]).await;
            assert_eq!(summary.average_rating, f64::from(rating));
            assert_eq!(summary.review_count, 7);
        }
    }

    #[tokio::test]
    async fn recompute_writes_aggregates() {
        let f = setup().await;
        let stored = f.books.insert(&book("1")).await.unwrap();
        f.reviews.insert(&review(&stored.id, "alice", 5)).await.unwrap();
        f.reviews.insert(&review(&stored.id, "bob", 4)).await.unwrap();

        let summary = f.aggregator.recompute(&stored.id).await.unwrap();
        assert_eq!(summary.average_rating, 4.5);

        let reloaded = f.books.get(&stored.id).await.unwrap().unwrap();
        assert_eq!(reloaded.average_rating, 4.5);
        assert_eq!(reloaded.review_count, 2);
    }

    #[tokio::test]
    async fn recompute_is_idempotent_and_repairs_drift() {
        let f = setup().await;
        let stored = f.books.insert(&book("1")).await.unwrap();
        f.reviews.insert(&review(&stored.id, "alice", 3)).await.unwrap();

        corrupt_aggregates(&f, &stored.id).await;
        let first = f.aggregator.recompute(&stored.id).await.unwrap();
        let second = f.aggregator.recompute(&stored.id).await.unwrap();
        assert_eq!(first, second);

        let reloaded = f.books.get(&stored.id).await.unwrap().unwrap();
        assert_eq!(reloaded.average_rating, 3.0);
        assert_eq!(reloaded.review_count, 1);
    }

    #[tokio::test]
    async fn missing_book_fails_softly() {
        let f = setup().await;

        let err = f.aggregator.recompute("ghost").await.unwrap_err();
        assert!(matches!(err, AggregationFailure::BookMissing(ref id) if id == "ghost"));
        assert!(f.aggregator.refresh("ghost").await.is_none());
    }

    #[tokio::test]
    async fn recompute_all_covers_catalog() {
        let f = setup().await;
        let first = f.books.insert(&book("1")).await.unwrap();
        let second = f.books.insert(&book("2")).await.unwrap();
        f.reviews.insert(&review(&first.id, "alice", 2)).await.unwrap();
        corrupt_aggregates(&f, &second.id).await;

        let report = f.aggregator.recompute_all().await.unwrap();
        assert_eq!(report.books, 2);
        assert!(report.failed.is_empty());

        let first = f.books.get(&first.id).await.unwrap().unwrap();
        assert_eq!((first.average_rating, first.review_count), (2.0, 1));
        let second = f.books.get(&second.id).await.unwrap().unwrap();
        assert_eq!((second.average_rating, second.review_count), (0.0, 0));
    }
}
