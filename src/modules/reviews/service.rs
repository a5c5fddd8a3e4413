//! Review flows: creation, editing, deletion and likes.
//!
//! Every flow that changes a rating set calls the aggregator after its own
//! write has committed, so the book's aggregates are current by the time the
//! caller gets a response. Aggregation failures never fail the flow.

use std::sync::Arc;

use lectern_authz::{ensure_can_mutate, Actor};
use lectern_db::DbError;
use lectern_http::error::AppError;
use lectern_http::pagination::{Paginated, Pagination};
use serde_json::json;

use super::aggregator::RatingAggregator;
use super::models::{CreateReview, Review, ReviewResponse, UpdateReview, UserReview};
use super::repository::{self, ReviewRepository};
use crate::modules::books::models::BookSummary;
use crate::modules::books::repository::BookRepository;
use crate::utils;

pub struct ReviewService {
    reviews: ReviewRepository,
    books: BookRepository,
    aggregator: Arc<RatingAggregator>,
}

impl ReviewService {
    pub fn new(
        reviews: ReviewRepository,
        books: BookRepository,
        aggregator: Arc<RatingAggregator>,
    ) -> Self {
        Self {
            reviews,
            books,
            aggregator,
        }
    }

    pub async fn create_review(
        &self,
        user_id: &str,
        input: CreateReview,
    ) -> Result<ReviewResponse, AppError> {
        let draft = input.validate()?;

        if self.books.get(&draft.book_id).await?.is_none() {
            return Err(AppError::not_found(format!(
                "No book with the id of {}",
                draft.book_id
            )));
        }
        if self
            .reviews
            .find_by_pair(&draft.book_id, user_id)
            .await?
            .is_some()
        {
            return Err(already_reviewed(&draft.book_id));
        }

        let now = utils::now();
        let review = Review {
            id: lectern_db::new_id(),
            book: draft.book_id,
            user: user_id.to_string(),
            rating: draft.rating,
            title: draft.title,
            content: draft.content,
            likes: Vec::new(),
            is_edited: false,
            created_at: now,
            updated_at: now,
        };

        // Both checks above can race: a concurrent create for the same pair
        // trips the unique key, a concurrent book delete trips the foreign key.
        let stored = match self.reviews.insert(&review).await {
            Ok(stored) => stored,
            Err(e) if e.violates_unique(repository::TABLE, repository::PAIR_UNIQUE) => {
                return Err(already_reviewed(&review.book));
            }
            Err(DbError::ForeignKeyViolation) => {
                return Err(AppError::not_found(format!(
                    "No book with the id of {}",
                    review.book
                )));
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(review_id = %stored.id, book_id = %stored.book, user_id, "review created");
        self.aggregator.refresh(&stored.book).await;

        Ok(stored.into())
    }

    pub async fn get_review(&self, review_id: &str) -> Result<ReviewResponse, AppError> {
        self.find(review_id).await.map(ReviewResponse::from)
    }

    /// A book's reviews, newest first.
    pub async fn list_for_book(
        &self,
        book_id: &str,
        pagination: Pagination,
    ) -> Result<Paginated<ReviewResponse>, AppError> {
        let (reviews, total) = self.reviews.list_for_book(book_id, pagination).await?;
        Ok(Paginated::new(reviews, pagination, total).map(ReviewResponse::from))
    }

    /// Everything a user has reviewed, with the reviewed books attached.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<UserReview>, AppError> {
        let reviews = self.reviews.list_for_user(user_id).await?;

        let mut listed = Vec::with_capacity(reviews.len());
        for review in reviews {
            let book_details = self
                .books
                .get(&review.book)
                .await?
                .as_ref()
                .map(BookSummary::from);
            listed.push(UserReview {
                review: review.into(),
                book_details,
            });
        }
        Ok(listed)
    }

    pub async fn update_review(
        &self,
        review_id: &str,
        actor: &Actor,
        input: UpdateReview,
    ) -> Result<ReviewResponse, AppError> {
        let review = self.find(review_id).await?;
        ensure_can_mutate(actor, &review)?;

        let changes = input.validate()?;
        if changes.is_empty() {
            return Ok(review.into());
        }

        let updated = self
            .reviews
            .apply_changes(review_id, &changes)
            .await?
            .ok_or_else(|| review_not_found(review_id))?;

        tracing::info!(review_id, actor = %actor.id, "review updated");
        if updated.rating != review.rating {
            self.aggregator.refresh(&updated.book).await;
        }

        Ok(updated.into())
    }

    pub async fn delete_review(&self, review_id: &str, actor: &Actor) -> Result<(), AppError> {
        let review = self.find(review_id).await?;
        ensure_can_mutate(actor, &review)?;

        // Already gone means a concurrent delete won; the aggregates are
        // recomputed either way.
        self.reviews.delete(review_id).await?;

        tracing::info!(review_id, book_id = %review.book, actor = %actor.id, "review deleted");
        self.aggregator.refresh(&review.book).await;

        Ok(())
    }

    /// Like the review if `user_id` has not yet, unlike it otherwise.
    pub async fn toggle_like(
        &self,
        review_id: &str,
        user_id: &str,
    ) -> Result<ReviewResponse, AppError> {
        let review = self
            .reviews
            .toggle_like(review_id, user_id)
            .await?
            .ok_or_else(|| review_not_found(review_id))?;

        tracing::debug!(review_id, user_id, liked = review.is_liked_by(user_id), "like toggled");
        Ok(review.into())
    }

    /// Remove every review without touching aggregates.
    pub async fn clear(&self) -> Result<u64, AppError> {
        Ok(self.reviews.clear().await?)
    }

    async fn find(&self, review_id: &str) -> Result<Review, AppError> {
        self.reviews
            .get(review_id)
            .await?
            .ok_or_else(|| review_not_found(review_id))
    }
}

fn review_not_found(review_id: &str) -> AppError {
    AppError::not_found(format!("No review with the id of {review_id}"))
}

fn already_reviewed(book_id: &str) -> AppError {
    AppError::conflict(
        vec![json!({ "field": "book", "error": "already reviewed by this user" })],
        format!("User has already reviewed book {book_id}"),
    )
}
