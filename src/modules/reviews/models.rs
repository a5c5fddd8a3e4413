use lectern_authz::Owned;
use lectern_http::error::AppError;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::modules::books::models::BookSummary;
use crate::utils::Violations;

pub const RATING_MIN: i64 = 1;
pub const RATING_MAX: i64 = 5;
pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 100;
pub const CONTENT_MIN: usize = 10;
pub const CONTENT_MAX: usize = 1000;

/// A user's review of a book. At most one exists per `(book, user)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub book: String,
    pub user: String,
    pub rating: u8,
    pub title: String,
    pub content: String,
    /// Ids of users who liked the review, in the order they liked it.
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub is_edited: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Review {
    pub fn like_count(&self) -> usize {
        self.likes.len()
    }

    pub fn is_liked_by(&self, user_id: &str) -> bool {
        self.likes.iter().any(|id| id == user_id)
    }

    /// Flip `user_id`'s like. Returns whether the review is now liked by them.
    pub fn toggle_like(&mut self, user_id: &str) -> bool {
        if let Some(pos) = self.likes.iter().position(|id| id == user_id) {
            self.likes.remove(pos);
            false
        } else {
            self.likes.push(user_id.to_string());
            true
        }
    }
}

impl Owned for Review {
    fn owner_id(&self) -> &str {
        &self.user
    }
}

/// Wire form of a review, with the derived like count.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    #[serde(flatten)]
    pub review: Review,
    pub like_count: usize,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        Self {
            like_count: review.like_count(),
            review,
        }
    }
}

/// A review listed for its author, with the reviewed book attached.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReview {
    #[serde(flatten)]
    pub review: ReviewResponse,
    /// `None` if the book has since disappeared.
    pub book_details: Option<BookSummary>,
}

/// Request body for `POST /api/reviews`. The book may be given as `bookId` or `book`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReview {
    pub book_id: Option<String>,
    pub book: Option<String>,
    pub rating: Option<i64>,
    pub title: Option<String>,
    pub content: Option<String>,
}

/// Validated review fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewDraft {
    pub book_id: String,
    pub rating: u8,
    pub title: String,
    pub content: String,
}

impl CreateReview {
    pub fn validate(self) -> Result<ReviewDraft, AppError> {
        let mut v = Violations::new();

        let book_id = self
            .book_id
            .or(self.book)
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        if book_id.is_none() {
            v.add("bookId", "is required");
        }

        let rating = check_rating(&mut v, self.rating);
        let title = v.text("title", self.title.as_deref(), TITLE_MIN, TITLE_MAX);
        let content = v.text("content", self.content.as_deref(), CONTENT_MIN, CONTENT_MAX);

        v.finish(|| {
            Some(ReviewDraft {
                book_id: book_id?,
                rating: rating?,
                title: title?,
                content: content?,
            })
        })
    }
}

/// Request body for `PUT /api/reviews/{id}`. Absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReview {
    pub rating: Option<i64>,
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewChanges {
    pub rating: Option<u8>,
    pub title: Option<String>,
    pub content: Option<String>,
}

impl UpdateReview {
    pub fn validate(self) -> Result<ReviewChanges, AppError> {
        let mut v = Violations::new();

        let rating = match self.rating {
            Some(_) => check_rating(&mut v, self.rating),
            None => None,
        };
        let title = match self.title.as_deref() {
            Some(title) => v.text("title", Some(title), TITLE_MIN, TITLE_MAX),
            None => None,
        };
        let content = match self.content.as_deref() {
            Some(content) => v.text("content", Some(content), CONTENT_MIN, CONTENT_MAX),
            None => None,
        };

        v.finish(|| {
            Some(ReviewChanges {
                rating,
                title,
                content,
            })
        })
    }
}

impl ReviewChanges {
    pub fn is_empty(&self) -> bool {
        self.rating.is_none() && self.title.is_none() && self.content.is_none()
    }
}

fn check_rating(v: &mut Violations, rating: Option<i64>) -> Option<u8> {
    match rating {
        None => {
            v.add("rating", "is required");
            None
        }
        Some(r) if !(RATING_MIN..=RATING_MAX).contains(&r) => {
            v.add(
                "rating",
                format!("must be between {RATING_MIN} and {RATING_MAX}"),
            );
            None
        }
        Some(r) => u8::try_from(r).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review() -> Review {
        let now = OffsetDateTime::now_utc();
        Review {
            id: "r1".to_string(),
            book: "b1".to_string(),
            user: "alice".to_string(),
            rating: 5,
            title: "Great".to_string(),
            content: "Loved every page of it.".to_string(),
            likes: vec!["carol".to_string()],
            is_edited: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn field_errors(err: AppError) -> Vec<String> {
        match err {
            AppError::Validation { details, .. } => details
                .iter()
                .map(|d| d["field"].as_str().unwrap().to_string())
                .collect(),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn toggle_like_is_an_involution() {
        let mut r = review();
        let original = r.likes.clone();

        assert!(r.toggle_like("bob"));
        assert!(r.is_liked_by("bob"));
        assert!(!r.toggle_like("bob"));
        assert_eq!(r.likes, original);

        assert!(!r.toggle_like("carol"));
        assert!(r.likes.is_empty());
    }

    #[test]
    fn response_carries_like_count() {
        let json = serde_json::to_value(ReviewResponse::from(review())).unwrap();
        assert_eq!(json["likeCount"], 1);
        assert_eq!(json["isEdited"], false);
        assert_eq!(json["book"], "b1");
    }

    #[test]
    fn create_accepts_book_or_book_id() {
        let input = CreateReview {
            book: Some("b1".to_string()),
            rating: Some(4),
            title: Some("  Solid read ".to_string()),
            content: Some("Well paced and thoughtful.".to_string()),
            ..CreateReview::default()
        };
        let draft = input.validate().unwrap();
        assert_eq!(draft.book_id, "b1");
        assert_eq!(draft.title, "Solid read");
        assert_eq!(draft.rating, 4);
    }

    #[test]
    fn create_rejects_out_of_range_rating() {
        for rating in [0, 6, -1] {
            let input = CreateReview {
                book_id: Some("b1".to_string()),
                rating: Some(rating),
                title: Some("Fine title".to_string()),
                content: Some("Long enough content.".to_string()),
                ..CreateReview::default()
            };
            assert_eq!(field_errors(input.validate().unwrap_err()), vec!["rating"]);
        }
    }

    #[test]
    fn create_enforces_trimmed_lengths() {
        let input = CreateReview {
            book_id: Some("b1".to_string()),
            rating: Some(3),
            title: Some("  ab  ".to_string()),
            content: Some("   too short   ".to_string()),
            ..CreateReview::default()
        };
        let fields = field_errors(input.validate().unwrap_err());
        assert_eq!(fields, vec!["title", "content"]);
    }

    #[test]
    fn create_requires_every_field() {
        let fields = field_errors(CreateReview::default().validate().unwrap_err());
        assert_eq!(fields, vec!["bookId", "rating", "title", "content"]);
    }

    #[test]
    fn update_validates_only_present_fields() {
        let changes = UpdateReview {
            rating: Some(2),
            ..UpdateReview::default()
        }
        .validate()
        .unwrap();
        assert_eq!(changes.rating, Some(2));
        assert!(changes.title.is_none());

        let err = UpdateReview {
            content: Some("short".to_string()),
            ..UpdateReview::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(field_errors(err), vec!["content"]);

        assert!(UpdateReview::default().validate().unwrap().is_empty());
    }
}
