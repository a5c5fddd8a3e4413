use std::fmt;
use std::str::FromStr;

use lectern_http::error::AppError;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::utils::Violations;

pub const TITLE_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = 1000;

/// Closed set of genres a book may be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Genre {
    Fiction,
    #[serde(rename = "Non-Fiction")]
    NonFiction,
    Mystery,
    #[serde(rename = "Science Fiction")]
    ScienceFiction,
    Fantasy,
    Romance,
    Biography,
    History,
    #[serde(rename = "Self-Help")]
    SelfHelp,
    Other,
}

impl Genre {
    pub const ALL: [Genre; 10] = [
        Genre::Fiction,
        Genre::NonFiction,
        Genre::Mystery,
        Genre::ScienceFiction,
        Genre::Fantasy,
        Genre::Romance,
        Genre::Biography,
        Genre::History,
        Genre::SelfHelp,
        Genre::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Fiction => "Fiction",
            Genre::NonFiction => "Non-Fiction",
            Genre::Mystery => "Mystery",
            Genre::ScienceFiction => "Science Fiction",
            Genre::Fantasy => "Fantasy",
            Genre::Romance => "Romance",
            Genre::Biography => "Biography",
            Genre::History => "History",
            Genre::SelfHelp => "Self-Help",
            Genre::Other => "Other",
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownGenre(pub String);

impl fmt::Display for UnknownGenre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a supported genre", self.0)
    }
}

impl FromStr for Genre {
    type Err = UnknownGenre;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Genre::ALL
            .into_iter()
            .find(|genre| genre.as_str() == s.trim())
            .ok_or_else(|| UnknownGenre(s.to_string()))
    }
}

/// A catalog entry. `average_rating` and `review_count` are derived from the
/// book's reviews and are only ever written by the rating aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub description: String,
    #[serde(default)]
    pub cover_image: String,
    pub isbn: String,
    pub genre: Genre,
    pub published_year: i32,
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub review_count: u64,
    pub added_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// The slice of a book embedded next to a user's reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub id: String,
    pub title: String,
    pub cover_image: String,
}

impl From<&Book> for BookSummary {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id.clone(),
            title: book.title.clone(),
            cover_image: book.cover_image.clone(),
        }
    }
}

/// Validated catalog fields, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct BookDraft {
    pub title: String,
    pub author: String,
    pub description: String,
    pub cover_image: String,
    pub isbn: String,
    pub genre: Genre,
    pub published_year: i32,
}

/// Request body for creating a book. Aggregate fields are not accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub isbn: Option<String>,
    pub genre: Option<String>,
    pub published_year: Option<i32>,
}

impl CreateBook {
    pub fn validate(self) -> Result<BookDraft, AppError> {
        let mut v = Violations::new();

        let title = v.text("title", self.title.as_deref(), 1, TITLE_MAX);
        let author = v.text("author", self.author.as_deref(), 1, usize::MAX);
        let description = match self.description.as_deref().filter(|d| !d.trim().is_empty()) {
            None => {
                v.add("description", "is required");
                None
            }
            Some(d) if d.chars().count() > DESCRIPTION_MAX => {
                v.add(
                    "description",
                    format!("cannot be more than {DESCRIPTION_MAX} characters"),
                );
                None
            }
            Some(d) => Some(d.to_string()),
        };

        let cover_image = self.cover_image.unwrap_or_default().trim().to_string();
        if !cover_image.is_empty()
            && !(cover_image.starts_with("http://") || cover_image.starts_with("https://"))
        {
            v.add("coverImage", "must be an http(s) URL");
        }

        let isbn = v.text("isbn", self.isbn.as_deref(), 1, usize::MAX);

        let genre = match self.genre.as_deref().map(str::parse::<Genre>) {
            None => {
                v.add("genre", "is required");
                None
            }
            Some(Err(e)) => {
                v.add("genre", e.to_string());
                None
            }
            Some(Ok(genre)) => Some(genre),
        };

        if self.published_year.is_none() {
            v.add("publishedYear", "is required");
        }

        v.finish(|| {
            Some(BookDraft {
                title: title?,
                author: author?,
                description: description?,
                cover_image,
                isbn: isbn?,
                genre: genre?,
                published_year: self.published_year?,
            })
        })
    }
}

/// Request body for a partial book update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBook {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub isbn: Option<String>,
    pub genre: Option<String>,
    pub published_year: Option<i32>,
}

impl UpdateBook {
    /// Overlay the changes on `book` and validate the result as a whole.
    pub fn apply_to(self, book: &Book) -> Result<BookDraft, AppError> {
        CreateBook {
            title: self.title.or_else(|| Some(book.title.clone())),
            author: self.author.or_else(|| Some(book.author.clone())),
            description: self.description.or_else(|| Some(book.description.clone())),
            cover_image: self.cover_image.or_else(|| Some(book.cover_image.clone())),
            isbn: self.isbn.or_else(|| Some(book.isbn.clone())),
            genre: self.genre.or_else(|| Some(book.genre.to_string())),
            published_year: self.published_year.or(Some(book.published_year)),
        }
        .validate()
    }
}

/// Book fields a listing may be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    Title,
    Author,
    PublishedYear,
    AverageRating,
    ReviewCount,
}

impl SortField {
    pub const ALL: [SortField; 6] = [
        SortField::CreatedAt,
        SortField::Title,
        SortField::Author,
        SortField::PublishedYear,
        SortField::AverageRating,
        SortField::ReviewCount,
    ];

    /// Parse a wire field name such as `publishedYear`.
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.wire_name() == name)
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            SortField::CreatedAt => "createdAt",
            SortField::Title => "title",
            SortField::Author => "author",
            SortField::PublishedYear => "publishedYear",
            SortField::AverageRating => "averageRating",
            SortField::ReviewCount => "reviewCount",
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::Title => "title",
            SortField::Author => "author",
            SortField::PublishedYear => "published_year",
            SortField::AverageRating => "average_rating",
            SortField::ReviewCount => "review_count",
        }
    }
}

/// Resolved listing criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    /// Case-insensitive substring of title, author or description.
    pub search: Option<String>,
    pub genre: Option<Genre>,
    pub sort: SortField,
    pub descending: bool,
}

/// `GET /api/books` query string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub genre: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}
