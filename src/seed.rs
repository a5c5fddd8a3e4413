//! Sample catalog for local development.

use anyhow::Context;
use lectern_authz::{Actor, Role};
use serde::Serialize;

use crate::modules::books::models::CreateBook;
use crate::modules::reviews::models::CreateReview;
use crate::modules::Services;

/// Author of the sample reviews.
pub const SAMPLE_REVIEWER: &str = "johndoe";

pub struct SeedBook {
    pub title: &'static str,
    pub author: &'static str,
    pub description: &'static str,
    pub genre: &'static str,
    pub published_year: i32,
    pub isbn: &'static str,
}

pub const BOOKS: &[SeedBook] = &[
    SeedBook {
        title: "The Great Gatsby",
        author: "F. Scott Fitzgerald",
        description: "A novel set in the Roaring Twenties.",
        genre: "Fiction",
        published_year: 1925,
        isbn: "9780743273565",
    },
    SeedBook {
        title: "A Brief History of Time",
        author: "Stephen Hawking",
        description: "A popular-science book on cosmology.",
        genre: "Non-Fiction",
        published_year: 1988,
        isbn: "9780553380163",
    },
    SeedBook {
        title: "The Hobbit",
        author: "J.R.R. Tolkien",
        description: "A fantasy novel and prelude to The Lord of the Rings.",
        genre: "Fantasy",
        published_year: 1937,
        isbn: "9780547928227",
    },
];

/// (book index, rating, title, content)
const REVIEWS: &[(usize, i64, &str, &str)] = &[
    (0, 5, "A timeless classic", "Loved the writing and the story!"),
    (
        1,
        4,
        "Very insightful",
        "Made me think about the universe differently.",
    ),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub books_removed: u64,
    pub reviews_removed: u64,
    pub books: usize,
    pub reviews: usize,
}

/// Replace the whole store content with the sample catalog.
///
/// Books are attributed to `admin_id`, who also likes the second review.
pub async fn run(services: &Services, admin_id: &str) -> anyhow::Result<SeedReport> {
    let admin = Actor::new(admin_id, Role::Admin);

    let mut report = SeedReport {
        reviews_removed: services.reviews.clear().await?,
        books_removed: services.catalog.clear().await?,
        ..SeedReport::default()
    };

    let mut book_ids = Vec::with_capacity(BOOKS.len());
    for seed in BOOKS {
        let book = services
            .catalog
            .create_book(
                &admin,
                CreateBook {
                    title: Some(seed.title.to_string()),
                    author: Some(seed.author.to_string()),
                    description: Some(seed.description.to_string()),
                    cover_image: None,
                    isbn: Some(seed.isbn.to_string()),
                    genre: Some(seed.genre.to_string()),
                    published_year: Some(seed.published_year),
                },
            )
            .await
            .with_context(|| format!("failed to seed book '{}'", seed.title))?;
        book_ids.push(book.id);
        report.books += 1;
    }

    let mut review_ids = Vec::with_capacity(REVIEWS.len());
    for &(book, rating, title, content) in REVIEWS {
        let review = services
            .reviews
            .create_review(
                SAMPLE_REVIEWER,
                CreateReview {
                    book_id: Some(book_ids[book].clone()),
                    rating: Some(rating),
                    title: Some(title.to_string()),
                    content: Some(content.to_string()),
                    ..CreateReview::default()
                },
            )
            .await
            .with_context(|| format!("failed to seed review '{title}'"))?;
        review_ids.push(review.review.id);
        report.reviews += 1;
    }

    if let Some(liked) = review_ids.get(1) {
        services
            .reviews
            .toggle_like(liked, admin_id)
            .await
            .context("failed to seed review like")?;
    }

    services
        .aggregator
        .recompute_all()
        .await
        .context("failed to recompute seeded aggregates")?;

    tracing::info!(
        books = report.books,
        reviews = report.reviews,
        "database seeded"
    );
    Ok(report)
}
