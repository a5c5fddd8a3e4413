use std::sync::Arc;

use lectern_authz::{require_admin, Actor};
use lectern_db::DbError;
use lectern_http::error::AppError;
use lectern_http::pagination::{Paginated, Pagination};
use serde_json::json;

use super::models::{
    Book, BookFilter, BookListQuery, CreateBook, Genre, SortField, UnknownGenre, UpdateBook,
};
use super::repository::{self, BookRepository};
use crate::modules::reviews::aggregator::{RatingAggregator, RatingSummary};
use crate::utils;

/// Catalog management. Mutations are reserved to admins.
pub struct CatalogService {
    books: BookRepository,
    aggregator: Arc<RatingAggregator>,
}

impl CatalogService {
    pub fn new(books: BookRepository, aggregator: Arc<RatingAggregator>) -> Self {
        Self { books, aggregator }
    }

    pub async fn create_book(&self, actor: &Actor, input: CreateBook) -> Result<Book, AppError> {
        require_admin(actor)?;
        let draft = input.validate()?;

        let now = utils::now();
        let book = Book {
            id: lectern_db::new_id(),
            title: draft.title,
            author: draft.author,
            description: draft.description,
            cover_image: draft.cover_image,
            isbn: draft.isbn,
            genre: draft.genre,
            published_year: draft.published_year,
            average_rating: 0.0,
            review_count: 0,
            added_by: actor.id.clone(),
            created_at: now,
            updated_at: now,
        };

        let stored = self
            .books
            .insert(&book)
            .await
            .map_err(|e| isbn_conflict(e, &book.isbn))?;

        tracing::info!(book_id = %stored.id, isbn = %stored.isbn, actor = %actor.id, "book created");
        Ok(stored)
    }

    pub async fn get_book(&self, book_id: &str) -> Result<Book, AppError> {
        self.books
            .get(book_id)
            .await?
            .ok_or_else(|| book_not_found(book_id))
    }

    /// Search, filter, sort and paginate the catalog.
    pub async fn list_books(&self, params: BookListQuery) -> Result<Paginated<Book>, AppError> {
        let genre = match params.genre.as_deref().filter(|g| !g.trim().is_empty()) {
            Some(genre) => Some(parse_genre(genre)?),
            None => None,
        };
        let filter = BookFilter {
            search: params.search,
            genre,
            sort: params
                .sort_by
                .as_deref()
                .and_then(SortField::from_wire)
                .unwrap_or_default(),
            descending: params.sort_order.as_deref() != Some("asc"),
        };

        self.page(&filter, Pagination::new(params.page, params.limit))
            .await
    }

    pub async fn list_by_genre(
        &self,
        genre: &str,
        pagination: Pagination,
    ) -> Result<Paginated<Book>, AppError> {
        let filter = BookFilter {
            genre: Some(parse_genre(genre)?),
            descending: true,
            ..BookFilter::default()
        };

        self.page(&filter, pagination).await
    }

    pub async fn update_book(
        &self,
        actor: &Actor,
        book_id: &str,
        input: UpdateBook,
    ) -> Result<Book, AppError> {
        require_admin(actor)?;
        let book = self.get_book(book_id).await?;
        let draft = input.apply_to(&book)?;

        let updated = self
            .books
            .update_catalog(book_id, &draft)
            .await
            .map_err(|e| isbn_conflict(e, &draft.isbn))?
            .ok_or_else(|| book_not_found(book_id))?;

        tracing::info!(book_id, actor = %actor.id, "book updated");
        Ok(updated)
    }

    /// Delete a book together with every review of it, atomically.
    pub async fn delete_book(&self, actor: &Actor, book_id: &str) -> Result<(), AppError> {
        require_admin(actor)?;

        let removed = self
            .books
            .delete(book_id)
            .await?
            .ok_or_else(|| book_not_found(book_id))?;

        tracing::info!(book_id, reviews_removed = removed, actor = %actor.id, "book deleted");
        Ok(())
    }

    /// Rebuild one book's aggregates from its reviews.
    pub async fn recompute_ratings(
        &self,
        actor: &Actor,
        book_id: &str,
    ) -> Result<RatingSummary, AppError> {
        require_admin(actor)?;
        self.get_book(book_id).await?;

        self.aggregator
            .recompute(book_id)
            .await
            .map_err(|e| AppError::Internal(anyhow::Error::new(e)))
    }

    /// Remove every book and, with them, every review. Returns how many
    /// books were removed.
    pub async fn clear(&self) -> Result<u64, AppError> {
        Ok(self.books.clear().await?)
    }

    async fn page(
        &self,
        filter: &BookFilter,
        pagination: Pagination,
    ) -> Result<Paginated<Book>, AppError> {
        let (books, total) = self.books.find(filter, pagination).await?;
        Ok(Paginated::new(books, pagination, total))
    }
}

fn parse_genre(genre: &str) -> Result<Genre, AppError> {
    genre
        .parse()
        .map_err(|e: UnknownGenre| AppError::invalid_field("genre", e.to_string()))
}

fn book_not_found(book_id: &str) -> AppError {
    AppError::not_found(format!("No book with the id of {book_id}"))
}

fn isbn_conflict(err: DbError, isbn: &str) -> AppError {
    if err.violates_unique(repository::TABLE, repository::ISBN_UNIQUE) {
        AppError::conflict(
            vec![json!({ "field": "isbn", "error": "already exists" })],
            format!("A book with ISBN {isbn} already exists"),
        )
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::reviews;
    use crate::modules::reviews::models::Review;
    use crate::modules::reviews::repository::ReviewRepository;
    use axum::http::StatusCode;
    use lectern_authz::Role;
    use lectern_db::Database;

    fn admin() -> Actor {
        Actor::new("admin", Role::Admin)
    }

    async fn service() -> (CatalogService, ReviewRepository) {
        let db = Database::in_memory().await.unwrap();
        db.apply_migration("books:001_init", repository::SCHEMA)
            .await
            .unwrap();
        db.apply_migration("reviews:001_init", reviews::repository::SCHEMA)
            .await
            .unwrap();

        let aggregator = Arc::new(RatingAggregator::new(db.clone()));
        (
            CatalogService::new(BookRepository::new(db.clone()), aggregator),
            ReviewRepository::new(db),
        )
    }

    fn review_of(book_id: &str, user: &str) -> Review {
        let now = utils::now();
        Review {
            id: lectern_db::new_id(),
            book: book_id.to_string(),
            user: user.to_string(),
            rating: 4,
            title: "Good".to_string(),
            content: "A solid classic of the genre.".to_string(),
            likes: Vec::new(),
            is_edited: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn input(title: &str, isbn: &str, genre: &str) -> CreateBook {
        CreateBook {
            title: Some(title.to_string()),
            author: Some("Some Author".to_string()),
            description: Some(format!("All about {title}.")),
            cover_image: None,
            isbn: Some(isbn.to_string()),
            genre: Some(genre.to_string()),
            published_year: Some(2001),
        }
    }

    #[tokio::test]
    async fn only_admins_create_books() {
        let (service, _) = service().await;
        let err = service
            .create_book(&Actor::new("bob", Role::User), input("Dune", "1", "Fiction"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let book = service
            .create_book(&admin(), input("Dune", "1", "Fiction"))
            .await
            .unwrap();
        assert_eq!(book.added_by, "admin");
        assert_eq!(book.review_count, 0);
        assert_eq!(book.average_rating, 0.0);
    }

    #[tokio::test]
    async fn duplicate_isbn_conflicts() {
        let (service, _) = service().await;
        service
            .create_book(&admin(), input("Dune", "42", "Fiction"))
            .await
            .unwrap();
        let err = service
            .create_book(&admin(), input("Other", "42", "Fiction"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn listing_filters_searches_and_sorts() {
        let (service, _) = service().await;
        service.create_book(&admin(), input("Alpha", "1", "Fantasy")).await.unwrap();
        service.create_book(&admin(), input("Beta", "2", "Mystery")).await.unwrap();
        service.create_book(&admin(), input("Gamma", "3", "Fantasy")).await.unwrap();

        let all = service.list_books(BookListQuery::default()).await.unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.count, 3);

        let fantasy = service
            .list_books(BookListQuery {
                genre: Some("Fantasy".to_string()),
                sort_by: Some("title".to_string()),
                sort_order: Some("asc".to_string()),
                ..BookListQuery::default()
            })
            .await
            .unwrap();
        let titles: Vec<_> = fantasy.data.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Gamma"]);

        let searched = service
            .list_books(BookListQuery {
                search: Some("bet".to_string()),
                ..BookListQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(searched.total, 1);
        assert_eq!(searched.data[0].title, "Beta");

        let paged = service
            .list_books(BookListQuery {
                page: Some(2),
                limit: Some(2),
                ..BookListQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(paged.count, 1);
        assert_eq!(paged.total_pages, 2);
    }

    #[tokio::test]
    async fn unknown_genre_is_a_validation_error() {
        let (service, _) = service().await;
        let err = service
            .list_by_genre("Cookbooks", Pagination::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = service
            .create_book(&admin(), input("Dune", "1", "Cookbooks"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn update_patches_catalog_fields() {
        let (service, _) = service().await;
        let book = service
            .create_book(&admin(), input("Dune", "1", "Fiction"))
            .await
            .unwrap();

        let updated = service
            .update_book(
                &admin(),
                &book.id,
                UpdateBook {
                    genre: Some("Science Fiction".to_string()),
                    ..UpdateBook::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.genre, Genre::ScienceFiction);
        assert_eq!(updated.title, "Dune");

        let err = service
            .update_book(&admin(), "missing", UpdateBook::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_cascades_to_reviews() {
        let (service, reviews) = service().await;
        let book = service
            .create_book(&admin(), input("Dune", "1", "Fiction"))
            .await
            .unwrap();

        reviews.insert(&review_of(&book.id, "alice")).await.unwrap();

        service.delete_book(&admin(), &book.id).await.unwrap();
        assert!(reviews.list_for_user("alice").await.unwrap().is_empty());

        let err = service.get_book(&book.id).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = service.delete_book(&admin(), &book.id).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn review_landing_after_book_delete_is_refused() {
        let (service, reviews) = service().await;
        let book = service
            .create_book(&admin(), input("Dune", "1", "Fiction"))
            .await
            .unwrap();

        // A create that checked for the book just before the delete.
        let late = review_of(&book.id, "bob");
        service.delete_book(&admin(), &book.id).await.unwrap();

        let err = reviews.insert(&late).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation), "{err:?}");
        assert!(reviews.list_for_user("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recompute_repairs_one_book() {
        let (service, _) = service().await;
        let book = service
            .create_book(&admin(), input("Dune", "1", "Fiction"))
            .await
            .unwrap();

        let summary = service.recompute_ratings(&admin(), &book.id).await.unwrap();
        assert_eq!(summary.review_count, 0);

        let err = service
            .recompute_ratings(&admin(), "missing")
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
